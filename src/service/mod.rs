pub mod disbursement;
pub mod notification;
pub mod payroll_batch;
pub mod workflow;
