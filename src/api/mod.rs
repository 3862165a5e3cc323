pub mod employee;
pub mod payment;
pub mod payroll;
pub mod sms;
pub mod statutory;
