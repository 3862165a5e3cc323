pub mod employee;
pub mod payment_request;
pub mod payroll;
pub mod period;
pub mod role;
pub mod salary_advance;
pub mod statutory;
