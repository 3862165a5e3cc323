pub mod phone;
pub mod retry;
