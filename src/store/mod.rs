//! Persistent store behind the payroll and payment workflow.
//!
//! The store is the single source of truth. Every status change is a
//! compare-and-swap on the status the caller last saw, so two checkers racing
//! on the same request cannot both win.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;

use crate::error::AppError;
use crate::model::employee::{Employee, EmployeeFilter};
use crate::model::payment_request::{PaymentRequest, PaymentStatus};
use crate::model::period::PayPeriod;
use crate::model::salary_advance::SalaryAdvance;
use crate::model::statutory::{StatutoryConfig, StatutorySettingsRecord};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[async_trait]
pub trait PayrollStore: Send + Sync {
    /// Newest settings row, if any was ever saved.
    async fn latest_statutory_settings(&self) -> Result<Option<StatutorySettingsRecord>, AppError>;

    /// All settings rows, newest first.
    async fn statutory_settings_history(&self) -> Result<Vec<StatutorySettingsRecord>, AppError>;

    async fn insert_statutory_settings(
        &self,
        settings: &StatutoryConfig,
        created_by: &str,
    ) -> Result<StatutorySettingsRecord, AppError>;

    async fn list_employees(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, AppError>;

    async fn get_employee(&self, id: u64) -> Result<Option<Employee>, AppError>;

    /// Advances that are paid and processed, taken during `period`.
    async fn paid_advances(&self, period: PayPeriod) -> Result<Vec<SalaryAdvance>, AppError>;

    async fn insert_payment_request(&self, request: &PaymentRequest) -> Result<(), AppError>;

    async fn get_payment_request(&self, id: &str) -> Result<Option<PaymentRequest>, AppError>;

    /// Newest first, optionally restricted to one status.
    async fn list_payment_requests(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, AppError>;

    /// Overwrites the stored request with `request` only while its stored
    /// status is still `expected`. Returns whether the swap happened.
    async fn transition(
        &self,
        expected: PaymentStatus,
        request: &PaymentRequest,
    ) -> Result<bool, AppError>;

    /// Deletes every `pending` request and returns how many went.
    async fn delete_pending(&self) -> Result<u64, AppError>;
}
