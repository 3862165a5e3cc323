use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::PayrollStore;
use crate::error::AppError;
use crate::model::employee::{Employee, EmployeeFilter};
use crate::model::payment_request::{PaymentRequest, PaymentStatus};
use crate::model::period::PayPeriod;
use crate::model::salary_advance::SalaryAdvance;
use crate::model::statutory::{StatutoryConfig, StatutorySettingsRecord};

#[derive(Default)]
struct Inner {
    settings: Vec<StatutorySettingsRecord>,
    employees: Vec<Employee>,
    advances: Vec<SalaryAdvance>,
    requests: Vec<PaymentRequest>,
}

/// Process-local store for development runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, AppError> {
        self.inner
            .read()
            .map_err(|_| AppError::Persistence("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, AppError> {
        self.inner
            .write()
            .map_err(|_| AppError::Persistence("memory store lock poisoned".to_string()))
    }

    pub fn add_employee(&self, employee: Employee) -> Result<(), AppError> {
        let mut inner = self.write()?;
        inner.employees.retain(|e| e.id != employee.id);
        inner.employees.push(employee);
        Ok(())
    }

    pub fn add_advance(&self, advance: SalaryAdvance) -> Result<(), AppError> {
        self.write()?.advances.push(advance);
        Ok(())
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn latest_statutory_settings(&self) -> Result<Option<StatutorySettingsRecord>, AppError> {
        Ok(self.read()?.settings.last().cloned())
    }

    async fn statutory_settings_history(&self) -> Result<Vec<StatutorySettingsRecord>, AppError> {
        Ok(self.read()?.settings.iter().rev().cloned().collect())
    }

    async fn insert_statutory_settings(
        &self,
        settings: &StatutoryConfig,
        created_by: &str,
    ) -> Result<StatutorySettingsRecord, AppError> {
        let mut inner = self.write()?;
        let record = StatutorySettingsRecord {
            id: inner.settings.len() as u64 + 1,
            settings: settings.clone(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };
        inner.settings.push(record.clone());
        Ok(record)
    }

    async fn list_employees(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, AppError> {
        let mut employees: Vec<Employee> = self
            .read()?
            .employees
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        employees.sort_by_key(|e| e.id);
        Ok(employees)
    }

    async fn get_employee(&self, id: u64) -> Result<Option<Employee>, AppError> {
        Ok(self.read()?.employees.iter().find(|e| e.id == id).cloned())
    }

    async fn paid_advances(&self, period: PayPeriod) -> Result<Vec<SalaryAdvance>, AppError> {
        Ok(self
            .read()?
            .advances
            .iter()
            .filter(|a| a.is_recoverable() && a.period() == period)
            .cloned()
            .collect())
    }

    async fn insert_payment_request(&self, request: &PaymentRequest) -> Result<(), AppError> {
        let mut inner = self.write()?;
        if inner.requests.iter().any(|r| r.id == request.id) {
            return Err(AppError::Conflict(format!(
                "payment request {} already exists",
                request.id
            )));
        }
        inner.requests.push(request.clone());
        Ok(())
    }

    async fn get_payment_request(&self, id: &str) -> Result<Option<PaymentRequest>, AppError> {
        Ok(self.read()?.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_payment_requests(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, AppError> {
        let mut requests: Vec<PaymentRequest> = self
            .read()?
            .requests
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn transition(
        &self,
        expected: PaymentStatus,
        request: &PaymentRequest,
    ) -> Result<bool, AppError> {
        let mut inner = self.write()?;
        match inner
            .requests
            .iter_mut()
            .find(|r| r.id == request.id && r.status == expected)
        {
            Some(stored) => {
                *stored = request.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_pending(&self) -> Result<u64, AppError> {
        let mut inner = self.write()?;
        let before = inner.requests.len();
        inner.requests.retain(|r| r.status != PaymentStatus::Pending);
        Ok((before - inner.requests.len()) as u64)
    }
}
