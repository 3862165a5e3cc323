use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error};

use super::PayrollStore;
use crate::error::AppError;
use crate::model::employee::{Employee, EmployeeFilter};
use crate::model::payment_request::{
    Disbursee, DisbursementSummary, PaymentRequest, PaymentStatus, PaymentTarget,
};
use crate::model::period::PayPeriod;
use crate::model::salary_advance::SalaryAdvance;
use crate::model::statutory::{StatutoryConfig, StatutorySettingsRecord};

const EMPLOYEE_COLUMNS: &str = r#"
    id, employee_number, full_name, phone_number, branch, department, status,
    COALESCE(basic_salary, 0) AS basic_salary,
    COALESCE(house_allowance, 0) AS house_allowance,
    COALESCE(transport_allowance, 0) AS transport_allowance,
    COALESCE(medical_allowance, 0) AS medical_allowance,
    COALESCE(other_allowances, 0) AS other_allowances,
    COALESCE(overtime_hours, 0) AS overtime_hours,
    COALESCE(overtime_rate, 0) AS overtime_rate,
    COALESCE(commission, 0) AS commission,
    COALESCE(bonus, 0) AS bonus,
    nhif_number, nssf_number, tax_pin
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, request_type, employee_data, employees_data, justification, total_amount,
    status, created_by, created_at,
    approved_by, approved_at, approval_comment,
    rejected_by, rejected_at, rejection_reason,
    completed_at, failed_at, failure_reason, disbursement
"#;

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

type SettingsRow = (u64, Json<serde_json::Value>, String, DateTime<Utc>);

fn settings_record(row: SettingsRow) -> Result<StatutorySettingsRecord, AppError> {
    let (id, Json(blob), created_by, created_at) = row;
    let settings: StatutoryConfig = serde_json::from_value(blob).map_err(|e| {
        error!(error = %e, settings_id = id, "Stored statutory settings are unreadable");
        AppError::Persistence(format!("statutory settings {id} are unreadable: {e}"))
    })?;
    Ok(StatutorySettingsRecord {
        id,
        settings,
        created_by,
        created_at,
    })
}

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    request_type: String,
    employee_data: Option<Json<Disbursee>>,
    employees_data: Option<Json<Vec<Disbursee>>>,
    justification: Option<String>,
    total_amount: f64,
    status: String,
    created_by: String,
    created_at: DateTime<Utc>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    approval_comment: Option<String>,
    rejected_by: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    disbursement: Option<Json<DisbursementSummary>>,
}

impl TryFrom<PaymentRow> for PaymentRequest {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            AppError::Persistence(format!("payment request {} has {what}", row.id))
        };

        let target = match (row.request_type.as_str(), &row.employee_data, &row.employees_data) {
            ("single", Some(Json(employee)), _) => PaymentTarget::Single {
                employee_data: employee.clone(),
            },
            ("bulk", _, Some(Json(employees))) => PaymentTarget::Bulk {
                employees_data: employees.clone(),
            },
            _ => return Err(corrupt("no payee data for its type")),
        };
        let status: PaymentStatus = row
            .status
            .parse()
            .map_err(|_| corrupt("an unknown status"))?;

        Ok(PaymentRequest {
            id: row.id,
            target,
            justification: row.justification,
            total_amount: row.total_amount,
            status,
            created_by: row.created_by,
            created_at: row.created_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            approval_comment: row.approval_comment,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            completed_at: row.completed_at,
            failed_at: row.failed_at,
            failure_reason: row.failure_reason,
            disbursement: row.disbursement.map(|Json(s)| s),
        })
    }
}

fn payee_columns(
    target: &PaymentTarget,
) -> (Option<Json<&Disbursee>>, Option<Json<&Vec<Disbursee>>>) {
    match target {
        PaymentTarget::Single { employee_data } => (Some(Json(employee_data)), None),
        PaymentTarget::Bulk { employees_data } => (None, Some(Json(employees_data))),
    }
}

#[async_trait]
impl PayrollStore for MySqlStore {
    async fn latest_statutory_settings(&self) -> Result<Option<StatutorySettingsRecord>, AppError> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT id, settings, created_by, created_at
            FROM statutory_settings
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(settings_record).transpose()
    }

    async fn statutory_settings_history(&self) -> Result<Vec<StatutorySettingsRecord>, AppError> {
        sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT id, settings, created_by, created_at
            FROM statutory_settings
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(settings_record)
        .collect()
    }

    async fn insert_statutory_settings(
        &self,
        settings: &StatutoryConfig,
        created_by: &str,
    ) -> Result<StatutorySettingsRecord, AppError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO statutory_settings (settings, created_by, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(Json(settings))
        .bind(created_by)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(StatutorySettingsRecord {
            id: result.last_insert_id(),
            settings: settings.clone(),
            created_by: created_by.to_string(),
            created_at,
        })
    }

    async fn list_employees(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, AppError> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<String> = Vec::new();

        let wanted = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(branch) = wanted(&filter.branch) {
            where_sql.push_str(" AND branch = ?");
            args.push(branch);
        }
        if let Some(department) = wanted(&filter.department) {
            where_sql.push_str(" AND department = ?");
            args.push(department);
        }
        if let Some(status) = wanted(&filter.status) {
            where_sql.push_str(" AND status = ?");
            args.push(status);
        }
        if let Some(search) = wanted(&filter.search) {
            where_sql.push_str(" AND (full_name LIKE ? OR employee_number LIKE ?)");
            let like = format!("%{search}%");
            args.push(like.clone());
            args.push(like);
        }

        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees{where_sql} ORDER BY id");
        debug!(sql = %sql, "Fetching employees");

        let mut query = sqlx::query_as::<_, Employee>(&sql);
        for arg in args {
            query = query.bind(arg);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn get_employee(&self, id: u64) -> Result<Option<Employee>, AppError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn paid_advances(&self, period: PayPeriod) -> Result<Vec<SalaryAdvance>, AppError> {
        let rows = sqlx::query_as::<_, (u64, String, f64, DateTime<Utc>, String)>(
            r#"
            SELECT id, employee_number, COALESCE(amount_requested, 0), time_added, status
            FROM salary_advance
            WHERE payment_processed = 'true'
            AND status = 'paid'
            AND DATE_FORMAT(time_added, '%Y-%m') = ?
            "#,
        )
        .bind(period.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, employee_number, amount_requested, time_added, status)| SalaryAdvance {
                    id,
                    employee_number,
                    amount_requested,
                    time_added,
                    status,
                    payment_processed: true,
                },
            )
            .collect())
    }

    async fn insert_payment_request(&self, request: &PaymentRequest) -> Result<(), AppError> {
        let (employee_data, employees_data) = payee_columns(&request.target);
        sqlx::query(
            r#"
            INSERT INTO payment_flows
                (id, request_type, employee_data, employees_data, justification,
                 total_amount, status, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(request.target.kind())
        .bind(employee_data)
        .bind(employees_data)
        .bind(&request.justification)
        .bind(request.total_amount)
        .bind(request.status.as_ref())
        .bind(&request.created_by)
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_payment_request(&self, id: &str) -> Result<Option<PaymentRequest>, AppError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment_flows WHERE id = ?");
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PaymentRequest::try_from)
            .transpose()
    }

    async fn list_payment_requests(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, AppError> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payment_flows WHERE status = ? ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, PaymentRow>(&sql)
                    .bind(status.as_ref())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql =
                    format!("SELECT {PAYMENT_COLUMNS} FROM payment_flows ORDER BY created_at DESC");
                sqlx::query_as::<_, PaymentRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(PaymentRequest::try_from).collect()
    }

    async fn transition(
        &self,
        expected: PaymentStatus,
        request: &PaymentRequest,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_flows
            SET status = ?,
                approved_by = ?, approved_at = ?, approval_comment = ?,
                rejected_by = ?, rejected_at = ?, rejection_reason = ?,
                completed_at = ?, failed_at = ?, failure_reason = ?,
                disbursement = ?
            WHERE id = ?
            AND status = ?
            "#,
        )
        .bind(request.status.as_ref())
        .bind(&request.approved_by)
        .bind(request.approved_at)
        .bind(&request.approval_comment)
        .bind(&request.rejected_by)
        .bind(request.rejected_at)
        .bind(&request.rejection_reason)
        .bind(request.completed_at)
        .bind(request.failed_at)
        .bind(&request.failure_reason)
        .bind(request.disbursement.as_ref().map(Json))
        .bind(&request.id)
        .bind(expected.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_pending(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM payment_flows WHERE status = 'pending'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
