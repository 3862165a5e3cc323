use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::employee::EmployeeFilter;
use crate::model::payroll::PayrollLine;
use crate::model::period::PayPeriod;
use crate::service::payroll_batch::{employee_line, load_batch};
use crate::state::AppState;

#[derive(Deserialize, IntoParams)]
pub struct PayrollQuery {
    /// `YYYY-MM`; the current month when omitted.
    #[param(example = "2025-03")]
    pub period: Option<String>,
    /// Apply every statutory deduction regardless of identifiers on file.
    #[serde(rename = "override", default)]
    pub override_statutory_checks: bool,
    pub branch: Option<String>,
    pub department: Option<String>,
}

impl PayrollQuery {
    fn period(&self) -> Result<PayPeriod, AppError> {
        match self.period.as_deref().map(str::trim) {
            None | Some("") => Ok(PayPeriod::current()),
            Some(p) => p.parse(),
        }
    }
}

/// for computing the payroll of every active employee
#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Payroll batch for the period", body = crate::service::payroll_batch::PayrollBatch),
        (status = 400, description = "Malformed period"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_batch(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let filter = EmployeeFilter {
        branch: query.branch.clone(),
        department: query.department.clone(),
        ..EmployeeFilter::active()
    };
    let batch = load_batch(
        state.store.as_ref(),
        &filter,
        query.period()?,
        query.override_statutory_checks,
        &state.policy,
    )
    .await?;
    Ok(HttpResponse::Ok().json(batch))
}

/// for computing one employee's payroll line; employees may read their own
#[utoipa::path(
    get,
    path = "/api/payroll/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        PayrollQuery
    ),
    responses(
        (status = 200, description = "Payroll line", body = PayrollLine),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn employee_payroll(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if auth.is_employee() && auth.employee_id != Some(employee_id) {
        return Err(AppError::forbidden("You can only view your own payroll").into());
    }

    let line: PayrollLine = employee_line(
        state.store.as_ref(),
        employee_id,
        query.period()?,
        query.override_statutory_checks,
        &state.policy,
    )
    .await?;
    Ok(HttpResponse::Ok().json(line))
}
