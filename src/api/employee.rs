use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::employee::{Employee, EmployeeFilter};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 20)]
    pub per_page: Option<u32>,
    #[schema(example = "Nairobi")]
    pub branch: Option<String>,
    #[schema(example = "Credit")]
    pub department: Option<String>,
    /// Defaults to `active`; `all` lists every status.
    #[schema(example = "active")]
    pub status: Option<String>,
    pub search: Option<String>,
}

impl EmployeeQuery {
    fn filter(&self) -> EmployeeFilter {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => Some("active".to_string()),
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.to_string()),
        };
        EmployeeFilter {
            branch: self.branch.clone(),
            department: self.department.clone(),
            status,
            search: self.search.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: usize,
}

/// for listing employees endpoint
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page as usize - 1).saturating_mul(per_page as usize);

    let employees = state.store.list_employees(&query.filter()).await?;
    let total = employees.len();
    let data = employees
        .into_iter()
        .skip(offset)
        .take(per_page as usize)
        .collect();

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// for getting one employee; employees may only read their own record
#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee 42 not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    if auth.is_employee() && auth.employee_id != Some(id) {
        return Err(AppError::forbidden("You can only view your own record").into());
    }

    match state.store.get_employee(id).await? {
        Some(employee) => Ok(HttpResponse::Ok().json(employee)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": format!("Employee {id} not found")
        }))),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::{self, TestRequest};
    use serde_json::Value;

    use crate::model::role::Role;
    use crate::testing::{as_user, employee, test_app, test_app_state};

    #[actix_web::test]
    async fn list_defaults_to_active_staff_and_filters() {
        let (state, store, _) = test_app_state();
        store.add_employee(employee(1, "EMP-001", 30000.0)).unwrap();
        let mut other = employee(2, "EMP-002", 40000.0);
        other.branch = Some("Kisumu".into());
        store.add_employee(other).unwrap();
        let mut gone = employee(3, "EMP-003", 40000.0);
        gone.status = "terminated".into();
        store.add_employee(gone).unwrap();
        let app = test_app!(state);

        let req = as_user(TestRequest::get().uri("/api/employees"), "hr", Role::Hr);
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["total"], 2);

        let req = as_user(
            TestRequest::get().uri("/api/employees?branch=kisumu"),
            "hr",
            Role::Hr,
        );
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["employee_number"], "EMP-002");

        let req = as_user(
            TestRequest::get().uri("/api/employees?status=all&per_page=2&page=2"),
            "hr",
            Role::Hr,
        );
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn page_far_past_the_end_is_empty() {
        let (state, store, _) = test_app_state();
        store.add_employee(employee(1, "EMP-001", 30000.0)).unwrap();
        let app = test_app!(state);

        let req = as_user(
            TestRequest::get().uri("/api/employees?page=50000000&per_page=100"),
            "hr",
            Role::Hr,
        );
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 50000000);
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn employees_cannot_list_or_read_others() {
        let (state, store, _) = test_app_state();
        store.add_employee(employee(1, "EMP-001", 30000.0)).unwrap();
        let app = test_app!(state);

        let req = as_user(TestRequest::get().uri("/api/employees"), "staff", Role::Employee);
        assert_eq!(test::call_service(&app, req.to_request()).await.status(), 403);

        let req = as_user(TestRequest::get().uri("/api/employees/1"), "staff", Role::Employee);
        assert_eq!(test::call_service(&app, req.to_request()).await.status(), 403);
    }

    #[actix_web::test]
    async fn unknown_employee_is_404() {
        let (state, _, _) = test_app_state();
        let app = test_app!(state);
        let req = as_user(TestRequest::get().uri("/api/employees/9"), "hr", Role::Hr);
        assert_eq!(test::call_service(&app, req.to_request()).await.status(), 404);
    }
}
