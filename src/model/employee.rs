use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Static HR attributes the payroll is computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(default)]
#[schema(
    example = json!({
        "id": 1,
        "employee_number": "EMP-001",
        "full_name": "Jane Wanjiku",
        "phone_number": "0712345678",
        "branch": "Nakuru",
        "department": "Credit",
        "status": "active",
        "basic_salary": 30000.0,
        "house_allowance": 0.0,
        "transport_allowance": 0.0,
        "medical_allowance": 0.0,
        "other_allowances": 0.0,
        "overtime_hours": 0.0,
        "overtime_rate": 0.0,
        "commission": 0.0,
        "bonus": 0.0,
        "nhif_number": "SHA-1234",
        "nssf_number": "NSSF-5678",
        "tax_pin": "A012345678Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_number: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub status: String,

    pub basic_salary: f64,
    pub house_allowance: f64,
    pub transport_allowance: f64,
    pub medical_allowance: f64,
    pub other_allowances: f64,
    pub overtime_hours: f64,
    pub overtime_rate: f64,
    pub commission: f64,
    pub bonus: f64,

    /// NHIF / SHIF member number
    pub nhif_number: Option<String>,
    pub nssf_number: Option<String>,
    pub tax_pin: Option<String>,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Filters shared by the employee list and the payroll batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeFilter {
    pub branch: Option<String>,
    pub department: Option<String>,
    /// `None` keeps every status.
    pub status: Option<String>,
    pub search: Option<String>,
}

impl EmployeeFilter {
    pub fn active() -> Self {
        Self {
            status: Some("active".to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, employee: &Employee) -> bool {
        fn same(wanted: &Option<String>, actual: Option<&str>) -> bool {
            match wanted.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
                Some(w) => actual.is_some_and(|a| a.eq_ignore_ascii_case(w)),
                None => true,
            }
        }

        if !same(&self.branch, employee.branch.as_deref())
            || !same(&self.department, employee.department.as_deref())
            || !same(&self.status, Some(employee.status.as_str()))
        {
            return false;
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                employee.full_name.to_lowercase().contains(&term)
                    || employee.employee_number.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}
