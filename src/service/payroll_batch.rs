use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::employee::{Employee, EmployeeFilter};
use crate::model::payroll::{Eligibility, PayrollLine, PayrollPolicy, calculate_payroll_line};
use crate::model::period::PayPeriod;
use crate::model::salary_advance::SalaryAdvance;
use crate::model::statutory::{StatutoryConfig, round2};
use crate::store::PayrollStore;

/// Column sums over every line of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PayrollTotals {
    pub employee_count: usize,
    pub basic_salary: f64,
    pub per_diem: f64,
    pub gross_pay: f64,
    pub taxable_gross: f64,
    pub paye_tax: f64,
    pub nhif_deduction: f64,
    pub nssf_deduction: f64,
    pub housing_levy: f64,
    pub advance_deduction: f64,
    pub welfare_deduction: f64,
    pub total_deductions: f64,
    pub net_pay: f64,
}

impl PayrollTotals {
    fn add(&mut self, line: &PayrollLine) {
        self.employee_count += 1;
        self.basic_salary += line.basic_salary;
        self.per_diem += line.per_diem;
        self.gross_pay += line.gross_pay;
        self.taxable_gross += line.taxable_gross;
        self.paye_tax += line.paye_tax;
        self.nhif_deduction += line.nhif_deduction;
        self.nssf_deduction += line.nssf_deduction;
        self.housing_levy += line.housing_levy;
        self.advance_deduction += line.advance_deduction;
        self.welfare_deduction += line.welfare_deduction;
        self.total_deductions += line.total_deductions;
        self.net_pay += line.net_pay;
    }

    fn rounded(self) -> Self {
        Self {
            employee_count: self.employee_count,
            basic_salary: round2(self.basic_salary),
            per_diem: round2(self.per_diem),
            gross_pay: round2(self.gross_pay),
            taxable_gross: round2(self.taxable_gross),
            paye_tax: round2(self.paye_tax),
            nhif_deduction: round2(self.nhif_deduction),
            nssf_deduction: round2(self.nssf_deduction),
            housing_levy: round2(self.housing_levy),
            advance_deduction: round2(self.advance_deduction),
            welfare_deduction: round2(self.welfare_deduction),
            total_deductions: round2(self.total_deductions),
            net_pay: round2(self.net_pay),
        }
    }
}

/// Payroll for one period across a set of employees, computed with a single
/// settings snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollBatch {
    #[schema(value_type = String, example = "2025-03")]
    pub period: PayPeriod,
    pub override_statutory_checks: bool,
    /// Id of the stored settings used, `None` when running on defaults.
    pub settings_id: Option<u64>,
    pub lines: Vec<PayrollLine>,
    pub totals: PayrollTotals,
    /// Employee numbers whose deductions exceed their gross pay.
    pub negative_net_pay: Vec<String>,
}

/// Settings in force now: the newest stored row, or the built-in defaults
/// when none was ever saved.
pub async fn current_settings(
    store: &dyn PayrollStore,
) -> Result<(Option<u64>, StatutoryConfig), AppError> {
    Ok(match store.latest_statutory_settings().await? {
        Some(record) => (Some(record.id), record.settings),
        None => {
            debug!("No stored statutory settings, using defaults");
            (None, StatutoryConfig::default())
        }
    })
}

pub fn build_batch(
    employees: &[Employee],
    settings: &StatutoryConfig,
    settings_id: Option<u64>,
    period: PayPeriod,
    override_statutory_checks: bool,
    advances: &[SalaryAdvance],
    policy: &PayrollPolicy,
) -> PayrollBatch {
    let mut totals = PayrollTotals::default();
    let mut negative_net_pay = Vec::new();
    let lines: Vec<PayrollLine> = employees
        .iter()
        .map(|employee| {
            let eligibility = Eligibility::for_employee(employee, override_statutory_checks);
            let line =
                calculate_payroll_line(employee, settings, period, eligibility, advances, policy);
            totals.add(&line);
            if line.is_negative() {
                negative_net_pay.push(line.employee_number.clone());
            }
            line
        })
        .collect();

    PayrollBatch {
        period,
        override_statutory_checks,
        settings_id,
        lines,
        totals: totals.rounded(),
        negative_net_pay,
    }
}

/// Loads everything a batch needs from the store and computes it.
pub async fn load_batch(
    store: &dyn PayrollStore,
    filter: &EmployeeFilter,
    period: PayPeriod,
    override_statutory_checks: bool,
    policy: &PayrollPolicy,
) -> Result<PayrollBatch, AppError> {
    let (settings_id, settings) = current_settings(store).await?;
    let employees = store.list_employees(filter).await?;
    let advances = store.paid_advances(period).await?;

    let batch = build_batch(
        &employees,
        &settings,
        settings_id,
        period,
        override_statutory_checks,
        &advances,
        policy,
    );
    info!(
        %period,
        employees = batch.totals.employee_count,
        net_pay = batch.totals.net_pay,
        negative = batch.negative_net_pay.len(),
        "Payroll batch computed"
    );
    Ok(batch)
}

pub async fn employee_line(
    store: &dyn PayrollStore,
    employee_id: u64,
    period: PayPeriod,
    override_statutory_checks: bool,
    policy: &PayrollPolicy,
) -> Result<PayrollLine, AppError> {
    let employee = store
        .get_employee(employee_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Employee {employee_id} not found")))?;
    let (_, settings) = current_settings(store).await?;
    let advances = store.paid_advances(period).await?;
    Ok(calculate_payroll_line(
        &employee,
        &settings,
        period,
        Eligibility::for_employee(&employee, override_statutory_checks),
        &advances,
        policy,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::employee;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn march() -> PayPeriod {
        PayPeriod::new(2025, 3).unwrap()
    }

    #[test]
    fn totals_sum_every_line() {
        let staff = [employee(1, "EMP-1", 30000.0), employee(2, "EMP-2", 50000.0)];
        let batch = build_batch(
            &staff,
            &StatutoryConfig::default(),
            None,
            march(),
            false,
            &[],
            &PayrollPolicy::default(),
        );

        assert_eq!(batch.lines.len(), 2);
        assert_eq!(batch.totals.employee_count, 2);
        assert_relative_eq!(batch.totals.gross_pay, 80000.0);
        assert_relative_eq!(
            batch.totals.net_pay,
            round2(batch.lines[0].net_pay + batch.lines[1].net_pay)
        );
        assert_relative_eq!(batch.totals.welfare_deduction, 600.0);
        assert!(batch.negative_net_pay.is_empty());
    }

    #[test]
    fn deductions_over_gross_are_flagged_not_clamped() {
        let mut low = employee(1, "EMP-1", 200.0);
        low.tax_pin = None;
        let batch = build_batch(
            &[low],
            &StatutoryConfig::default(),
            None,
            march(),
            false,
            &[],
            &PayrollPolicy::default(),
        );
        assert!(batch.lines[0].net_pay < 0.0);
        assert_eq!(batch.negative_net_pay, vec!["EMP-1".to_string()]);
    }

    #[test]
    fn empty_roster_gives_empty_batch() {
        let batch = build_batch(
            &[],
            &StatutoryConfig::default(),
            Some(4),
            march(),
            true,
            &[],
            &PayrollPolicy::default(),
        );
        assert!(batch.lines.is_empty());
        assert_eq!(batch.totals, PayrollTotals::default());
        assert_eq!(batch.settings_id, Some(4));
    }

    #[actix_web::test]
    async fn load_uses_stored_settings_and_period_advances() {
        let store = MemoryStore::new();
        store.add_employee(employee(1, "EMP-1", 30000.0)).unwrap();
        let mut left = employee(2, "EMP-2", 30000.0);
        left.status = "terminated".into();
        store.add_employee(left).unwrap();
        store
            .add_advance(SalaryAdvance {
                id: 1,
                employee_number: "EMP-1".into(),
                amount_requested: 2000.0,
                time_added: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
                status: "paid".into(),
                payment_processed: true,
            })
            .unwrap();
        let settings = StatutoryConfig {
            personal_relief: 0.0,
            ..StatutoryConfig::default()
        };
        let record = store.insert_statutory_settings(&settings, "admin").await.unwrap();

        let batch = load_batch(
            &store,
            &EmployeeFilter::active(),
            march(),
            false,
            &PayrollPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(batch.settings_id, Some(record.id));
        assert_eq!(batch.lines.len(), 1);
        assert_relative_eq!(batch.lines[0].advance_deduction, 2000.0);
        assert_relative_eq!(batch.lines[0].tax_relief, 0.0);

        let april = load_batch(
            &store,
            &EmployeeFilter::active(),
            PayPeriod::new(2025, 4).unwrap(),
            false,
            &PayrollPolicy::default(),
        )
        .await
        .unwrap();
        assert_relative_eq!(april.lines[0].advance_deduction, 0.0);
    }

    #[actix_web::test]
    async fn defaults_apply_when_nothing_is_stored() {
        let store = MemoryStore::new();
        let (id, settings) = current_settings(&store).await.unwrap();
        assert_eq!(id, None);
        assert_eq!(settings, StatutoryConfig::default());
    }

    #[actix_web::test]
    async fn single_line_for_unknown_employee_is_not_found() {
        let store = MemoryStore::new();
        let result = employee_line(&store, 9, march(), false, &PayrollPolicy::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
