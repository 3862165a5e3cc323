use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::employee::Employee;
use super::period::PayPeriod;
use super::salary_advance::{SalaryAdvance, advances_for};
use super::statutory::{StatutoryConfig, amount, round2};

/// Which statutory deductions apply to one employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Eligibility {
    pub nhif: bool,
    pub nssf: bool,
    /// PAYE and the housing levy both hang off the tax PIN.
    pub tax: bool,
}

impl Eligibility {
    pub fn all() -> Self {
        Self {
            nhif: true,
            nssf: true,
            tax: true,
        }
    }

    /// Derived from the identifiers on file, or everything when overridden.
    pub fn for_employee(employee: &Employee, override_statutory_checks: bool) -> Self {
        if override_statutory_checks {
            return Self::all();
        }
        fn present(id: &Option<String>) -> bool {
            id.as_deref().is_some_and(|v| !v.trim().is_empty())
        }
        Self {
            nhif: present(&employee.nhif_number),
            nssf: present(&employee.nssf_number),
            tax: present(&employee.tax_pin),
        }
    }
}

/// Organisation policy values that sit outside the statutory settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayrollPolicy {
    /// Fraction of basic salary carved out as non-taxable per diem.
    pub per_diem_rate: f64,
    /// Flat welfare contribution, independent of salary.
    pub welfare_deduction: f64,
}

impl Default for PayrollPolicy {
    fn default() -> Self {
        Self {
            per_diem_rate: 0.33,
            welfare_deduction: 300.0,
        }
    }
}

/// One employee's computed pay for one period. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayrollLine {
    pub employee_id: u64,
    pub employee_number: String,
    pub full_name: String,
    #[schema(value_type = String, example = "2025-03")]
    pub pay_period: PayPeriod,

    pub basic_salary: f64,
    pub house_allowance: f64,
    pub transport_allowance: f64,
    pub medical_allowance: f64,
    pub other_allowances: f64,
    pub overtime_pay: f64,
    pub commission: f64,
    pub bonus: f64,
    pub per_diem: f64,

    pub taxable_gross: f64,
    pub paye_tax: f64,
    pub nhif_deduction: f64,
    pub nssf_deduction: f64,
    pub housing_levy: f64,
    /// Already netted inside `paye_tax`; reported for payslips only.
    pub tax_relief: f64,

    pub loan_deduction: f64,
    pub advance_deduction: f64,
    pub welfare_deduction: f64,
    pub other_deductions: f64,

    pub gross_pay: f64,
    pub total_deductions: f64,
    pub net_pay: f64,
}

impl PayrollLine {
    /// Deductions exceed gross. Reported, never clamped.
    pub fn is_negative(&self) -> bool {
        self.net_pay < 0.0
    }
}

/// Computes one payroll line. The order of the steps is significant:
/// per diem leaves the taxable base first, the three statutory levies are
/// taken from what remains, and PAYE runs on the balance.
pub fn calculate_payroll_line(
    employee: &Employee,
    settings: &StatutoryConfig,
    period: PayPeriod,
    eligibility: Eligibility,
    advances: &[SalaryAdvance],
    policy: &PayrollPolicy,
) -> PayrollLine {
    let basic_salary = amount(employee.basic_salary);
    let house_allowance = amount(employee.house_allowance);
    let transport_allowance = amount(employee.transport_allowance);
    let medical_allowance = amount(employee.medical_allowance);
    let other_allowances = amount(employee.other_allowances);
    let overtime_pay = round2(amount(employee.overtime_hours) * amount(employee.overtime_rate));
    let commission = amount(employee.commission);
    let bonus = amount(employee.bonus);

    let per_diem = round2(basic_salary * policy.per_diem_rate);

    let gross_pay = round2(
        basic_salary
            + house_allowance
            + transport_allowance
            + medical_allowance
            + other_allowances
            + overtime_pay
            + commission
            + bonus,
    );
    let taxable_gross = round2(gross_pay - per_diem);

    let nhif_deduction = if eligibility.nhif {
        settings.calculate_nhif(taxable_gross)
    } else {
        0.0
    };
    let nssf_deduction = if eligibility.nssf {
        settings.calculate_nssf(taxable_gross)
    } else {
        0.0
    };
    let housing_levy = if eligibility.tax {
        settings.calculate_housing_levy(taxable_gross, true)
    } else {
        0.0
    };

    let taxable_for_paye = taxable_gross - nhif_deduction - nssf_deduction - housing_levy;
    let paye_tax = if eligibility.tax {
        settings.calculate_paye(taxable_for_paye)
    } else {
        0.0
    };
    let tax_relief = paye_tax.min(settings.personal_relief);

    let advance_deduction = round2(advances_for(&employee.employee_number, period, advances));
    let welfare_deduction = round2(amount(policy.welfare_deduction));
    // voluntary deductions are switched off in the current policy
    let loan_deduction = 0.0;
    let other_deductions = 0.0;

    let total_deductions = round2(
        paye_tax
            + nhif_deduction
            + nssf_deduction
            + housing_levy
            + loan_deduction
            + advance_deduction
            + welfare_deduction
            + other_deductions,
    );
    let net_pay = round2(gross_pay - total_deductions);

    PayrollLine {
        employee_id: employee.id,
        employee_number: employee.employee_number.clone(),
        full_name: employee.full_name.clone(),
        pay_period: period,
        basic_salary,
        house_allowance,
        transport_allowance,
        medical_allowance,
        other_allowances,
        overtime_pay,
        commission,
        bonus,
        per_diem,
        taxable_gross,
        paye_tax,
        nhif_deduction,
        nssf_deduction,
        housing_levy,
        tax_relief,
        loan_deduction,
        advance_deduction,
        welfare_deduction,
        other_deductions,
        gross_pay,
        total_deductions,
        net_pay,
    }
}
