use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::PayPeriod;
use super::statutory::amount;

/// Entry in the salary advance ledger. Payroll only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryAdvance {
    pub id: u64,
    pub employee_number: String,
    pub amount_requested: f64,
    pub time_added: DateTime<Utc>,
    pub status: String,
    pub payment_processed: bool,
}

impl SalaryAdvance {
    /// Paid out and processed, so it must be recovered from salary.
    pub fn is_recoverable(&self) -> bool {
        self.payment_processed && self.status.eq_ignore_ascii_case("paid")
    }

    pub fn period(&self) -> PayPeriod {
        PayPeriod::containing(&self.time_added)
    }
}

/// Sum of the recoverable advances one employee took in `period`.
pub fn advances_for(employee_number: &str, period: PayPeriod, ledger: &[SalaryAdvance]) -> f64 {
    ledger
        .iter()
        .filter(|a| a.employee_number == employee_number)
        .filter(|a| a.is_recoverable() && a.period() == period)
        .map(|a| amount(a.amount_requested))
        .sum()
}
