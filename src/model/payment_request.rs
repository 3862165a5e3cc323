//! Maker-checker payment requests.
//!
//! ```text
//! pending ──approve──▶ approved ──▶ completed
//!    │                     └──────▶ failed
//!    └──reject───▶ rejected
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::statutory::round2;
use crate::error::AppError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Rejected | PaymentStatus::Completed | PaymentStatus::Failed
        )
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed) | (Approved, Failed)
        )
    }
}

/// Somebody to be paid: identity, wallet and the net pay owed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Disbursee {
    #[schema(example = "EMP-001")]
    pub employee_number: String,
    #[schema(example = "Jane Wanjiku")]
    pub full_name: String,
    #[schema(example = "0712345678")]
    pub phone_number: Option<String>,
    #[schema(example = 27639.75)]
    pub net_pay: f64,
}

/// Single payee XOR bulk list, enforced by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaymentTarget {
    Single { employee_data: Disbursee },
    Bulk { employees_data: Vec<Disbursee> },
}

impl PaymentTarget {
    pub fn disbursees(&self) -> &[Disbursee] {
        match self {
            PaymentTarget::Single { employee_data } => std::slice::from_ref(employee_data),
            PaymentTarget::Bulk { employees_data } => employees_data,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PaymentTarget::Single { .. } => "single",
            PaymentTarget::Bulk { .. } => "bulk",
        }
    }

    pub fn total_amount(&self) -> f64 {
        round2(self.disbursees().iter().map(|d| d.net_pay).sum())
    }

    /// Rejects empty batches and non-positive or non-numeric amounts.
    pub fn validate(&self) -> Result<(), AppError> {
        let payees = self.disbursees();
        if payees.is_empty() {
            return Err(AppError::validation("At least one employee is required"));
        }
        for payee in payees {
            if payee.employee_number.trim().is_empty() {
                return Err(AppError::validation("Employee number is required"));
            }
            if !payee.net_pay.is_finite() || payee.net_pay <= 0.0 {
                return Err(AppError::validation(format!(
                    "Invalid amount {} for employee {}",
                    payee.net_pay, payee.employee_number
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of one payee inside a disbursement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayeeOutcome {
    pub employee_number: String,
    pub amount: f64,
    pub success: bool,
    pub reference: Option<String>,
    pub error: Option<String>,
}

/// Tally of a single or bulk disbursement, kept on the request as metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DisbursementSummary {
    pub success_count: usize,
    pub total_count: usize,
    pub outcomes: Vec<PayeeOutcome>,
}

impl DisbursementSummary {
    pub fn all_succeeded(&self) -> bool {
        self.total_count > 0 && self.success_count == self.total_count
    }

    pub fn failures(&self) -> impl Iterator<Item = &PayeeOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// Every payee marked unpaid with the same error, for a run that
    /// stopped before producing its own tally.
    pub fn all_failed(payees: &[Disbursee], error: &str) -> Self {
        Self {
            success_count: 0,
            total_count: payees.len(),
            outcomes: payees
                .iter()
                .map(|p| PayeeOutcome {
                    employee_number: p.employee_number.clone(),
                    amount: p.net_pay,
                    success: false,
                    reference: None,
                    error: Some(error.to_string()),
                })
                .collect(),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} of {} payments succeeded",
            self.success_count, self.total_count
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: String,
    #[serde(flatten)]
    pub target: PaymentTarget,
    pub justification: Option<String>,
    pub total_amount: f64,
    pub status: PaymentStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,

    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_comment: Option<String>,

    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub disbursement: Option<DisbursementSummary>,
}

impl PaymentRequest {
    /// A fresh `pending` request with its total precomputed.
    pub fn new(
        id: String,
        target: PaymentTarget,
        justification: Option<String>,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            total_amount: target.total_amount(),
            target,
            justification,
            status: PaymentStatus::Pending,
            created_by,
            created_at,
            approved_by: None,
            approved_at: None,
            approval_comment: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
            disbursement: None,
        }
    }

    fn ensure_can_move_to(&self, next: PaymentStatus) -> Result<(), AppError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            })
        }
    }

    pub fn approve(
        &mut self,
        by: &str,
        at: DateTime<Utc>,
        comment: Option<String>,
    ) -> Result<(), AppError> {
        self.ensure_can_move_to(PaymentStatus::Approved)?;
        self.status = PaymentStatus::Approved;
        self.approved_by = Some(by.to_string());
        self.approved_at = Some(at);
        self.approval_comment = comment;
        Ok(())
    }

    pub fn reject(&mut self, by: &str, at: DateTime<Utc>, reason: &str) -> Result<(), AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation("A rejection reason is required"));
        }
        self.ensure_can_move_to(PaymentStatus::Rejected)?;
        self.status = PaymentStatus::Rejected;
        self.rejected_by = Some(by.to_string());
        self.rejected_at = Some(at);
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn complete(
        &mut self,
        at: DateTime<Utc>,
        summary: DisbursementSummary,
    ) -> Result<(), AppError> {
        self.ensure_can_move_to(PaymentStatus::Completed)?;
        self.status = PaymentStatus::Completed;
        self.completed_at = Some(at);
        self.disbursement = Some(summary);
        Ok(())
    }

    pub fn fail(
        &mut self,
        at: DateTime<Utc>,
        reason: String,
        summary: Option<DisbursementSummary>,
    ) -> Result<(), AppError> {
        self.ensure_can_move_to(PaymentStatus::Failed)?;
        self.status = PaymentStatus::Failed;
        self.failed_at = Some(at);
        self.failure_reason = Some(reason);
        self.disbursement = summary;
        Ok(())
    }
}
