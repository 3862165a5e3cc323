use std::sync::Arc;
use std::time::Duration;

use actix_web::rt::time::sleep;
use tracing::{error, info, warn};

use super::notification::{Notifier, payment_confirmation};
use crate::error::AppError;
use crate::gateway::{B2cReceipt, B2cRequest, PaymentGateway};
use crate::model::payment_request::{Disbursee, DisbursementSummary, PayeeOutcome, PaymentTarget};
use crate::utils::phone::normalize_phone;

/// Pushes net pay to employee wallets and confirms each payment by SMS.
pub struct DisbursementExecutor {
    gateway: Arc<dyn PaymentGateway>,
    notifier: Notifier,
    inter_call_delay: Duration,
}

impl DisbursementExecutor {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
        inter_call_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            notifier,
            inter_call_delay,
        }
    }

    /// Pays one employee. A missing or malformed phone number fails before
    /// any gateway call. The confirmation SMS runs detached and its outcome
    /// never affects the result.
    pub async fn disburse_single(&self, payee: &Disbursee) -> Result<B2cReceipt, AppError> {
        let phone_number = normalize_phone(payee.phone_number.as_deref())?;
        if !payee.net_pay.is_finite() || payee.net_pay <= 0.0 {
            return Err(AppError::validation(format!(
                "Invalid amount {} for employee {}",
                payee.net_pay, payee.employee_number
            )));
        }

        let request = B2cRequest {
            phone_number: phone_number.clone(),
            amount: payee.net_pay,
            employee_number: payee.employee_number.clone(),
            full_name: payee.full_name.clone(),
        };
        let receipt = self.gateway.send_b2c(&request).await.map_err(|e| {
            error!(
                employee_number = %payee.employee_number,
                error = %e,
                "B2C payment failed"
            );
            e
        })?;

        info!(
            employee_number = %payee.employee_number,
            amount = payee.net_pay,
            reference = receipt.reference.as_deref().unwrap_or("-"),
            "B2C payment accepted"
        );
        self.confirm(payee, phone_number, receipt.reference.clone());
        Ok(receipt)
    }

    fn confirm(&self, payee: &Disbursee, phone_number: String, reference: Option<String>) {
        let notifier = self.notifier.clone();
        let message = payment_confirmation(
            &payee.full_name,
            payee.net_pay,
            &phone_number,
            reference.as_deref(),
        );
        let employee_number = payee.employee_number.clone();
        actix_web::rt::spawn(async move {
            let delivery = notifier.send_sms(&phone_number, &message).await;
            if !delivery.success {
                warn!(%employee_number, "Payment confirmation SMS was not delivered");
            }
        });
    }

    /// Pays each employee in order with a pause between gateway calls.
    /// One failure never stops the rest.
    pub async fn disburse_bulk(&self, payees: &[Disbursee]) -> DisbursementSummary {
        let mut summary = DisbursementSummary {
            total_count: payees.len(),
            ..DisbursementSummary::default()
        };
        for (i, payee) in payees.iter().enumerate() {
            if i > 0 && !self.inter_call_delay.is_zero() {
                sleep(self.inter_call_delay).await;
            }
            let outcome = match self.disburse_single(payee).await {
                Ok(receipt) => {
                    summary.success_count += 1;
                    PayeeOutcome {
                        employee_number: payee.employee_number.clone(),
                        amount: payee.net_pay,
                        success: true,
                        reference: receipt.reference,
                        error: None,
                    }
                }
                Err(e) => PayeeOutcome {
                    employee_number: payee.employee_number.clone(),
                    amount: payee.net_pay,
                    success: false,
                    reference: None,
                    error: Some(e.to_string()),
                },
            };
            summary.outcomes.push(outcome);
        }
        info!(
            success_count = summary.success_count,
            total_count = summary.total_count,
            "Bulk disbursement finished"
        );
        summary
    }

    /// Runs a request's target. A single payment surfaces its error; a bulk
    /// run always yields a summary.
    pub async fn execute(&self, target: &PaymentTarget) -> Result<DisbursementSummary, AppError> {
        match target {
            PaymentTarget::Single { employee_data } => {
                let receipt = self.disburse_single(employee_data).await?;
                Ok(DisbursementSummary {
                    success_count: 1,
                    total_count: 1,
                    outcomes: vec![PayeeOutcome {
                        employee_number: employee_data.employee_number.clone(),
                        amount: employee_data.net_pay,
                        success: true,
                        reference: receipt.reference,
                        error: None,
                    }],
                })
            }
            PaymentTarget::Bulk { employees_data } => Ok(self.disburse_bulk(employees_data).await),
        }
    }
}
