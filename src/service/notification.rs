use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::gateway::{GatewayError, SmsGateway};
use crate::utils::phone::normalize_phone;
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SmsMessage {
    #[schema(example = "0712345678")]
    pub phone_number: String,
    #[schema(example = "Your March payslip is ready.")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SmsDelivery {
    pub destination: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct BulkSmsSummary {
    pub success_count: usize,
    pub total_count: usize,
    pub deliveries: Vec<SmsDelivery>,
}

/// Best-effort SMS delivery. Failures are reported in the result, never raised.
#[derive(Clone)]
pub struct Notifier {
    sms: Arc<dyn SmsGateway>,
    retry: RetryPolicy,
}

impl Notifier {
    pub fn new(sms: Arc<dyn SmsGateway>, retry: RetryPolicy) -> Self {
        Self { sms, retry }
    }

    pub async fn send_sms(&self, phone_number: &str, message: &str) -> SmsDelivery {
        let destination = match normalize_phone(Some(phone_number)) {
            Ok(d) => d,
            Err(e) => {
                warn!(phone_number, error = %e, "Skipping SMS to unusable number");
                return SmsDelivery {
                    destination: phone_number.to_string(),
                    success: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let sms = &self.sms;
        let dest = destination.as_str();
        let result = self
            .retry
            .run("SMS delivery", |_| sms.send(dest, message))
            .await;

        match result {
            Ok(()) => SmsDelivery {
                destination,
                success: true,
                error: None,
            },
            Err(e) => {
                warn!(
                    %destination,
                    error = %e,
                    "SMS gateway unavailable, would have sent: {message}"
                );
                SmsDelivery {
                    destination,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Sends one message at a time, in input order.
    pub async fn send_bulk(&self, messages: &[SmsMessage]) -> BulkSmsSummary {
        let mut summary = BulkSmsSummary {
            total_count: messages.len(),
            ..BulkSmsSummary::default()
        };
        for m in messages {
            let delivery = self.send_sms(&m.phone_number, &m.message).await;
            if delivery.success {
                summary.success_count += 1;
            }
            summary.deliveries.push(delivery);
        }
        info!(
            success_count = summary.success_count,
            total_count = summary.total_count,
            "Bulk SMS finished"
        );
        summary
    }

    pub async fn balance(&self) -> Result<f64, GatewayError> {
        self.sms.balance().await
    }
}

pub fn payment_confirmation(
    full_name: &str,
    amount: f64,
    phone_number: &str,
    reference: Option<&str>,
) -> String {
    format!(
        "Dear {full_name}, KES {amount:.2} has been sent to your M-Pesa {phone_number}. Ref: {}",
        reference.unwrap_or("N/A")
    )
}
