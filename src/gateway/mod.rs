//! Outbound HTTP collaborators: the M-Pesa B2C relay and the SMS provider.
//!
//! Both sit behind object-safe traits so the workflow can be driven against
//! fakes in tests. Neither client retries; retry policy belongs to callers.

pub mod mpesa;
pub mod sms;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mpesa::MpesaClient;
pub use sms::SmsClient;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Non-2xx status; `message` is the gateway's own explanation when it sent one.
    #[error("{message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Body of `POST /api/mpesa/b2c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct B2cRequest {
    pub phone_number: String,
    pub amount: f64,
    pub employee_number: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct B2cReceipt {
    /// Conversation or transaction id, when the gateway returned one.
    pub reference: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn send_b2c(&self, request: &B2cRequest) -> Result<B2cReceipt, GatewayError>;
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), GatewayError>;

    async fn balance(&self) -> Result<f64, GatewayError>;
}
