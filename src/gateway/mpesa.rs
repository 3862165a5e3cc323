use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{B2cReceipt, B2cRequest, GatewayError, PaymentGateway};

const B2C_PATH: &str = "/api/mpesa/b2c";

/// Keys the B2C relay has been seen to use for its transaction reference.
const REFERENCE_KEYS: [&str; 4] = [
    "ConversationID",
    "conversationId",
    "OriginatorConversationID",
    "transactionId",
];

#[derive(Debug, Clone)]
pub struct MpesaClient {
    client: reqwest::Client,
    base_url: String,
}

impl MpesaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                endpoint: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Pulls the explanation out of an error body, falling back to the raw text.
pub(crate) fn gateway_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                format!("gateway returned HTTP {status}")
            } else {
                body.to_string()
            }
        })
}

fn find_reference(body: &Value) -> Option<String> {
    let scopes = [Some(body), body.get("data")];
    scopes.into_iter().flatten().find_map(|scope| {
        REFERENCE_KEYS.iter().find_map(|key| {
            scope.get(*key).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        })
    })
}

#[async_trait]
impl PaymentGateway for MpesaClient {
    async fn send_b2c(&self, request: &B2cRequest) -> Result<B2cReceipt, GatewayError> {
        let url = format!("{}{}", self.base_url, B2C_PATH);
        debug!(
            employee_number = %request.employee_number,
            amount = request.amount,
            "Sending B2C payment"
        );

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                endpoint: url.clone(),
                source,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|source| GatewayError::Transport {
            endpoint: url.clone(),
            source,
        })?;

        if !status.is_success() {
            let message = gateway_message(&body, status.as_u16());
            error!(
                employee_number = %request.employee_number,
                status = status.as_u16(),
                %message,
                "B2C payment rejected"
            );
            return Err(GatewayError::Rejected {
                endpoint: url,
                status: status.as_u16(),
                message,
            });
        }

        // a 2xx means the money has moved, whatever the body looks like
        let raw: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&body) {
                Ok(json) => json,
                Err(e) => {
                    warn!(
                        employee_number = %request.employee_number,
                        error = %e,
                        "B2C accepted with a non-JSON body"
                    );
                    Value::String(body)
                }
            }
        };

        Ok(B2cReceipt {
            reference: find_reference(&raw),
            raw,
        })
    }
}
