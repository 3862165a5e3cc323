use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::mpesa::gateway_message;
use super::{GatewayError, SmsGateway};

#[derive(Debug, Clone)]
pub struct SmsCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<SmsCredentials>,
    source: String,
}

impl SmsClient {
    pub fn new(
        base_url: &str,
        credentials: Option<SmsCredentials>,
        source: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
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
            credentials,
            source: source.to_string(),
        })
    }

    fn credentials(&self) -> Result<&SmsCredentials, GatewayError> {
        self.credentials
            .as_ref()
            .ok_or(GatewayError::NotConfigured("SMS gateway credentials"))
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<(u16, String), GatewayError> {
        let creds = self.credentials()?;
        let resp = self
            .client
            .get(url)
            .basic_auth(&creds.username, Some(&creds.password))
            .query(query)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                endpoint: url.to_string(),
                source,
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|source| GatewayError::Transport {
            endpoint: url.to_string(),
            source,
        })?;
        Ok((status, body))
    }
}

fn reports_success(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("status").and_then(Value::as_str).map(str::to_string))
        .is_some_and(|s| s.eq_ignore_ascii_case("success"))
}

fn parse_balance(body: &Value) -> Option<f64> {
    let field = body
        .get("balance")
        .or_else(|| body.get("data").and_then(|d| d.get("balance")))?;
    match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl SmsGateway for SmsClient {
    async fn send(&self, destination: &str, message: &str) -> Result<(), GatewayError> {
        let url = format!("{}/sms/send", self.base_url);
        let creds = self.credentials()?;
        let query = [
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
            ("message", message),
            ("destination", destination),
            ("source", self.source.as_str()),
        ];

        let (status, body) = self.get(&url, &query).await?;
        if (200..300).contains(&status) || reports_success(&body) {
            debug!(destination, "SMS accepted");
            return Ok(());
        }

        Err(GatewayError::Rejected {
            message: gateway_message(&body, status),
            endpoint: url,
            status,
        })
    }

    async fn balance(&self) -> Result<f64, GatewayError> {
        let url = format!("{}/balance", self.base_url);
        let (status, body) = self.get(&url, &[]).await?;
        if !(200..300).contains(&status) {
            return Err(GatewayError::Rejected {
                message: gateway_message(&body, status),
                endpoint: url,
                status,
            });
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| GatewayError::Decode {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;
        parse_balance(&json).ok_or(GatewayError::Decode {
            endpoint: url,
            reason: "no balance field in response".to_string(),
        })
    }
}
