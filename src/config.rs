use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::ConfigError;
use crate::model::payroll::PayrollPolicy;
use crate::utils::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub jwt_secret: String,
    /// Unset runs against the in-memory store.
    pub database_url: Option<String>,
    pub api_prefix: String,
    pub log_dir: String,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_disburse_per_min: u32,

    // Gateways
    pub mpesa_base_url: String,
    pub sms_base_url: String,
    pub sms_username: Option<String>,
    pub sms_password: Option<String>,
    pub sms_source: String,
    pub gateway_timeout: Duration,

    // Payroll and disbursement policy
    pub welfare_deduction: f64,
    pub per_diem_rate: f64,
    pub disbursement_delay: Duration,
    pub notify_max_attempts: u32,
    pub notify_base_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        fn parsed<T: FromStr>(
            value: Option<String>,
            key: &'static str,
            default: T,
        ) -> Result<T, ConfigError> {
            match value {
                Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { key, value: v }),
                None => Ok(default),
            }
        }

        let per_diem_rate: f64 = parsed(get("PER_DIEM_RATE"), "PER_DIEM_RATE", 0.33)?;
        if !(0.0..1.0).contains(&per_diem_rate) {
            return Err(ConfigError::Invalid {
                key: "PER_DIEM_RATE",
                value: per_diem_rate.to_string(),
            });
        }
        let welfare_deduction: f64 = parsed(get("WELFARE_DEDUCTION"), "WELFARE_DEDUCTION", 300.0)?;
        if !welfare_deduction.is_finite() || welfare_deduction < 0.0 {
            return Err(ConfigError::Invalid {
                key: "WELFARE_DEDUCTION",
                value: welfare_deduction.to_string(),
            });
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            jwt_secret: required("JWT_SECRET")?,
            database_url: get("DATABASE_URL"),
            api_prefix: get("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),

            rate_protected_per_min: parsed(
                get("RATE_PROTECTED_PER_MIN"),
                "RATE_PROTECTED_PER_MIN",
                1000,
            )?,
            rate_disburse_per_min: parsed(
                get("RATE_DISBURSE_PER_MIN"),
                "RATE_DISBURSE_PER_MIN",
                30,
            )?,

            mpesa_base_url: required("MPESA_BASE_URL")?,
            sms_base_url: required("SMS_BASE_URL")?,
            sms_username: get("SMS_USERNAME"),
            sms_password: get("SMS_PASSWORD"),
            sms_source: get("SMS_SOURCE").unwrap_or_else(|| "MFI".to_string()),
            gateway_timeout: Duration::from_secs(parsed(
                get("GATEWAY_TIMEOUT_SECS"),
                "GATEWAY_TIMEOUT_SECS",
                30,
            )?),

            welfare_deduction,
            per_diem_rate,
            disbursement_delay: Duration::from_millis(parsed(
                get("DISBURSEMENT_DELAY_MS"),
                "DISBURSEMENT_DELAY_MS",
                1000,
            )?),
            notify_max_attempts: parsed(get("NOTIFY_MAX_ATTEMPTS"), "NOTIFY_MAX_ATTEMPTS", 3)?,
            notify_base_delay: Duration::from_millis(parsed(
                get("NOTIFY_BASE_DELAY_MS"),
                "NOTIFY_BASE_DELAY_MS",
                1000,
            )?),
        })
    }

    pub fn payroll_policy(&self) -> PayrollPolicy {
        PayrollPolicy {
            per_diem_rate: self.per_diem_rate,
            welfare_deduction: self.welfare_deduction,
        }
    }

    pub fn notify_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.notify_max_attempts, self.notify_base_delay)
    }
}
