//! Fakes and fixtures shared by unit and endpoint tests.

use std::sync::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

use crate::auth::jwt::Claims;
use crate::config::Config;
use crate::gateway::{B2cReceipt, B2cRequest, GatewayError, PaymentGateway, SmsGateway};
use crate::model::employee::Employee;
use crate::model::payment_request::Disbursee;
use crate::model::role::{Actor, Role};
use crate::service::disbursement::DisbursementExecutor;
use crate::service::notification::Notifier;
use crate::utils::retry::RetryPolicy;

/// Records every B2C call; payments for listed employee numbers are refused.
#[derive(Default)]
pub struct FakePaymentGateway {
    failing: Vec<String>,
    calls: Mutex<Vec<B2cRequest>>,
    call_times: Mutex<Vec<Instant>>,
}

impl FakePaymentGateway {
    pub fn failing_for(employee_numbers: &[&str]) -> Self {
        Self {
            failing: employee_numbers.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<B2cRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn send_b2c(&self, request: &B2cRequest) -> Result<B2cReceipt, GatewayError> {
        self.call_times.lock().unwrap().push(Instant::now());
        let mut calls = self.calls.lock().unwrap();
        calls.push(request.clone());
        if self.failing.contains(&request.employee_number) {
            return Err(GatewayError::Rejected {
                endpoint: "fake".into(),
                status: 400,
                message: format!("Insufficient float for {}", request.employee_number),
            });
        }
        let reference = format!("AG_{}", calls.len());
        Ok(B2cReceipt {
            raw: json!({ "ConversationID": reference }),
            reference: Some(reference),
        })
    }
}

#[derive(Default)]
pub struct FakeSmsGateway {
    fail_first: usize,
    attempts: Mutex<usize>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeSmsGateway {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for FakeSmsGateway {
    async fn send(&self, destination: &str, message: &str) -> Result<(), GatewayError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if attempt <= self.fail_first {
            return Err(GatewayError::Rejected {
                endpoint: "fake".into(),
                status: 503,
                message: "SMS provider unavailable".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.to_string()));
        Ok(())
    }

    async fn balance(&self) -> Result<f64, GatewayError> {
        Ok(1250.5)
    }
}

pub fn payee(employee_number: &str, phone_number: &str, net_pay: f64) -> Disbursee {
    Disbursee {
        employee_number: employee_number.into(),
        full_name: format!("Staff {employee_number}"),
        phone_number: Some(phone_number.into()),
        net_pay,
    }
}

/// Active employee with every statutory identifier on file.
pub fn employee(id: u64, employee_number: &str, basic_salary: f64) -> Employee {
    Employee {
        id,
        employee_number: employee_number.into(),
        full_name: format!("Staff {employee_number}"),
        phone_number: Some("0712345678".into()),
        branch: Some("Nairobi".into()),
        department: Some("Credit".into()),
        status: "active".into(),
        basic_salary,
        nhif_number: Some(format!("NHIF-{id}")),
        nssf_number: Some(format!("NSSF-{id}")),
        tax_pin: Some(format!("A00{id}P")),
        ..Employee::default()
    }
}

pub fn actor(username: &str, role: Role) -> Actor {
    Actor {
        user_id: 1,
        username: username.into(),
        role,
    }
}

pub fn executor(gateway: Arc<FakePaymentGateway>) -> DisbursementExecutor {
    paced_executor(gateway, Duration::ZERO)
}

pub fn paced_executor(
    gateway: Arc<FakePaymentGateway>,
    inter_call_delay: Duration,
) -> DisbursementExecutor {
    let notifier = Notifier::new(
        Arc::new(FakeSmsGateway::default()),
        RetryPolicy::new(1, Duration::ZERO),
    );
    DisbursementExecutor::new(gateway, notifier, inter_call_delay)
}

pub fn issue_token(secret: &str, user_id: u64, username: &str, role: u8, ttl_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + ttl_secs;
    let claims = Claims {
        user_id,
        sub: username.into(),
        role,
        exp: exp.max(0) as usize,
        employee_id: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub const TEST_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config::from_lookup(|key| {
        match key {
            "SERVER_ADDR" => Some("127.0.0.1:0"),
            "JWT_SECRET" => Some(TEST_SECRET),
            "MPESA_BASE_URL" => Some("http://mpesa.invalid"),
            "SMS_BASE_URL" => Some("http://sms.invalid"),
            "DISBURSEMENT_DELAY_MS" => Some("0"),
            "NOTIFY_MAX_ATTEMPTS" => Some("1"),
            "NOTIFY_BASE_DELAY_MS" => Some("0"),
            _ => None,
        }
        .map(str::to_string)
    })
    .unwrap()
}

pub fn bearer(username: &str, role: Role) -> (&'static str, String) {
    (
        "Authorization",
        format!("Bearer {}", issue_token(TEST_SECRET, 1, username, role as u8, 3600)),
    )
}

/// Shared state over a fresh memory store and fake gateways, with the
/// handles tests need to seed and inspect them.
pub fn test_app_state() -> (
    actix_web::web::Data<crate::state::AppState>,
    Arc<crate::store::MemoryStore>,
    Arc<FakePaymentGateway>,
) {
    let store = Arc::new(crate::store::MemoryStore::new());
    let gateway = Arc::new(FakePaymentGateway::default());
    let state = crate::state::AppState::new(
        &test_config(),
        store.clone(),
        gateway.clone(),
        Arc::new(FakeSmsGateway::default()),
    );
    (actix_web::web::Data::new(state), store, gateway)
}

/// Signs `req` as `username` and gives it a peer address for the rate limiter.
pub fn as_user(
    req: actix_web::test::TestRequest,
    username: &str,
    role: Role,
) -> actix_web::test::TestRequest {
    anonymous(req).insert_header(bearer(username, role))
}

pub fn anonymous(req: actix_web::test::TestRequest) -> actix_web::test::TestRequest {
    req.peer_addr("127.0.0.1:40000".parse().unwrap())
}

macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($crate::testing::test_config()))
                .app_data($state.clone())
                .configure(|cfg| $crate::routes::configure(cfg, $crate::testing::test_config())),
        )
        .await
    };
}
pub(crate) use test_app;
