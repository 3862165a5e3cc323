use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::service::notification::SmsMessage;
use crate::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct BulkSmsBody {
    pub messages: Vec<SmsMessage>,
}

#[utoipa::path(
    get,
    path = "/api/sms/balance",
    responses(
        (status = 200, description = "Remaining SMS credit", body = Object, example = json!({
            "balance": 1250.5
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "SMS gateway error")
    ),
    security(("bearer_auth" = [])),
    tag = "SMS"
)]
pub async fn sms_balance(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_privileged()?;
    let balance = state.notifier.balance().await.map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "balance": balance })))
}

/// for sending messages one after another; failures are tallied, not raised
#[utoipa::path(
    post,
    path = "/api/sms/bulk",
    request_body = BulkSmsBody,
    responses(
        (status = 200, description = "Delivery tally", body = crate::service::notification::BulkSmsSummary),
        (status = 400, description = "No messages"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "SMS"
)]
pub async fn send_bulk_sms(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<BulkSmsBody>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    if body.messages.is_empty() {
        return Err(AppError::validation("At least one message is required").into());
    }
    if body.messages.iter().any(|m| m.message.trim().is_empty()) {
        return Err(AppError::validation("Messages cannot be empty").into());
    }
    let summary = state.notifier.send_bulk(&body.messages).await;
    Ok(HttpResponse::Ok().json(summary))
}
