use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::model::payment_request::PaymentStatus;
use crate::service::workflow::{CreateOutcome, NewPaymentRequest};
use crate::state::AppState;

#[derive(Deserialize, IntoParams)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
}

#[derive(Deserialize, Default, ToSchema)]
pub struct ApproveBody {
    #[schema(example = "Checked against the March register")]
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectBody {
    #[schema(example = "Duplicate of an earlier request")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkApproveBody {
    pub ids: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct ClearQuery {
    /// Must be `true`; the deletion cannot be undone.
    #[serde(default)]
    pub confirm: bool,
}

/// for creating a payment request, or paying out directly when privileged
#[utoipa::path(
    post,
    path = "/api/payments",
    request_body(content = Object, example = json!({
        "type": "single",
        "employee_data": {
            "employee_number": "EMP-001",
            "full_name": "Jane Wanjiku",
            "phone_number": "0712345678",
            "net_pay": 27639.75
        },
        "justification": "March salary"
    })),
    responses(
        (status = 201, description = "Request queued for approval", body = Object),
        (status = 200, description = "Disbursed directly", body = Object),
        (status = 400, description = "Invalid payees or missing justification"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Payment gateway error", body = Object, example = json!({
            "message": "Insufficient float"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewPaymentRequest>,
) -> actix_web::Result<impl Responder> {
    let outcome = state
        .workflow
        .create(&auth.actor(), payload.into_inner())
        .await?;
    Ok(match &outcome {
        CreateOutcome::Queued { .. } => HttpResponse::Created().json(outcome),
        CreateOutcome::Disbursed { .. } => HttpResponse::Ok().json(outcome),
    })
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(PaymentListQuery),
    responses(
        (status = 200, description = "Payment requests, newest first", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PaymentListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let requests = state.workflow.list(query.status).await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(
        ("id" = String, Path, description = "Payment request ID")
    ),
    responses(
        (status = 200, description = "Payment request", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Payment request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let request = state.workflow.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(request))
}

/// for approving a pending request; the payment goes out immediately
#[utoipa::path(
    put,
    path = "/api/payments/{id}/approve",
    params(
        ("id" = String, Path, description = "Payment request ID")
    ),
    request_body = ApproveBody,
    responses(
        (status = 200, description = "Approved and disbursed; status is completed or failed", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payment request not found"),
        (status = 409, description = "Request already processed", body = Object, example = json!({
            "message": "payment request 9b1d cannot move from rejected to approved"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn approve_payment(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<ApproveBody>>,
) -> actix_web::Result<impl Responder> {
    let comment = body.map(|b| b.into_inner()).unwrap_or_default().comment;
    let request = state
        .workflow
        .approve(&auth.actor(), &path.into_inner(), comment)
        .await?;

    let message = match request.status {
        PaymentStatus::Completed => "Payment approved and disbursed",
        _ => "Payment approved but disbursement failed",
    };
    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "request": request
    })))
}

#[utoipa::path(
    put,
    path = "/api/payments/{id}/reject",
    params(
        ("id" = String, Path, description = "Payment request ID")
    ),
    request_body = RejectBody,
    responses(
        (status = 200, description = "Payment request rejected", body = Object),
        (status = 400, description = "Missing reason"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payment request not found"),
        (status = 409, description = "Request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn reject_payment(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RejectBody>,
) -> actix_web::Result<impl Responder> {
    let request = state
        .workflow
        .reject(&auth.actor(), &path.into_inner(), &body.reason)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Payment request rejected",
        "request": request
    })))
}

#[utoipa::path(
    post,
    path = "/api/payments/bulk-approve",
    request_body = BulkApproveBody,
    responses(
        (status = 200, description = "Per-request approval results", body = crate::service::workflow::BulkApprovalReport),
        (status = 400, description = "No ids given"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn bulk_approve(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<BulkApproveBody>,
) -> actix_web::Result<impl Responder> {
    let BulkApproveBody { ids, comment } = body.into_inner();
    let report = state
        .workflow
        .bulk_approve(&auth.actor(), &ids, comment)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// for clearing every pending request
#[utoipa::path(
    delete,
    path = "/api/payments/pending",
    params(ClearQuery),
    responses(
        (status = 200, description = "Pending requests deleted", body = Object, example = json!({
            "message": "Pending payment requests cleared",
            "deleted": 3
        })),
        (status = 400, description = "Not confirmed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn clear_pending(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ClearQuery>,
) -> actix_web::Result<impl Responder> {
    let deleted = state
        .workflow
        .clear_queue(&auth.actor(), query.confirm)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Pending payment requests cleared",
        "deleted": deleted
    })))
}
