use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::statutory::{StatutoryConfig, round2};
use crate::service::payroll_batch::current_settings;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SettingsResponse {
    /// `None` while running on the built-in defaults.
    pub id: Option<u64>,
    pub settings: StatutoryConfig,
}

#[derive(Deserialize, ToSchema)]
pub struct PreviewRequest {
    #[schema(example = 50000.0)]
    pub gross_pay: f64,
    /// Draft settings to try; the current settings when omitted.
    #[schema(value_type = Option<Object>)]
    pub settings: Option<StatutoryConfig>,
}

#[derive(Serialize, ToSchema)]
pub struct PreviewResponse {
    pub gross_pay: f64,
    pub paye: f64,
    pub nssf: f64,
    pub nhif: f64,
    pub housing_levy: f64,
    pub total: f64,
}

/// for getting the statutory settings in force
#[utoipa::path(
    get,
    path = "/api/statutory-settings",
    responses(
        (status = 200, description = "Current statutory settings", body = Object),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory"
)]
pub async fn get_settings(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let (id, settings) = current_settings(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(SettingsResponse { id, settings }))
}

#[utoipa::path(
    get,
    path = "/api/statutory-settings/history",
    responses(
        (status = 200, description = "Stored versions, newest first", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory"
)]
pub async fn settings_history(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_privileged()?;
    let history = state.store.statutory_settings_history().await?;
    Ok(HttpResponse::Ok().json(history))
}

/// for saving a new version of the statutory settings
#[utoipa::path(
    post,
    path = "/api/statutory-settings",
    request_body = Object,
    responses(
        (status = 201, description = "Settings saved", body = Object),
        (status = 400, description = "Invalid settings", body = Object, example = json!({
            "message": "nssfLowerLimit cannot exceed nssfUpperLimit"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory"
)]
pub async fn save_settings(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<StatutoryConfig>,
) -> actix_web::Result<impl Responder> {
    auth.require_privileged()?;
    let settings = payload.into_inner();
    settings.validate()?;

    let record = state
        .store
        .insert_statutory_settings(&settings, &auth.username)
        .await?;
    tracing::info!(id = record.id, saved_by = %auth.username, "Statutory settings saved");
    Ok(HttpResponse::Created().json(record))
}

/// for trying the calculators on an amount
#[utoipa::path(
    post,
    path = "/api/statutory-settings/preview",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Deductions for the amount", body = PreviewResponse),
        (status = 400, description = "Invalid amount or settings"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory"
)]
pub async fn preview(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<PreviewRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let PreviewRequest { gross_pay, settings } = payload.into_inner();
    if !gross_pay.is_finite() || gross_pay < 0.0 {
        return Err(AppError::validation("Gross pay must be a non-negative amount").into());
    }
    let settings = match settings {
        Some(draft) => {
            draft.validate()?;
            draft
        }
        None => current_settings(state.store.as_ref()).await?.1,
    };

    let paye = settings.calculate_paye(gross_pay);
    let nssf = settings.calculate_nssf(gross_pay);
    let nhif = settings.calculate_nhif(gross_pay);
    let housing_levy = settings.calculate_housing_levy(gross_pay, true);
    Ok(HttpResponse::Ok().json(PreviewResponse {
        gross_pay,
        paye,
        nssf,
        nhif,
        housing_levy,
        total: round2(paye + nssf + nhif + housing_levy),
    }))
}
