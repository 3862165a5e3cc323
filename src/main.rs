use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod gateway;
mod model;
mod routes;
mod service;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::gateway::sms::SmsCredentials;
use crate::gateway::{MpesaClient, SmsClient};
use crate::state::AppState;
use crate::store::{MemoryStore, MySqlStore, PayrollStore};
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PayrollStore>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = init_db(url).await.context("failed to initialise MySQL")?;
            info!("Using MySQL store");
            Ok(Arc::new(MySqlStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store = open_store(&config).await?;

    let mpesa = MpesaClient::new(&config.mpesa_base_url, config.gateway_timeout)
        .context("failed to build M-Pesa client")?;
    let credentials = match (&config.sms_username, &config.sms_password) {
        (Some(username), Some(password)) => Some(SmsCredentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => {
            warn!("SMS credentials missing, notifications will only be logged");
            None
        }
    };
    let sms = SmsClient::new(
        &config.sms_base_url,
        credentials,
        &config.sms_source,
        config.gateway_timeout,
    )
    .context("failed to build SMS client")?;

    let state = Data::new(AppState::new(
        &config,
        store,
        Arc::new(mpesa),
        Arc::new(sms),
    ));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(state.clone())
            .app_data(Data::new(config.clone()))
            .service(health)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
