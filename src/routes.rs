use crate::{
    api::{employee, payment, payroll, sms, statutory},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{guard, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(GovernorConfig::default);
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    // endpoints that move money
    let disburse_limiter = Arc::new(build_limiter(config.rate_disburse_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/statutory-settings")
                    // /statutory-settings
                    .service(
                        web::resource("")
                            .route(web::get().to(statutory::get_settings))
                            .route(web::post().to(statutory::save_settings)),
                    )
                    .service(
                        web::resource("/history").route(web::get().to(statutory::settings_history)),
                    )
                    .service(web::resource("/preview").route(web::post().to(statutory::preview))),
            )
            .service(
                web::scope("/employees")
                    .service(web::resource("").route(web::get().to(employee::list_employees)))
                    .service(web::resource("/{id}").route(web::get().to(employee::get_employee))),
            )
            .service(
                web::scope("/payroll")
                    .service(web::resource("").route(web::get().to(payroll::payroll_batch)))
                    // /payroll/{employee_id}
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::get().to(payroll::employee_payroll)),
                    ),
            )
            .service(
                web::scope("/payments")
                    .service(
                        web::resource("")
                            .guard(guard::Post())
                            .wrap(disburse_limiter.clone())
                            .route(web::post().to(payment::create_payment)),
                    )
                    .service(web::resource("").route(web::get().to(payment::list_payments)))
                    .service(
                        web::resource("/bulk-approve")
                            .wrap(disburse_limiter.clone())
                            .route(web::post().to(payment::bulk_approve)),
                    )
                    // must precede /{id}
                    .service(
                        web::resource("/pending").route(web::delete().to(payment::clear_pending)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(payment::get_payment)))
                    .service(
                        web::resource("/{id}/approve")
                            .wrap(disburse_limiter)
                            .route(web::put().to(payment::approve_payment)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(payment::reject_payment)),
                    ),
            )
            .service(
                web::scope("/sms")
                    .service(web::resource("/balance").route(web::get().to(sms::sms_balance)))
                    .service(web::resource("/bulk").route(web::post().to(sms::send_bulk_sms))),
            ),
    );
}
