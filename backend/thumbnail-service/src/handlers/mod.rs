/// HTTP handlers for the upload notifier and the worker probes
///
/// - Events: receive storage-change notifications and run the filter
/// - Health: liveness and readiness probes
use actix_web::web;

pub mod events;
pub mod health;

pub use events::{receive_event, EventResponse, RecordResult};
pub use health::{health, live, ready};

/// Register the notifier routes under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/events", web::post().to(receive_event))
            .route("/health", web::get().to(health))
            .route("/health/live", web::get().to(live))
            .route("/health/ready", web::get().to(ready)),
    )
    .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}

/// Routes served by the thumbnail worker's metrics listener
pub fn configure_worker(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/health/live", web::get().to(live))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
