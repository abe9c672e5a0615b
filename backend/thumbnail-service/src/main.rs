/// Upload Notifier - HTTP Server
///
/// Receives storage-change notifications and publishes a work item for every
/// new original image. Derivatives written by the thumbnail worker are
/// filtered out here, so the pipeline never feeds itself.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use aws_config::BehaviorVersion;
use std::sync::Arc;
use thumbnail_service::clients::SnsPublisher;
use thumbnail_service::handlers;
use thumbnail_service::services::notifier::NotificationFilter;
use thumbnail_service::NotifierConfig;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "thumbnail_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Upload Notifier");

    let config = NotifierConfig::from_env().context("Failed to load configuration")?;
    info!(
        topic = %config.topic_arn,
        extensions = ?config.pipeline.extensions,
        derivative_prefix = %config.pipeline.naming.prefix(),
        "Configuration loaded"
    );

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let publisher = Arc::new(SnsPublisher::from_config(&aws_config));

    let filter = Arc::new(NotificationFilter::new(
        publisher,
        config.pipeline.relevance_policy(),
        config.topic_arn.clone(),
        config.subject.clone(),
    ));

    let bind_address = config.bind_address();
    info!(address = %bind_address, "Upload Notifier listening");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(filter.clone()))
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Upload Notifier stopped");
    Ok(())
}
