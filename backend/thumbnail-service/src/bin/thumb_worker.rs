//! Thumbnail Worker - SQS consumer for thumbnail generation
//!
//! Long-polls the work queue, fetches each original from S3, writes the
//! resized derivative back and deletes the message only once the derivative
//! is stored. The consumer loop runs under a supervisor: a loop that keeps
//! failing is restarted with backoff until the restart budget is spent, then
//! the process exits non-zero. Prometheus counters and a liveness probe are
//! served on a small side listener.
//!
//! Environment variables:
//! - SQS_QUEUE_URL: Work queue URL (required)
//! - QUEUE_WAIT_SECS / QUEUE_MAX_MESSAGES / QUEUE_VISIBILITY_TIMEOUT_SECS
//! - WORKER_CONCURRENCY: Items processed concurrently (default: 4)
//! - THUMB_MAX_WIDTH / THUMB_MAX_HEIGHT: Target box (default: 300x300)
//! - THUMB_FORMAT / THUMB_QUALITY: Output encoding (default: source, 80)
//! - THUMB_DERIVATIVE_PREFIX / THUMB_DERIVATIVE_SUFFIX: Derivative naming
//! - STORAGE_TIMEOUT_SECS: Per storage call timeout (default: 30)
//! - POLL_FAILURE_LIMIT: Consecutive poll failures before restart (default: 5)
//! - SUPERVISOR_MAX_RESTARTS / SUPERVISOR_WINDOW_SECS: Restart budget
//! - WORKER_METRICS_HOST / WORKER_METRICS_PORT: Metrics listener (default: 0.0.0.0:9090)

use actix_web::{App, HttpServer};
use anyhow::Context;
use aws_config::BehaviorVersion;
use resilience::{Supervisor, SupervisorConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thumbnail_service::clients::{S3ObjectStore, SqsWorkQueue};
use thumbnail_service::{handlers, metrics};
use thumbnail_service::services::thumbnail::ThumbnailProcessor;
use thumbnail_service::services::worker::{ConsumerConfig, ThumbnailConsumer, ThumbnailPipeline};
use thumbnail_service::WorkerConfig;
use tokio::sync::watch;
use tracing::{info, warn};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "thumbnail_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Thumbnail Worker");

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;
    info!(
        queue_url = %config.queue_url,
        concurrency = config.concurrency,
        max_messages = config.max_messages,
        max_width = config.pipeline.thumbnail.max_width,
        max_height = config.pipeline.thumbnail.max_height,
        "Configuration loaded"
    );

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let store = Arc::new(S3ObjectStore::from_config(&aws_config));
    let queue = Arc::new(
        SqsWorkQueue::from_config(&aws_config, config.queue_url.clone())
            .with_visibility_timeout(config.visibility_timeout),
    );

    let pipeline = Arc::new(ThumbnailPipeline::new(
        store,
        Arc::new(ThumbnailProcessor::new(config.pipeline.thumbnail.clone())),
        config.pipeline.naming.clone(),
        config.storage_timeout,
    ));

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing in-flight items");
        let _ = shutdown_tx.send(true);
    });

    let consumer = ThumbnailConsumer::new(
        queue,
        pipeline,
        ConsumerConfig {
            max_messages: config.max_messages,
            wait: config.wait,
            concurrency: config.concurrency,
            poll_failure_limit: config.poll_failure_limit,
            ..ConsumerConfig::default()
        },
        shutdown_rx.clone(),
    );

    let supervisor = Supervisor::new(
        "thumbnail-consumer",
        SupervisorConfig {
            max_restarts: config.supervisor_max_restarts,
            window: config.supervisor_window,
            ..SupervisorConfig::default()
        },
    );

    // Metrics and liveness listener; stopped after the consumer finishes
    let metrics_address = config.metrics_address();
    let metrics_server = HttpServer::new(|| App::new().configure(handlers::configure_worker))
        .workers(1)
        .disable_signals()
        .bind(&metrics_address)
        .with_context(|| format!("Failed to bind metrics listener on {metrics_address}"))?
        .run();
    let metrics_handle = metrics_server.handle();
    tokio::spawn(metrics_server);
    info!(address = %metrics_address, "Metrics listener started");

    let runs = AtomicU32::new(0);
    let outcome = supervisor
        .run(shutdown_rx, || {
            if runs.fetch_add(1, Ordering::SeqCst) > 0 {
                metrics::record_consumer_restart();
            }
            consumer.run()
        })
        .await;

    metrics_handle.stop(true).await;
    outcome.map_err(|e| anyhow::anyhow!("Thumbnail consumer gave up: {e}"))?;

    info!("Thumbnail Worker stopped");
    Ok(())
}
