use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static FILTER_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "thumbnail_filter_events_total",
            "Storage objects seen by the notification filter, by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create thumbnail_filter_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register thumbnail_filter_events_total");
    counter
});

static ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "thumbnail_items_total",
            "Work items handled by the consumer, by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create thumbnail_items_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register thumbnail_items_total");
    counter
});

static ACKS_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "thumbnail_acks_failed_total",
        "Completed items whose queue acknowledgement failed",
    )
    .expect("failed to create thumbnail_acks_failed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register thumbnail_acks_failed_total");
    counter
});

static CONSUMER_RESTARTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "thumbnail_consumer_restarts_total",
        "Supervised restarts of the consumer loop",
    )
    .expect("failed to create thumbnail_consumer_restarts_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register thumbnail_consumer_restarts_total");
    counter
});

pub fn record_filter_outcome(outcome: &str) {
    FILTER_EVENTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// `succeeded` or a `PipelineError::kind`
pub fn record_item_outcome(outcome: &str) {
    ITEMS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_ack_failure() {
    ACKS_FAILED_TOTAL.inc();
}

pub fn record_consumer_restart() {
    CONSUMER_RESTARTS_TOTAL.inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
