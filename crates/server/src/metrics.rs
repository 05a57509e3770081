//! Prometheus metrics for the depot server.
//!
//! Exposes counters for session lifecycle and chunk intake plus an assembly
//! duration histogram. The `/metrics` endpoint is unauthenticated so that
//! Prometheus can scrape it; restrict it at the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder, exponential_buckets,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SESSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_upload_sessions_created_total",
        "Total number of upload sessions created",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_RESUMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_upload_sessions_resumed_total",
        "Total number of upload sessions resumed via init",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_upload_sessions_completed_total",
        "Total number of upload sessions successfully completed",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_upload_sessions_failed_total",
        "Total number of upload sessions that failed during assembly",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_EXPIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_upload_sessions_expired_total",
        "Total number of upload sessions reclaimed after inactivity",
    )
    .expect("metric creation failed")
});

pub static CHUNKS_RECEIVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_chunks_received_total",
        "Total number of chunks accepted",
    )
    .expect("metric creation failed")
});

pub static BYTES_RECEIVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_bytes_received_total",
        "Total chunk bytes accepted",
    )
    .expect("metric creation failed")
});

pub static CHUNK_MISMATCHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_chunk_mismatches_total",
        "Total number of chunks rejected for a bad index or length",
    )
    .expect("metric creation failed")
});

pub static ASSEMBLY_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "depot_assembly_duration_seconds",
            "Time spent assembling final artifacts",
        )
        .buckets(exponential_buckets(0.01, 2.0, 12).expect("bucket creation failed")),
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(SESSIONS_CREATED.clone()),
            Box::new(SESSIONS_RESUMED.clone()),
            Box::new(SESSIONS_COMPLETED.clone()),
            Box::new(SESSIONS_FAILED.clone()),
            Box::new(SESSIONS_EXPIRED.clone()),
            Box::new(CHUNKS_RECEIVED.clone()),
            Box::new(BYTES_RECEIVED.clone()),
            Box::new(CHUNK_MISMATCHES.clone()),
            Box::new(ASSEMBLY_DURATION.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
