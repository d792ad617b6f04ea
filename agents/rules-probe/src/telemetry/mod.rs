//! Telemetry for the Rules Probe Agent
//!
//! - `metrics` - Prometheus counters and histograms for probe runs
//! - [`init_tracing`] - subscriber setup shared by every CLI command

pub mod metrics;

pub use metrics::ProbeMetrics;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Install the global subscriber
///
/// Filter comes from `RUST_LOG` (default `info`). `json` switches the
/// console layer to one JSON object per line.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
