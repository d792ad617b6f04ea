//! Prometheus metrics for probe runs
//!
//! - `rules_probe_runs_total{outcome}` (counter) - finished runs by outcome
//! - `rules_probe_run_duration_seconds` (histogram) - run duration
//! - `rules_probe_signals_total{accepted}` (counter) - delivered signals

use prometheus::{CounterVec, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;

use super::{Result, TelemetryError};

pub struct ProbeMetrics {
    registry: Arc<Registry>,
    runs_total: CounterVec,
    run_duration_seconds: Histogram,
    signals_total: CounterVec,
}

impl ProbeMetrics {
    /// Create metrics on a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let runs_total = CounterVec::new(
            Opts::new("runs_total", "Finished probe runs by outcome").namespace("rules_probe"),
            &["outcome"],
        )?;

        let run_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("run_duration_seconds", "Probe run duration in seconds")
                .namespace("rules_probe")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        let signals_total = CounterVec::new(
            Opts::new("signals_total", "Activation signals received").namespace("rules_probe"),
            &["accepted"],
        )?;

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(run_duration_seconds.clone()))?;
        registry.register(Box::new(signals_total.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            run_duration_seconds,
            signals_total,
        })
    }

    /// Record a finished run; `outcome` is `passed` or an error kind
    pub fn record_run(&self, outcome: &str, duration_secs: f64) {
        self.runs_total.with_label_values(&[outcome]).inc();
        self.run_duration_seconds.observe(duration_secs);
    }

    pub fn record_signal(&self, accepted: bool) {
        let label = if accepted { "true" } else { "false" };
        self.signals_total.with_label_values(&[label]).inc();
    }

    pub fn runs(&self, outcome: &str) -> u64 {
        self.runs_total.with_label_values(&[outcome]).get() as u64
    }

    pub fn signals(&self, accepted: bool) -> u64 {
        let label = if accepted { "true" } else { "false" };
        self.signals_total.with_label_values(&[label]).get() as u64
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}
