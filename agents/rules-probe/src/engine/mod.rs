//! Probe engine
//!
//! One run allocates a key, writes the probe record, reads it back and
//! deletes it. Any failure ends the run; nothing is retried. A failed
//! read leaves the record in place.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::{timeout, Duration};
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{RemoteStore, StoreError};
use crate::config::ProbeConfig;
use crate::contracts::*;
use crate::error::ProbeError;
use crate::identity::IdentityProvider;
use crate::telemetry::ProbeMetrics;

/// Per-probe settings
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub collection: String,
    pub action: String,
    pub request_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for ProbeSettings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            collection: config.collection.clone(),
            action: config.action.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Result of delivering a signal
#[derive(Debug)]
pub enum TriggerOutcome {
    /// Signal did not match; nothing ran
    Ignored,
    Completed {
        run_id: Uuid,
        result: Result<ProbeReport, ProbeError>,
    },
}

impl TriggerOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, TriggerOutcome::Ignored)
    }
}

/// Printable summary of a finished run
pub fn summarize(run_id: Uuid, result: &Result<ProbeReport, ProbeError>) -> RunSummary {
    match result {
        Ok(report) => RunSummary::passed(report),
        Err(e) => RunSummary::failed(
            run_id,
            e.stage(),
            e.key().map(str::to_string),
            e.orphaned_key().map(str::to_string),
            e.to_string(),
        ),
    }
}

pub struct RulesProbe {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    settings: ProbeSettings,
    metrics: Option<Arc<ProbeMetrics>>,
}

impl RulesProbe {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            settings: ProbeSettings::default(),
            metrics: None,
        }
    }

    pub fn with_settings(mut self, settings: ProbeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ProbeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Exact match against the configured action
    pub fn matches(&self, signal: &str) -> bool {
        signal == self.settings.action
    }

    /// Account for a delivered signal; true when it should start a run
    pub fn accept(&self, signal: &str) -> bool {
        let accepted = self.matches(signal);
        if let Some(metrics) = &self.metrics {
            metrics.record_signal(accepted);
        }

        if accepted {
            tracing::debug!("Starting rules compliance probe");
        } else {
            tracing::debug!(signal, "Ignoring signal");
        }
        accepted
    }

    /// Run the probe if `signal` is the configured action
    pub async fn trigger(&self, signal: &str) -> TriggerOutcome {
        if !self.accept(signal) {
            return TriggerOutcome::Ignored;
        }

        let run_id = Uuid::new_v4();
        TriggerOutcome::Completed {
            run_id,
            result: self.run_with_id(run_id).await,
        }
    }

    /// Execute one probe run
    pub async fn run(&self) -> Result<ProbeReport, ProbeError> {
        self.run_with_id(Uuid::new_v4()).await
    }

    /// Execute one probe run under a caller-chosen run id
    pub async fn run_with_id(&self, run_id: Uuid) -> Result<ProbeReport, ProbeError> {
        let start = Instant::now();
        let span = tracing::info_span!("probe", %run_id, store = self.store.name());

        let result = self.execute(run_id, start).instrument(span).await;

        match &result {
            Ok(report) => tracing::info!(
                %run_id,
                key = %report.key,
                round_trip_matches = report.round_trip_matches,
                duration_ms = report.duration_ms,
                "Probe passed"
            ),
            Err(e) => tracing::error!(
                %run_id,
                stage = %e.stage(),
                key = e.key(),
                orphaned_key = e.orphaned_key(),
                error = %e,
                "Probe failed"
            ),
        }

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "passed",
                Err(e) => e.kind(),
            };
            metrics.record_run(outcome, start.elapsed().as_secs_f64());
        }

        result
    }

    async fn execute(&self, run_id: Uuid, start: Instant) -> Result<ProbeReport, ProbeError> {
        let started_at = chrono::Utc::now();
        let collection = self.settings.collection.as_str();

        let principal = self
            .identity
            .current_principal()
            .ok_or(ProbeError::NoPrincipal)?;
        tracing::debug!(uid = %principal.uid, "Current principal");
        let auth = principal.id_token.as_deref();

        let key = self
            .bounded(ProbeStage::Idle, None, self.store.allocate_key(collection))
            .await?
            .map_err(ProbeError::KeyAllocationFailed)?;
        tracing::debug!(stage = %ProbeStage::KeyAllocated, %key, "Allocated key");

        let record = ProbeRecord::build(&key, &principal.uid);
        let value = serde_json::to_value(&record)?;
        tracing::debug!(stage = %ProbeStage::Writing, record = %value, "Writing probe record");

        let written = self
            .bounded(
                ProbeStage::Writing,
                Some(&key),
                self.store.set(collection, &key, value, auth),
            )
            .await?;
        if let Err(e) = written {
            tracing::debug!(
                stage = %ProbeStage::WriteFailed,
                policy_rejection = e.is_permission_denied(),
                error = %e,
                "Write rejected; rules validation failed"
            );
            return Err(ProbeError::WriteRejected(e));
        }
        tracing::info!(stage = %ProbeStage::WriteSucceeded, %key, "Record written; rules accepted payload");

        let read = self
            .bounded(ProbeStage::Reading, Some(&key), self.store.get(collection, &key, auth))
            .await?;
        let snapshot = match read {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(stage = %ProbeStage::ReadFailed, %key, error = %e, "Read-back failed; record left in store");
                return Err(ProbeError::ReadFailed { key, source: e });
            }
        };

        let round_trip_matches = match &snapshot {
            Some(value) => serde_json::from_value::<ProbeRecord>(value.clone())
                .map(|read_back| read_back == record)
                .unwrap_or(false),
            None => false,
        };
        if round_trip_matches {
            tracing::debug!(stage = %ProbeStage::ReadSucceeded, "Read-back matches written record");
        } else {
            tracing::warn!(
                stage = %ProbeStage::ReadSucceeded,
                data = ?snapshot,
                "Read-back differs from written record"
            );
        }

        tracing::debug!(stage = %ProbeStage::Deleting, %key, "Removing probe record");
        match self
            .bounded(
                ProbeStage::Deleting,
                Some(&key),
                self.store.remove(collection, &key, auth),
            )
            .await
        {
            Ok(Ok(())) => tracing::debug!("Probe record removed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Cleanup delete failed"),
            Err(e) => tracing::debug!(error = %e, "Cleanup delete did not complete"),
        }

        tracing::debug!(stage = %ProbeStage::Done, "Probe finished");
        Ok(ProbeReport {
            run_id,
            principal: principal.uid,
            key,
            record,
            round_trip_matches,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Bound one remote call by the request timeout
    async fn bounded<T, F>(
        &self,
        stage: ProbeStage,
        key: Option<&str>,
        call: F,
    ) -> Result<Result<T, StoreError>, ProbeError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.settings.request_timeout;
        timeout(limit, call).await.map_err(|_| ProbeError::Timeout {
            stage,
            key: key.map(str::to_string),
            after_ms: limit.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;
    use crate::identity::{Principal, StaticIdentity};

    fn probe(store: Arc<MemoryStore>, identity: StaticIdentity) -> RulesProbe {
        RulesProbe::new(store, Arc::new(identity))
    }

    #[tokio::test]
    async fn test_matches_exact_action_only() {
        let p = probe(Arc::new(MemoryStore::new()), StaticIdentity::signed_out());
        assert!(p.matches(DEFAULT_ACTION));
        assert!(!p.matches(&DEFAULT_ACTION.to_lowercase()));
        assert!(!p.matches(&format!("{} ", DEFAULT_ACTION)));
        assert!(!p.matches(""));
    }

    #[tokio::test]
    async fn test_run_cleans_up() {
        let store = Arc::new(MemoryStore::new().with_owner_rule("u1"));
        let p = probe(Arc::clone(&store), StaticIdentity::signed_in(Principal::new("u1")));

        let report = p.run().await.unwrap();
        assert!(report.round_trip_matches);
        assert_eq!(report.record.owner_id, "u1");
        assert_eq!(report.key, report.record.identifier);
        assert!(store.is_empty(DEFAULT_COLLECTION).await);
    }

    #[tokio::test]
    async fn test_owner_rule_rejection() {
        let store = Arc::new(MemoryStore::new().with_owner_rule("someone-else"));
        let p = probe(Arc::clone(&store), StaticIdentity::signed_in(Principal::new("u1")));

        let err = p.run().await.unwrap_err();
        assert!(matches!(err, ProbeError::WriteRejected(_)));
        assert!(err.is_policy_rejection());
        assert_eq!(err.stage(), ProbeStage::WriteFailed);
    }

    #[tokio::test]
    async fn test_trigger_records_metrics() {
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        let p = probe(
            Arc::new(MemoryStore::new()),
            StaticIdentity::signed_in(Principal::new("u1")),
        )
        .with_metrics(Arc::clone(&metrics));

        assert!(p.trigger("other.ACTION").await.is_ignored());
        assert!(matches!(
            p.trigger(DEFAULT_ACTION).await,
            TriggerOutcome::Completed { result: Ok(_), .. }
        ));

        assert_eq!(metrics.signals(false), 1);
        assert_eq!(metrics.signals(true), 1);
        assert_eq!(metrics.runs("passed"), 1);
    }

    #[tokio::test]
    async fn test_accept_counts_signals_without_running() {
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        let store = Arc::new(MemoryStore::new());
        let p = probe(
            Arc::clone(&store),
            StaticIdentity::signed_in(Principal::new("u1")),
        )
        .with_metrics(Arc::clone(&metrics));

        assert!(p.accept(DEFAULT_ACTION));
        assert!(!p.accept("other.ACTION"));

        assert_eq!(metrics.signals(true), 1);
        assert_eq!(metrics.signals(false), 1);
        assert_eq!(metrics.runs("passed"), 0);
    }

    #[tokio::test]
    async fn test_trigger_run_id_matches_report() {
        let p = probe(
            Arc::new(MemoryStore::new()),
            StaticIdentity::signed_in(Principal::new("u1")),
        );

        match p.trigger(DEFAULT_ACTION).await {
            TriggerOutcome::Completed { run_id, result } => {
                assert_eq!(result.unwrap().run_id, run_id);
            }
            TriggerOutcome::Ignored => panic!("matching signal was ignored"),
        }
    }

    #[tokio::test]
    async fn test_custom_collection() {
        let store = Arc::new(MemoryStore::new());
        let settings = ProbeSettings {
            collection: "probe_groups".into(),
            ..ProbeSettings::default()
        };
        let p = probe(
            Arc::clone(&store),
            StaticIdentity::signed_in(Principal::new("u1")),
        )
        .with_settings(settings);

        p.run().await.unwrap();
        assert!(store.is_empty("probe_groups").await);
        assert_eq!(p.settings().collection, "probe_groups");
    }
}
