//! Concurrent audit entry collection across environments.

use crate::normalize;
use crate::registry::EnvironmentRegistry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trailpack_common::{DateWindow, Error, Result};
use trailpack_schema::AuditEntry;

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Applied to each environment's fetch independently.
    pub fetch_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// One environment's failed retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFetchError {
    pub environment: String,
    pub reason: String,
    pub timed_out: bool,
}

impl SourceFetchError {
    fn from_error(environment: &str, error: &Error) -> Self {
        Self {
            environment: environment.to_string(),
            reason: error.to_string(),
            timed_out: matches!(error, Error::Timeout { .. }),
        }
    }

    pub fn into_error(self) -> Error {
        Error::SourceFetch {
            environment: self.environment,
            reason: self.reason,
        }
    }
}

impl std::fmt::Display for SourceFetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.environment, self.reason)
    }
}

/// Result of a multi-environment fetch: entries for every environment that
/// succeeded plus one error per environment that did not.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub entries: BTreeMap<String, Vec<AuditEntry>>,
    pub errors: Vec<SourceFetchError>,
}

impl FetchOutcome {
    pub fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// All entries, environment by environment (ordered by id), keeping
    /// each environment's own order.
    pub fn flatten(&self) -> Vec<AuditEntry> {
        self.entries.values().flatten().cloned().collect()
    }

    pub fn entry_counts(&self) -> BTreeMap<String, usize> {
        self.entries
            .iter()
            .map(|(env, entries)| (env.clone(), entries.len()))
            .collect()
    }
}

/// Fetches and normalizes audit entries from registered environments.
pub struct Collector {
    registry: Arc<EnvironmentRegistry>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(registry: Arc<EnvironmentRegistry>, config: CollectorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    /// Fetch from a single environment. Errors are returned, not collected.
    pub async fn fetch_environment(
        &self,
        environment: &str,
        window: &DateWindow,
    ) -> Result<Vec<AuditEntry>> {
        fetch_one(
            &self.registry,
            environment.to_string(),
            *window,
            self.config.fetch_timeout,
        )
        .await
    }

    /// Fetch from several environments concurrently.
    ///
    /// Each environment runs in its own task under its own timeout. A failing
    /// environment is reported in [`FetchOutcome::errors`] and never prevents
    /// the others from being returned. If `cancel` fires, all in-flight
    /// fetches are aborted and [`Error::Cancelled`] is returned.
    pub async fn fetch_entries(
        &self,
        environments: &[String],
        window: &DateWindow,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        if environments.is_empty() {
            return Err(Error::validation("at least one environment is required"));
        }

        let mut outcome = FetchOutcome::default();
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut tasks = JoinSet::new();

        for env in environments {
            if !pending.insert(env.clone()) {
                continue;
            }
            let registry = Arc::clone(&self.registry);
            let env = env.clone();
            let window = *window;
            let timeout = self.config.fetch_timeout;
            tasks.spawn(async move {
                let result = fetch_one(&registry, env.clone(), window, timeout).await;
                (env, result)
            });
        }

        info!(
            "Fetching audit entries from {} environment(s) for {}",
            pending.len(),
            window
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Fetch cancelled with {} environment(s) outstanding", pending.len());
                    tasks.abort_all();
                    return Err(Error::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((env, Ok(entries)))) => {
                        info!("{}: {} entries", env, entries.len());
                        pending.remove(&env);
                        outcome.entries.insert(env, entries);
                    }
                    Some(Ok((env, Err(e)))) => {
                        warn!("{}: fetch failed: {}", env, e);
                        pending.remove(&env);
                        outcome.errors.push(SourceFetchError::from_error(&env, &e));
                    }
                    Some(Err(join_error)) => {
                        warn!("Fetch task failed: {}", join_error);
                    }
                },
            }
        }

        // Environments whose task died without reporting back.
        for env in pending {
            outcome.errors.push(SourceFetchError {
                environment: env,
                reason: "fetch task terminated unexpectedly".to_string(),
                timed_out: false,
            });
        }
        outcome
            .errors
            .sort_by(|a, b| a.environment.cmp(&b.environment));

        Ok(outcome)
    }
}

async fn fetch_one(
    registry: &EnvironmentRegistry,
    environment: String,
    window: DateWindow,
    timeout: Duration,
) -> Result<Vec<AuditEntry>> {
    let source = registry.source(&environment)?;
    debug!("{}: fetching via {}", environment, source.describe());

    let records = match tokio::time::timeout(timeout, source.fetch_records(&window)).await {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            return Err(Error::SourceFetch {
                environment,
                reason: format!("{:#}", e),
            })
        }
        Err(_) => {
            return Err(Error::Timeout {
                environment,
                seconds: timeout.as_secs(),
            })
        }
    };

    Ok(normalize::normalize_all(&environment, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::AuditSource;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use trailpack_schema::{EnvironmentDescriptor, FlatRecord, RawAuditRecord, TransportConfig};

    struct StaticSource {
        records: Vec<RawAuditRecord>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl AuditSource for StaticSource {
        async fn fetch_records(&self, _window: &DateWindow) -> anyhow::Result<Vec<RawAuditRecord>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.records.clone())
        }

        async fn test(&self) -> bool {
            !self.fail
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn record(name: &str) -> RawAuditRecord {
        RawAuditRecord::Flat(FlatRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap(),
            action: "changedApexClass".to_string(),
            component_type: Some("ApexClass".to_string()),
            component_name: Some(name.to_string()),
            detail: String::new(),
        })
    }

    fn descriptor(id: &str) -> EnvironmentDescriptor {
        EnvironmentDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            environment_type: None,
            instance_url: None,
            active: true,
            transport: TransportConfig::File {
                path: format!("{}.jsonl", id).into(),
            },
        }
    }

    fn registry(sources: Vec<(&str, StaticSource)>) -> Arc<EnvironmentRegistry> {
        let mut registry = EnvironmentRegistry::new();
        for (id, source) in sources {
            registry = registry
                .with_source(descriptor(id), Arc::new(source))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn window() -> DateWindow {
        DateWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successful_entries() {
        let registry = registry(vec![
            (
                "a",
                StaticSource {
                    records: vec![record("One"), record("Two"), record("Three")],
                    delay: Duration::ZERO,
                    fail: false,
                },
            ),
            (
                "b",
                StaticSource {
                    records: vec![],
                    delay: Duration::from_secs(5),
                    fail: false,
                },
            ),
        ]);
        let collector = Collector::new(
            registry,
            CollectorConfig {
                fetch_timeout: Duration::from_millis(50),
            },
        );

        let outcome = collector
            .fetch_entries(
                &["a".to_string(), "b".to_string()],
                &window(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.total_entries(), 3);
        assert_eq!(outcome.entries["a"][0].source_environment, "a");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].environment, "b");
        assert!(outcome.errors[0].timed_out);
    }

    #[tokio::test]
    async fn test_unknown_and_failing_environments_are_reported() {
        let registry = registry(vec![(
            "a",
            StaticSource {
                records: vec![],
                delay: Duration::ZERO,
                fail: true,
            },
        )]);
        let collector = Collector::new(registry, CollectorConfig::default());

        let outcome = collector
            .fetch_entries(
                &["a".to_string(), "ghost".to_string(), "a".to_string()],
                &window(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.entries.is_empty());
        let envs: Vec<&str> = outcome.errors.iter().map(|e| e.environment.as_str()).collect();
        assert_eq!(envs, vec!["a", "ghost"]);
        assert!(outcome.errors[0].reason.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_missing_token_only_fails_its_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.jsonl");
        std::fs::write(
            &path,
            r#"{"timestamp":"2024-01-05T10:00:00Z","action":"changedApexClass","componentType":"ApexClass","componentName":"Foo"}"#,
        )
        .unwrap();

        let mut prod = descriptor("prod");
        prod.transport = TransportConfig::Http {
            base_url: "http://127.0.0.1:9".to_string(),
            token_env: Some("TRAILPACK_TEST_MISSING_PROD_TOKEN".to_string()),
        };
        let mut dev = descriptor("dev");
        dev.transport = TransportConfig::File { path };

        let registry = EnvironmentRegistry::from_descriptors(vec![dev, prod]).unwrap();
        let collector = Collector::new(Arc::new(registry), CollectorConfig::default());

        let outcome = collector
            .fetch_entries(
                &["dev".to_string(), "prod".to_string()],
                &window(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.entries["dev"].len(), 1);
        assert!(!outcome.entries.contains_key("prod"));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].environment, "prod");
        assert!(!outcome.errors[0].timed_out);
        assert!(outcome.errors[0]
            .reason
            .contains("TRAILPACK_TEST_MISSING_PROD_TOKEN"));
    }

    #[tokio::test]
    async fn test_empty_environment_list_is_rejected() {
        let collector = Collector::new(registry(vec![]), CollectorConfig::default());
        let result = collector
            .fetch_entries(&[], &window(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancellation_discards_partial_results() {
        let registry = registry(vec![
            (
                "fast",
                StaticSource {
                    records: vec![record("One")],
                    delay: Duration::ZERO,
                    fail: false,
                },
            ),
            (
                "slow",
                StaticSource {
                    records: vec![record("Two")],
                    delay: Duration::from_secs(10),
                    fail: false,
                },
            ),
        ]);
        let collector = Collector::new(registry, CollectorConfig::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = collector
            .fetch_entries(&["fast".to_string(), "slow".to_string()], &window(), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_fetch_single_environment() {
        let collector = Collector::new(
            registry(vec![(
                "a",
                StaticSource {
                    records: vec![record("One")],
                    delay: Duration::ZERO,
                    fail: false,
                },
            )]),
            CollectorConfig::default(),
        );
        let entries = collector.fetch_environment("a", &window()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(collector.fetch_environment("ghost", &window()).await.is_err());
    }
}
