//! Audit record transports for different source environments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};
use trailpack_common::DateWindow;
use trailpack_schema::{RawAuditRecord, TransportConfig};

/// Trait for retrieving raw audit records from one environment.
#[async_trait]
pub trait AuditSource: Send + Sync {
    /// Fetch the records the environment reports for the window.
    async fn fetch_records(&self, window: &DateWindow) -> Result<Vec<RawAuditRecord>>;

    /// Check that the environment is reachable.
    async fn test(&self) -> bool;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Build the transport for a configured environment.
pub fn from_config(transport: &TransportConfig) -> Result<Box<dyn AuditSource>> {
    match transport {
        TransportConfig::File { path } => Ok(Box::new(FileSource::new(path.clone()))),
        TransportConfig::Http {
            base_url,
            token_env,
        } => Ok(Box::new(HttpSource::new(base_url, token_env.clone())?)),
    }
}

/// Convert decoded array items one by one. Items that match no known record
/// shape are skipped with a warning.
fn records_from_values(values: Vec<serde_json::Value>) -> Vec<RawAuditRecord> {
    let total = values.len();
    let mut records = Vec::with_capacity(total);
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawAuditRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping unreadable audit record at index {}: {}", index, e),
        }
    }
    if records.len() < total {
        warn!("Skipped {} of {} audit records", total - records.len(), total);
    }
    records
}

/// Reads exported records from a local file.
///
/// Accepts either a JSON array or JSON Lines. Lines that do not parse as a
/// known record shape are skipped with a warning.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(content: &str) -> Result<Vec<RawAuditRecord>> {
        if content.trim_start().starts_with('[') {
            let values: Vec<serde_json::Value> =
                serde_json::from_str(content).context("Failed to parse audit record array")?;
            return Ok(records_from_values(values));
        }

        let mut records = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawAuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable audit record at line {}: {}", line_num + 1, e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSource for FileSource {
    async fn fetch_records(&self, window: &DateWindow) -> Result<Vec<RawAuditRecord>> {
        debug!("Reading audit records from {:?}", self.path);

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.path))?;

        let records = Self::parse(&content)?
            .into_iter()
            .filter(|r| window.contains(r.timestamp()))
            .collect();
        Ok(records)
    }

    async fn test(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Fetches records from an HTTP endpoint serving a JSON array at
/// `{base_url}/audit?start=..&end=..`.
///
/// The bearer token is read from `token_env` on every request, so a missing
/// variable only fails this environment.
pub struct HttpSource {
    base_url: String,
    token_env: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str, token_env: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token_env,
            client,
        })
    }

    fn request(&self, url: String) -> Result<reqwest::RequestBuilder> {
        let request = self.client.get(url);
        match self.token_env {
            Some(ref var) => {
                let token = std::env::var(var)
                    .with_context(|| format!("Environment variable {} is not set", var))?;
                Ok(request.bearer_auth(token))
            }
            None => Ok(request),
        }
    }
}

#[async_trait]
impl AuditSource for HttpSource {
    async fn fetch_records(&self, window: &DateWindow) -> Result<Vec<RawAuditRecord>> {
        let url = format!("{}/audit", self.base_url);
        debug!("GET {} ({})", url, window);

        let response = self
            .request(url)?
            .query(&[
                ("start", window.start().to_rfc3339()),
                ("end", window.end().to_rfc3339()),
            ])
            .send()
            .await
            .context("Audit request failed")?
            .error_for_status()
            .context("Audit endpoint returned an error status")?;

        let values: Vec<serde_json::Value> = response
            .json()
            .await
            .context("Failed to decode audit records")?;

        // Endpoints are not trusted to honor the window.
        Ok(records_from_values(values)
            .into_iter()
            .filter(|r| window.contains(r.timestamp()))
            .collect())
    }

    async fn test(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let request = match self.request(url) {
            Ok(request) => request,
            Err(e) => {
                warn!("Connection test to {} skipped: {:#}", self.base_url, e);
                return false;
            }
        };
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Connection test to {} failed: {}", self.base_url, e);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    fn window() -> DateWindow {
        DateWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_file_source_jsonl_filters_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2024-01-05T10:00:00Z","action":"changedApexClass","componentType":"ApexClass","componentName":"Foo"}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2023-12-05T10:00:00Z","action":"changedApexClass","componentType":"ApexClass","componentName":"Old"}}"#
        )
        .unwrap();

        let source = FileSource::new(file.path());
        let records = source.fetch_records(&window()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(source.test().await);
    }

    #[tokio::test]
    async fn test_file_source_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"CreatedDate":"2024-01-10T08:00:00.000+0000","Action":"createdCustomField",
                  "Section":"Custom Fields","Display":"Created custom field Rating__c on Account"}}]"#
        )
        .unwrap();

        let records = FileSource::new(file.path())
            .fetch_records(&window())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], RawAuditRecord::SetupTrail(_)));
    }

    #[tokio::test]
    async fn test_file_source_array_skips_bad_element() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"timestamp":"2024-01-05T10:00:00Z","componentType":"ApexClass","componentName":"NoAction"}},
                {{"timestamp":"2024-01-06T10:00:00Z","action":"changedApexClass","componentType":"ApexClass","componentName":"Foo"}}]"#
        )
        .unwrap();

        let records = FileSource::new(file.path())
            .fetch_records(&window())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        match &records[0] {
            RawAuditRecord::Flat(flat) => assert_eq!(flat.component_name.as_deref(), Some("Foo")),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_records_from_values_counts_only_readable() {
        let values = vec![
            serde_json::json!({"timestamp": "2024-01-05T10:00:00Z", "action": "changedFlow"}),
            serde_json::json!({"timestamp": "2024-01-05T10:00:00+0000", "action": "changedFlow"}),
            serde_json::json!("not a record"),
        ];
        assert_eq!(records_from_values(values).len(), 1);
    }

    #[tokio::test]
    async fn test_http_source_missing_token_fails_on_use() {
        let source = HttpSource::new(
            "http://127.0.0.1:9",
            Some("TRAILPACK_TEST_UNSET_TOKEN".to_string()),
        )
        .unwrap();
        let err = source.fetch_records(&window()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("TRAILPACK_TEST_UNSET_TOKEN"));
        assert!(!source.test().await);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/audit.jsonl");
        assert!(source.fetch_records(&window()).await.is_err());
        assert!(!source.test().await);
    }

    #[test]
    fn test_http_source_trims_base_url() {
        let source = HttpSource::new("https://example.test/api/", None).unwrap();
        assert_eq!(source.describe(), "http:https://example.test/api");
    }
}
