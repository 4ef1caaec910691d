//! Run orchestration: fetch, extract, categorize, generate and optionally
//! persist, as one explicit sequence of stages.

use crate::manifest::{self, ManifestOptions};
use crate::{categorize, extract};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trailpack_collector::{Collector, SourceFetchError};
use trailpack_common::{DateWindow, Error, ErrorKind};
use trailpack_recorder::PackageRecorder;
use trailpack_schema::{
    ApiVersion, CategorizedComponents, Component, ManifestFormat, NewPackage, PackageId,
    PackageManifest, PackageStatus,
};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    FetchingEntries,
    Extracting,
    Categorizing,
    GeneratingManifest,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Idle => "idle",
            RunStage::FetchingEntries => "fetching entries",
            RunStage::Extracting => "extracting",
            RunStage::Categorizing => "categorizing",
            RunStage::GeneratingManifest => "generating manifest",
            RunStage::Persisting => "persisting",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A run that ended in [`RunStage::Failed`].
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed while {stage}: {source}")]
pub struct PipelineError {
    /// The stage that was active when the run failed.
    pub stage: RunStage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Descriptive fields of a package to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRequest {
    pub name: String,
    pub target_environment: String,
    pub description: Option<String>,
    pub version: String,
    pub status: PackageStatus,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_environment: String::new(),
            description: None,
            version: trailpack_schema::package::DEFAULT_PACKAGE_VERSION.to_string(),
            status: PackageStatus::Draft,
        }
    }

    fn into_new_package(
        self,
        manifest_document: &str,
        manifest_format: ManifestFormat,
        snapshot: &[Component],
    ) -> NewPackage {
        NewPackage {
            name: self.name,
            manifest_document: manifest_document.to_string(),
            manifest_format,
            target_environment: self.target_environment,
            description: self.description,
            version: self.version,
            component_snapshot: snapshot.to_vec(),
            status: self.status,
        }
    }
}

/// Input of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub environments: Vec<String>,
    pub window: DateWindow,
    pub api_version: String,
    /// Persist the result under this request. Requires a recorder.
    pub package: Option<PackageRequest>,
}

/// Outcome of a run that reached [`RunStage::Done`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Stages entered, in order.
    pub stages: Vec<RunStage>,
    pub window: DateWindow,
    /// Entries fetched per environment that responded.
    pub entry_counts: BTreeMap<String, usize>,
    /// Environments that failed; the run continued without them.
    pub fetch_errors: Vec<SourceFetchError>,
    /// Entries dropped for lacking a component type or name.
    pub skipped_entries: usize,
    pub components: Vec<Component>,
    pub categorized: CategorizedComponents,
    pub manifest: PackageManifest,
    pub manifest_text: String,
    /// No entries were fetched from any environment.
    pub no_data: bool,
    pub package_id: Option<PackageId>,
}

impl RunReport {
    pub fn total_entries(&self) -> usize {
        self.entry_counts.values().sum()
    }

    pub fn is_partial(&self) -> bool {
        !self.fetch_errors.is_empty()
    }
}

/// Records stage transitions of one run.
struct StageTracker {
    trail: Vec<RunStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            trail: vec![RunStage::Idle],
        }
    }

    fn current(&self) -> RunStage {
        self.trail.last().copied().unwrap_or(RunStage::Idle)
    }

    /// Move to `stage` unless the run was cancelled.
    fn enter(
        &mut self,
        stage: RunStage,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(self.fail(Error::Cancelled));
        }
        info!("Pipeline stage: {}", stage);
        self.trail.push(stage);
        Ok(())
    }

    fn fail(&mut self, source: Error) -> PipelineError {
        let stage = self.current();
        warn!("Pipeline failed while {}: {}", stage, source);
        self.trail.push(RunStage::Failed);
        PipelineError { stage, source }
    }

    fn finish(mut self) -> Vec<RunStage> {
        self.trail.push(RunStage::Done);
        info!("Pipeline stage: {}", RunStage::Done);
        self.trail
    }
}

/// Sequences collection, analysis and optional persistence.
pub struct Pipeline {
    collector: Collector,
    options: ManifestOptions,
}

impl Pipeline {
    pub fn new(collector: Collector, options: ManifestOptions) -> Self {
        Self { collector, options }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn options(&self) -> &ManifestOptions {
        &self.options
    }

    /// Execute one run.
    ///
    /// Request errors are reported before any environment is contacted.
    /// Environments that fail are listed in the report while the run goes on
    /// with the rest; zero entries overall still produces an (empty) manifest
    /// with `no_data` set. Persistence happens only when the request carries
    /// a [`PackageRequest`]. The run stops at the next stage boundary once
    /// `cancel` fires.
    pub async fn run(
        &self,
        request: RunRequest,
        recorder: Option<&dyn PackageRecorder>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let mut stages = StageTracker::new();

        if let Err(e) = check_request(&request, recorder.is_some()) {
            return Err(stages.fail(e));
        }

        // Fetch
        stages.enter(RunStage::FetchingEntries, cancel)?;
        let outcome = self
            .collector
            .fetch_entries(&request.environments, &request.window, cancel)
            .await
            .map_err(|e| stages.fail(e))?;
        for error in &outcome.errors {
            warn!("Continuing without environment {}", error);
        }
        let entries = outcome.flatten();
        let no_data = entries.is_empty();
        if no_data {
            warn!("No audit entries found in {}", request.window);
        }

        // Extract
        stages.enter(RunStage::Extracting, cancel)?;
        let extraction = extract(&entries);
        if extraction.skipped > 0 {
            info!(
                "Skipped {} audit entries without a component",
                extraction.skipped
            );
        }
        info!("Extracted {} components", extraction.components.len());

        // Categorize
        stages.enter(RunStage::Categorizing, cancel)?;
        let categorized = categorize(&extraction.components);
        info!("Categorized into {} types", categorized.categories().len());

        // Generate
        stages.enter(RunStage::GeneratingManifest, cancel)?;
        let manifest = manifest::generate(&categorized, &request.api_version, &self.options)
            .map_err(|e| stages.fail(e))?;
        let manifest_text =
            manifest::render(&manifest, &self.options).map_err(|e| stages.fail(e))?;

        let mut report = RunReport {
            stages: Vec::new(),
            window: request.window,
            entry_counts: outcome.entry_counts(),
            fetch_errors: outcome.errors,
            skipped_entries: extraction.skipped,
            components: extraction.components,
            categorized,
            manifest,
            manifest_text,
            no_data,
            package_id: None,
        };

        // Persist
        if let (Some(package), Some(recorder)) = (request.package, recorder) {
            stages.enter(RunStage::Persisting, cancel)?;
            let new_package = package.into_new_package(
                &report.manifest_text,
                self.options.format,
                &report.components,
            );
            let id = recorder
                .create(new_package)
                .await
                .map_err(|e| stages.fail(e))?;
            report.package_id = Some(id);
        }

        report.stages = stages.finish();
        Ok(report)
    }

    /// Persist the manifest of a finished run.
    pub async fn save(
        &self,
        report: &RunReport,
        request: PackageRequest,
        recorder: &dyn PackageRecorder,
    ) -> Result<PackageId, PipelineError> {
        let fail = |source: Error| {
            warn!("Save failed: {}", source);
            PipelineError {
                stage: RunStage::Persisting,
                source,
            }
        };

        let new_package = request.into_new_package(
            &report.manifest_text,
            self.options.format,
            &report.components,
        );
        new_package.validate().map_err(fail)?;
        recorder.create(new_package).await.map_err(fail)
    }
}

fn check_request(request: &RunRequest, has_recorder: bool) -> trailpack_common::Result<()> {
    if request.environments.is_empty() {
        return Err(Error::validation("at least one environment is required"));
    }
    if request.window.start() > request.window.end() {
        return Err(Error::validation("start must not be after end"));
    }
    request.api_version.parse::<ApiVersion>()?;

    if let Some(package) = &request.package {
        if !has_recorder {
            return Err(Error::validation(
                "a package was requested but no package store is available",
            ));
        }
        if package.name.trim().is_empty() {
            return Err(Error::validation("package name must not be empty"));
        }
        if package.version.trim().is_empty() {
            return Err(Error::validation("package version must not be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request(environments: Vec<String>, api_version: &str) -> RunRequest {
        RunRequest {
            environments,
            window: DateWindow::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .unwrap(),
            api_version: api_version.to_string(),
            package: None,
        }
    }

    #[test]
    fn test_check_request() {
        assert!(check_request(&request(vec!["dev".into()], "65.0"), false).is_ok());

        let err = check_request(&request(vec![], "65.0"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = check_request(&request(vec!["dev".into()], "65"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let mut with_package = request(vec!["dev".into()], "65.0");
        with_package.package = Some(PackageRequest::new("release"));
        assert!(check_request(&with_package, false).is_err());
        assert!(check_request(&with_package, true).is_ok());

        with_package.package = Some(PackageRequest::new("  "));
        assert!(check_request(&with_package, true).is_err());
    }

    #[test]
    fn test_stage_tracker() {
        let cancel = CancellationToken::new();
        let mut stages = StageTracker::new();
        stages.enter(RunStage::FetchingEntries, &cancel).unwrap();
        stages.enter(RunStage::Extracting, &cancel).unwrap();
        assert_eq!(
            stages.finish(),
            vec![
                RunStage::Idle,
                RunStage::FetchingEntries,
                RunStage::Extracting,
                RunStage::Done
            ]
        );

        let mut stages = StageTracker::new();
        stages.enter(RunStage::FetchingEntries, &cancel).unwrap();
        cancel.cancel();
        let err = stages.enter(RunStage::Extracting, &cancel).unwrap_err();
        assert_eq!(err.stage, RunStage::FetchingEntries);
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
