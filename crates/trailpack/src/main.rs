//! Trailpack - Build deployment packages from configuration audit trails.

mod config;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{Config, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trailpack_analyzer::{PackageRequest, Pipeline, RunReport, RunRequest};
use trailpack_collector::{Collector, CollectorConfig, EnvironmentRegistry};
use trailpack_common::window::parse_instant;
use trailpack_common::DateWindow;
use trailpack_recorder::{FilePackageStore, PackageRecorder};

#[derive(Parser)]
#[command(name = "trailpack")]
#[command(
    author,
    version,
    about = "Turn configuration audit trails into deployable package manifests"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured source environments
    Environments,

    /// Check that a source environment is reachable
    TestEnv {
        /// Environment id
        #[arg(long)]
        env: String,
    },

    /// Fetch audit entries and generate a package manifest
    Analyze {
        /// Environment ids (repeatable; defaults to all active environments)
        #[arg(long = "env")]
        environments: Vec<String>,

        /// Window start (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Window end (RFC 3339 or YYYY-MM-DD, inclusive; defaults to now)
        #[arg(long)]
        end: Option<String>,

        /// Manifest API version (defaults to the configured one)
        #[arg(long)]
        api_version: Option<String>,

        /// Write the manifest here instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Write the full run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Save the result as a deployment package with this name
        #[arg(long)]
        save_as: Option<String>,

        /// Target environment of the saved package
        #[arg(long, requires = "save_as")]
        target: Option<String>,

        /// Description of the saved package
        #[arg(long, requires = "save_as")]
        description: Option<String>,

        /// Version label of the saved package
        #[arg(long = "package-version", requires = "save_as", default_value = "1.0")]
        package_version: String,
    },

    /// List saved deployment packages, newest first
    Packages,

    /// Write a saved package's manifest to a file
    Download {
        /// Package name
        #[arg(long)]
        name: String,

        /// Output path (defaults to <name>_package.xml or .json, by manifest format)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Environments => {
            if config.environments.is_empty() {
                println!("No environments configured in {}", cli.config.display());
            }
            println!(
                "{:<12} {:<24} {:<12} {:<8} INSTANCE",
                "ID", "NAME", "TYPE", "ACTIVE"
            );
            for env in &config.environments {
                println!(
                    "{:<12} {:<24} {:<12} {:<8} {}",
                    env.id,
                    env.name,
                    env.environment_type.as_deref().unwrap_or("-"),
                    if env.active { "yes" } else { "no" },
                    env.instance_url.as_deref().unwrap_or("-"),
                );
            }
        }

        Commands::TestEnv { env } => {
            let registry = EnvironmentRegistry::from_descriptors(config.environments.clone())?;
            if registry.test_environment(&env).await? {
                println!("{}: reachable", env);
            } else {
                bail!("{}: not reachable", env);
            }
        }

        Commands::Analyze {
            environments,
            start,
            end,
            api_version,
            out,
            report,
            save_as,
            target,
            description,
            package_version,
        } => {
            let registry = Arc::new(EnvironmentRegistry::from_descriptors(
                config.environments.clone(),
            )?);

            let environments = if environments.is_empty() {
                registry.active_ids()
            } else {
                environments
            };
            let window = build_window(start.as_deref(), end.as_deref(), config.lookback_days)?;

            let collector = Collector::new(
                Arc::clone(&registry),
                CollectorConfig {
                    fetch_timeout: Duration::from_secs(config.fetch_timeout_seconds),
                },
            );
            let pipeline = Pipeline::new(collector, config.manifest.clone());

            let package = save_as.map(|name| {
                let mut package = PackageRequest::new(name);
                package.target_environment = target.unwrap_or_default();
                package.description = description;
                package.version = package_version;
                package
            });
            let store = match package {
                Some(_) => Some(FilePackageStore::new(&config.store_dir)?),
                None => None,
            };

            let request = RunRequest {
                environments,
                window,
                api_version: api_version.unwrap_or_else(|| config.api_version.clone()),
                package,
            };

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling run");
                    on_interrupt.cancel();
                }
            });

            let recorder = store.as_ref().map(|s| s as &dyn PackageRecorder);
            let run_report = pipeline.run(request, recorder, &cancel).await?;

            print_summary(&run_report);

            match out {
                Some(path) => {
                    std::fs::write(&path, &run_report.manifest_text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Manifest written to {:?}", path);
                }
                None => print!("{}", run_report.manifest_text),
            }

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&run_report)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Run report written to {:?}", path);
            }

            if let Some(id) = run_report.package_id {
                info!("Saved deployment package {}", id);
            }
        }

        Commands::Packages => {
            let store = FilePackageStore::new(&config.store_dir)?;
            let packages = store.list().await?;
            if packages.is_empty() {
                println!("No deployment packages in {}", config.store_dir.display());
                return Ok(());
            }
            println!(
                "{:<24} {:<8} {:<8} {:<12} {:>10}  CREATED",
                "NAME", "STATUS", "VERSION", "TARGET", "COMPONENTS"
            );
            for package in packages {
                println!(
                    "{:<24} {:<8} {:<8} {:<12} {:>10}  {}",
                    package.name,
                    package.status,
                    package.version,
                    if package.target_environment.is_empty() {
                        "-"
                    } else {
                        package.target_environment.as_str()
                    },
                    package.component_count,
                    package.created_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }

        Commands::Download { name, out } => {
            let store = FilePackageStore::new(&config.store_dir)?;
            let package = store
                .find_by_name(&name)
                .await?
                .with_context(|| format!("No deployment package named {}", name))?;
            let path = out.unwrap_or_else(|| PathBuf::from(package.download_name()));
            std::fs::write(&path, &package.manifest_document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Manifest of {} written to {:?}", package.name, path);
        }
    }

    Ok(())
}

/// Window from optional command-line dates. A missing end means now; a
/// missing start means `lookback_days` before the end.
fn build_window(start: Option<&str>, end: Option<&str>, lookback_days: u32) -> Result<DateWindow> {
    let end = match end {
        Some(s) => parse_instant(s, true)?,
        None => Utc::now(),
    };
    let start = match start {
        Some(s) => parse_instant(s, false)?,
        None => end - chrono::Duration::days(i64::from(lookback_days)),
    };
    Ok(DateWindow::new(start, end)?)
}

fn print_summary(report: &RunReport) {
    info!("Window: {}", report.window);
    for (env, count) in &report.entry_counts {
        info!("  {}: {} entries", env, count);
    }
    for error in &report.fetch_errors {
        warn!("  {}", error);
    }
    if report.skipped_entries > 0 {
        info!("Skipped {} entries without a component", report.skipped_entries);
    }
    if report.no_data {
        warn!("No changes found in the selected window; the manifest is empty");
    }
    for type_count in report.categorized.summary() {
        info!("  {}: {}", type_count.component_type, type_count.count);
    }
    info!(
        "{} components in {} types",
        report.categorized.total_components(),
        report.manifest.types.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_window_from_dates() {
        let window = build_window(Some("2024-03-01"), Some("2024-03-07"), 7).unwrap();
        assert_eq!(window.start().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(window.end().to_rfc3339(), "2024-03-07T23:59:59+00:00");
    }

    #[test]
    fn test_build_window_defaults_to_lookback() {
        let window = build_window(None, Some("2024-03-08T00:00:00Z"), 7).unwrap();
        assert_eq!(window.start().to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_build_window_rejects_reversed_range() {
        assert!(build_window(Some("2024-03-08"), Some("2024-03-01"), 7).is_err());
    }
}
