//! Command-line surface: one-off ETL runs, backfills, seeders and the
//! operational check commands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::Result;
use crate::ingestion::{FsBlobStore, JsonManifestStore, Mirror, SourceRegistry};
use crate::notify::AlertManager;
use crate::pipeline::backfill::run_backfill;
use crate::pipeline::monitor::RunMonitor;
use crate::pipeline::{Pipeline, RunDepth};
use crate::scheduler::Scheduler;
use crate::storage::{seed, Database, Queries};

#[derive(Debug, Parser)]
#[command(name = "fiscal-ops", version, about = "Kenya public-finance data acquisition platform")]
pub struct Cli {
    /// Configuration file (TOML); environment variables override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// One-off run for a single source.
    Etl {
        /// Source key: treasury, cob, oag, knbs, opendata or cra.
        source: String,
        /// Deep run: larger batch, curated treasury selection.
        #[arg(long)]
        deep: bool,
    },
    /// Historical sweep across sources with an optional year window.
    Backfill {
        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<String>>,
        #[arg(long)]
        year_from: Option<i32>,
        #[arg(long)]
        year_to: Option<i32>,
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Reference-data seeders, outside the ingestion hot path.
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Print database counts and the latest document.
    PostIngestionCheck,
    /// Print the calendar schedule report for all sources.
    Schedule,
}

#[derive(Debug, Subcommand)]
pub enum SeedTarget {
    Counties,
    Ministries,
    Minimums,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("fiscal-ops.toml"));
    let config = Config::load(Some(&config_path))?;
    crate::observability::init_tracing(&config.logging);

    match cli.command {
        Command::Etl { source, deep } => {
            let (pipeline, monitor) = build_pipeline(&config).await?;
            let depth = if deep { RunDepth::Deep } else { RunDepth::Light };
            let summary = monitor
                .run_monitored(&source, pipeline.run_source(&source, depth))
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Backfill {
            sources,
            year_from,
            year_to,
            concurrency,
        } => {
            let mut settings = config.backfill.clone();
            if let Some(sources) = sources {
                settings.sources = sources;
            }
            if year_from.is_some() {
                settings.year_from = year_from;
            }
            if year_to.is_some() {
                settings.year_to = year_to;
            }
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency.max(1);
            }

            let (pipeline, monitor) = build_pipeline(&config).await?;
            let downloads_dir = config.storage.downloads_dir.clone();
            let summary = monitor
                .run_monitored(
                    "backfill",
                    run_backfill(Arc::new(pipeline), &settings, &downloads_dir),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Seed { target } => {
            let database = Database::connect(&config.database).await?;
            let loader = crate::storage::Loader::new(database.pool().clone());
            match target {
                SeedTarget::Counties => {
                    let seeded = seed::seed_counties(&loader).await?;
                    info!(seeded, "counties seeded");
                }
                SeedTarget::Ministries => {
                    let seeded = seed::seed_ministries(&loader).await?;
                    info!(seeded, "ministries seeded");
                }
                SeedTarget::Minimums => {
                    seed::seed_minimums(&loader).await?;
                }
            }
            Ok(())
        }
        Command::PostIngestionCheck => {
            let database = Database::connect(&config.database).await?;
            let queries = Queries::new(database.pool().clone());
            let summary = queries.data_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Schedule => {
            let scheduler = Scheduler::new();
            let report = scheduler.generate_schedule_report();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// Wire the pipeline from configuration: database, registry, manifest,
/// optional mirror, notifier. Notifier credentials missing from the config
/// are resolved through the secret port (`SECRET_BACKEND`).
async fn build_pipeline(config: &Config) -> Result<(Pipeline, RunMonitor)> {
    let mut config = config.clone();
    let secrets = crate::secrets::from_env();
    if config.notify.smtp_password.is_none() {
        config.notify.smtp_password = secrets.get("SMTP_PASSWORD").await;
    }
    if config.notify.slack_webhook_url.is_none() {
        config.notify.slack_webhook_url = secrets.get("SLACK_WEBHOOK_URL").await;
    }
    if config.notify.pagerduty_integration_key.is_none() {
        config.notify.pagerduty_integration_key = secrets.get("PAGERDUTY_INTEGRATION_KEY").await;
    }
    let config = &config;

    let database = Database::connect(&config.database).await?;

    let registry = SourceRegistry::load(&config.storage.sources_file)?;
    if !config.storage.sources_file.exists() {
        warn!(
            path = %config.storage.sources_file.display(),
            "sources file missing, using built-in registry"
        );
    }

    let manifest = Arc::new(JsonManifestStore::open(&config.manifest_path()));
    let mirror = match (&config.storage.mirror_dir, &config.storage.mirror_bucket) {
        (Some(dir), bucket) => Mirror::new(Arc::new(FsBlobStore::new(
            dir,
            bucket.clone().unwrap_or_else(|| "fiscal-ops".to_string()),
        ))),
        _ => Mirror::disabled(),
    };

    let notifier = Arc::new(AlertManager::new(config.notify.clone()));
    let pipeline = Pipeline::new(config, &database, registry, manifest, mirror)?
        .with_notifier(notifier.clone());
    let monitor = RunMonitor::new(notifier);
    Ok((pipeline, monitor))
}
