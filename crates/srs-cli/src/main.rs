use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use srs_adapters::UploadFormat;
use srs_core::{Mode, Rule};
use srs_ingest::{normalize_batch, BatchSummary, IngestConfig, IngestPipeline};
use srs_stats::StatsService;
use srs_storage::{
    HttpScheduleCalendar, PgResultStore, ResultStore, ScenarioCodeFilter, ScheduleCalendar,
    ScheduleRepo, StaticScheduleCalendar,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "srs-cli")]
#[command(version, about = "Salmon Run Stats command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations.
    Migrate,
    /// Normalize a submission batch and upsert it.
    Ingest {
        file: PathBuf,
        #[arg(long)]
        format: UploadFormat,
        /// Resolve shifts from a local JSON calendar instead of SRS_SCHEDULE_CALENDAR_URL.
        #[arg(long)]
        calendar_file: Option<PathBuf>,
    },
    /// Print the canonical form of every item in a batch without storing it.
    Normalize {
        file: PathBuf,
        #[arg(long)]
        format: UploadFormat,
    },
    /// Print statistics for one schedule.
    Stats { schedule_id: i64 },
    ScenarioCodes {
        #[arg(long)]
        min_danger_rate: Option<f64>,
        #[arg(long)]
        has_extra_wave: Option<bool>,
        #[arg(long)]
        mode: Option<Mode>,
        #[arg(long)]
        rule: Option<Rule>,
        #[arg(long)]
        stage_id: Option<i32>,
        /// Repeat to require several weapons.
        #[arg(long = "weapon")]
        weapons: Vec<i32>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    Schedules {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

async fn connect(config: &IngestConfig) -> Result<Arc<PgResultStore>> {
    let store = PgResultStore::connect(
        &config.database_url,
        config.db_max_connections,
        config.db_statement_timeout_ms,
    )
    .await
    .context("connecting to the result database")?;
    Ok(Arc::new(store))
}

fn calendar(config: &IngestConfig, calendar_file: Option<PathBuf>) -> Result<Arc<dyn ScheduleCalendar>> {
    if let Some(path) = calendar_file {
        return Ok(Arc::new(StaticScheduleCalendar::from_json_file(&path)?));
    }
    match &config.schedule_calendar_url {
        Some(url) => Ok(Arc::new(HttpScheduleCalendar::new(
            url.clone(),
            config.http_client_config(),
        )?)),
        None => {
            tracing::warn!("no schedule calendar configured; regular client exports will be rejected");
            Ok(Arc::new(StaticScheduleCalendar::default()))
        }
    }
}

fn read_batch(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading batch {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();

    match cli.command {
        Commands::Migrate => {
            let store = connect(&config).await?;
            store.migrate().await.context("running migrations")?;
            tracing::info!("migrations applied");
        }
        Commands::Ingest {
            file,
            format,
            calendar_file,
        } => {
            let raw = read_batch(&file)?;
            let store = connect(&config).await?;
            let pipeline = IngestPipeline::new(store, calendar(&config, calendar_file)?);
            let report = pipeline.normalize_and_upsert(&raw, format).await?;
            for outcome in &report.accepted {
                println!("{}", serde_json::to_string(outcome)?);
            }
            for item in &report.rejected {
                eprintln!("item {}: {}", item.index, item.error);
            }
            let summary = BatchSummary::from(&report);
            println!(
                "ingest complete: batch_id={} created={} updated={} rejected={}",
                report.batch_id, summary.created, summary.updated, summary.rejected
            );
        }
        Commands::Normalize { file, format } => {
            let raw = read_batch(&file)?;
            for (index, item) in normalize_batch(&raw, format)?.into_iter().enumerate() {
                match item {
                    Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                    Err(err) => eprintln!("item {index}: {err}"),
                }
            }
        }
        Commands::Stats { schedule_id } => {
            let store = connect(&config).await?;
            let stats = StatsService::new(store).get_statistics(schedule_id).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::ScenarioCodes {
            min_danger_rate,
            has_extra_wave,
            mode,
            rule,
            stage_id,
            weapons,
            offset,
            limit,
        } => {
            let store = connect(&config).await?;
            let filter = ScenarioCodeFilter {
                min_danger_rate,
                has_extra_wave,
                mode,
                rule,
                stage_id,
                weapons,
                offset,
                limit,
            };
            let codes = StatsService::new(store).scenario_codes(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&codes)?);
        }
        Commands::Schedules { limit } => {
            let store = connect(&config).await?;
            for schedule in store.list_schedules(limit).await? {
                println!("{}", serde_json::to_string(&schedule)?);
            }
        }
    }

    Ok(())
}
