use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use saveecat_core::{load_app_config, AppConfig, RunCounters, RunKind, SourceKind};
use saveecat_db::PoolConfig;
use saveecat_extract::ListingExtractor;
use saveecat_storage::{BlobClient, StorageConfig, UploadManager};
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod dedup;
mod dispatcher;
mod error;
mod gateway;
mod orchestrator;
mod schedule;

use gateway::{BlobMedia, PgCatalog};
use orchestrator::{RunParams, RunSettings};
use schedule::SchedulingClient;

#[derive(Debug, Parser)]
#[command(name = "saveecat-worker")]
#[command(about = "savee.com content ingestion worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one collection pass against a listing URL, or resume a run by id.
    Run {
        /// Listing URL to collect from (home, /pop, or a user page).
        #[arg(long)]
        start_url: Option<String>,
        /// Stop after this many items; 0 means unbounded.
        #[arg(long, default_value_t = 0)]
        max_items: i32,
        /// Resume an existing run instead of creating a new one.
        #[arg(long)]
        run_id: Option<i64>,
    },
    /// Poll the CMS for pending jobs and dispatch runs until interrupted.
    Dispatch,
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = load_app_config().context("failed to load configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            start_url,
            max_items,
            run_id,
        } => cmd_run(&config, start_url.as_deref(), max_items, run_id).await,
        Commands::Dispatch => cmd_dispatch(&config).await,
        Commands::Migrate => cmd_migrate(&config).await,
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    saveecat_db::connect_pool(&config.database_url, PoolConfig::from_app_config(config))
        .await
        .context("failed to connect to the database")
}

async fn cmd_run(
    config: &AppConfig,
    start_url: Option<&str>,
    max_items: i32,
    run_id: Option<i64>,
) -> anyhow::Result<()> {
    let pool = connect(config).await?;

    let (params, source_kind) = match run_id {
        Some(id) => resume_params(&pool, id).await?,
        None => {
            let Some(url) = start_url else {
                bail!("either --start-url or --run-id is required");
            };
            new_run_params(&pool, url, max_items).await?
        }
    };

    let listing_url = source_kind
        .listing_url()
        .context("source kind has no listing page to crawl")?;
    let mut extractor =
        ListingExtractor::new(&listing_url, &config.user_agent, config.http_timeout_secs)?;
    let blob = BlobClient::new(
        &config.blob_endpoint,
        &config.blob_bucket,
        config.blob_token.as_deref(),
        config.http_timeout_secs,
        config.upload_max_retries,
    )?;
    let manager = UploadManager::new(
        blob,
        StorageConfig {
            user_agent: config.user_agent.clone(),
            http_timeout_secs: config.http_timeout_secs,
            download_max_retries: config.download_max_retries,
        },
    )?;
    let mut media = BlobMedia::new(manager);
    let catalog = PgCatalog::new(pool);
    let settings = RunSettings::from_app_config(config);

    let result =
        orchestrator::execute(&catalog, &mut media, &mut extractor, &settings, params).await?;
    println!(
        "run {} finished: {} found, {} uploaded, {} skipped, {} errors",
        result.run_id,
        result.counters.found,
        result.counters.uploaded,
        result.counters.skipped,
        result.counters.errors
    );
    Ok(())
}

/// Builds run parameters for a fresh run against `url`.
async fn new_run_params(
    pool: &PgPool,
    url: &str,
    max_items: i32,
) -> anyhow::Result<(RunParams, SourceKind)> {
    let kind = SourceKind::from_url(url)
        .with_context(|| format!("{url} is not a supported savee.com listing URL"))?;
    let listing_url = kind
        .listing_url()
        .context("source kind has no listing page to crawl")?;
    let source = saveecat_db::create_or_get_source(pool, &listing_url, &kind).await?;
    let max_items = (max_items > 0).then_some(max_items);
    let run = saveecat_db::create_run(pool, source.id, RunKind::Manual, max_items).await?;
    Ok((
        RunParams {
            run_id: run.id,
            source_id: source.id,
            kind: RunKind::Manual,
            source_kind: kind.clone(),
            max_items,
            counters: RunCounters::default(),
        },
        kind,
    ))
}

/// Rebuilds run parameters for a paused or pending run.
async fn resume_params(pool: &PgPool, run_id: i64) -> anyhow::Result<(RunParams, SourceKind)> {
    let run = saveecat_db::get_run(pool, run_id)
        .await
        .with_context(|| format!("run {run_id} not found"))?;
    let source = saveecat_db::get_source(pool, run.source_id).await?;
    let kind = source.source_kind().context("source row has an unknown kind")?;
    Ok((
        RunParams {
            run_id: run.id,
            source_id: run.source_id,
            kind: run.run_kind().unwrap_or(RunKind::Manual),
            source_kind: kind.clone(),
            max_items: run.max_items,
            counters: run.counters.0,
        },
        kind,
    ))
}

async fn cmd_dispatch(config: &AppConfig) -> anyhow::Result<()> {
    let Some(cms_url) = config.cms_url.as_deref() else {
        bail!("SAVEECAT_CMS_URL must be set for dispatch mode");
    };
    let pool = connect(config).await?;
    let scheduler = SchedulingClient::new(
        cms_url,
        config.cms_token.as_deref(),
        &config.user_agent,
        config.http_timeout_secs,
    )?;
    dispatcher::dispatch_loop(&scheduler, &pool, config).await?;
    Ok(())
}

async fn cmd_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let applied = saveecat_db::run_migrations(&pool)
        .await
        .context("migration failed")?;
    println!("applied {applied} migration(s)");
    Ok(())
}
