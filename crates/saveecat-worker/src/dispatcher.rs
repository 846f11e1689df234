//! Polling dispatcher: pulls pending jobs from the CMS and runs each one
//! as a scheduled collection run, a bounded number at a time.

use std::future::Future;
use std::time::Duration;

use futures::{stream, StreamExt};
use saveecat_core::{AppConfig, RunCounters, RunKind, SourceKind};
use saveecat_extract::ListingExtractor;
use saveecat_storage::{BlobClient, StorageConfig, UploadManager};
use sqlx::PgPool;

use crate::error::WorkerError;
use crate::gateway::{BlobMedia, PgCatalog};
use crate::orchestrator::{self, RunParams, RunResult, RunSettings};
use crate::schedule::{PendingJob, SchedulingClient};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub poll_interval_secs: u64,
    pub max_parallel_runs: usize,
    pub job_max_retries: u32,
}

impl DispatchSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            poll_interval_secs: config.poll_interval_secs,
            max_parallel_runs: config.max_parallel_runs,
            job_max_retries: config.job_max_retries,
        }
    }
}

/// Polls the CMS forever, sweeping pending jobs on each tick. A failed
/// fetch is logged and retried on the next tick.
pub async fn dispatch_loop(
    scheduler: &SchedulingClient,
    pool: &PgPool,
    config: &AppConfig,
) -> Result<(), WorkerError> {
    let settings = DispatchSettings::from_app_config(config);
    tracing::info!(
        poll_interval_secs = settings.poll_interval_secs,
        max_parallel_runs = settings.max_parallel_runs,
        "dispatcher started"
    );
    loop {
        match run_sweep(scheduler, &settings, |job| run_job(pool, config, job)).await {
            Ok(0) => {}
            Ok(dispatched) => tracing::info!(dispatched, "sweep finished"),
            Err(err) => tracing::warn!(error = %err, "pending jobs fetch failed"),
        }
        tokio::time::sleep(Duration::from_secs(settings.poll_interval_secs)).await;
    }
}

/// One fetch-and-dispatch pass. Returns the number of jobs dispatched.
///
/// Jobs run through `run_job` with bounded concurrency; each job retries
/// on failure and reports its outcome to the CMS, so a bad job never
/// fails the sweep.
///
/// # Errors
///
/// Returns an error only when the pending jobs fetch itself fails.
pub async fn run_sweep<F, Fut>(
    scheduler: &SchedulingClient,
    settings: &DispatchSettings,
    run_job: F,
) -> Result<usize, WorkerError>
where
    F: Fn(PendingJob) -> Fut,
    Fut: Future<Output = Result<RunResult, WorkerError>>,
{
    let jobs = scheduler.fetch_pending().await?;
    let total = jobs.len();
    stream::iter(jobs)
        .map(|job| dispatch_job(scheduler, settings, &run_job, job))
        .buffer_unordered(settings.max_parallel_runs.max(1))
        .collect::<Vec<()>>()
        .await;
    Ok(total)
}

async fn dispatch_job<F, Fut>(
    scheduler: &SchedulingClient,
    settings: &DispatchSettings,
    run_job: &F,
    job: PendingJob,
) where
    F: Fn(PendingJob) -> Fut,
    Fut: Future<Output = Result<RunResult, WorkerError>>,
{
    let tag = job.log_tag();
    let mut attempt = 0u32;
    loop {
        match run_job(job.clone()).await {
            Ok(result) => {
                let c = result.counters;
                scheduler
                    .post_log(
                        &tag,
                        "info",
                        &format!(
                            "run {} completed: {} found, {} uploaded, {} skipped, {} errors",
                            result.run_id, c.found, c.uploaded, c.skipped, c.errors
                        ),
                    )
                    .await;
                return;
            }
            Err(err) => {
                if attempt >= settings.job_max_retries {
                    tracing::error!(job = %tag, error = %err, "job failed, retries exhausted");
                    scheduler
                        .post_log(&tag, "error", &format!("run failed: {err}"))
                        .await;
                    return;
                }
                let delay_secs = 1u64 << attempt.min(5);
                tracing::warn!(
                    job = %tag,
                    attempt,
                    delay_secs,
                    error = %err,
                    "job failed, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                attempt += 1;
            }
        }
    }
}

/// Runs one CMS job end to end as a scheduled run. A job carrying a run id
/// drives the run the CMS already enqueued; one without gets a fresh run.
async fn run_job(
    pool: &PgPool,
    config: &AppConfig,
    job: PendingJob,
) -> Result<RunResult, WorkerError> {
    let kind = SourceKind::from_url(&job.url).ok_or_else(|| {
        WorkerError::Fatal(format!("unsupported listing URL {}", job.url))
    })?;
    let listing_url = kind.listing_url().ok_or_else(|| {
        WorkerError::Fatal(format!("{}: source kind has no listing page", job.url))
    })?;

    let source = saveecat_db::create_or_get_source(pool, &listing_url, &kind).await?;
    let (run_id, run_kind, max_items, counters) = match job.run_id {
        Some(run_id) => {
            let run = saveecat_db::get_run(pool, run_id).await?;
            (
                run.id,
                run.run_kind().unwrap_or(RunKind::Scheduled),
                run.max_items.or(job.max_items),
                run.counters.0,
            )
        }
        None => {
            let run =
                saveecat_db::create_run(pool, source.id, RunKind::Scheduled, job.max_items).await?;
            (run.id, RunKind::Scheduled, job.max_items, RunCounters::default())
        }
    };
    tracing::info!(run_id, url = %listing_url, "dispatching job");

    let catalog = PgCatalog::new(pool.clone());
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
    let settings = RunSettings::from_app_config(config);

    orchestrator::execute(
        &catalog,
        &mut media,
        &mut extractor,
        &settings,
        RunParams {
            run_id,
            source_id: source.id,
            kind: run_kind,
            source_kind: kind,
            max_items,
            counters,
        },
    )
    .await
}
