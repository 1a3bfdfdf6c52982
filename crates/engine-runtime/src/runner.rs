use std::sync::Arc;

use engine_core::error::ProgressError;
use engine_core::metrics::Metrics;
use engine_core::progress::ProgressState;
use engine_processing::TransformChain;
use model::config::PipelineConfig;
use model::summary::RunSummary;
use storage::{ObjectStore, StoreRegistry};
use tracing::{debug, info};

use crate::context::{RunContext, RunOptions};
use crate::error::RunError;

/// One batch pass for one worker: list the source, fold the persisted
/// progress, claim a batch, copy its objects concurrently, then mark and
/// persist. Returns how many objects were copied; `0` means nothing was
/// claimable and the worker loop is done.
///
/// If any object fails, the claimed batch is left unmarked so a future
/// claim redoes it; destination objects are only ever finalized whole, so
/// redoing is an idempotent overwrite.
pub async fn run_pipeline(ctx: &RunContext, worker_index: usize) -> Result<usize, RunError> {
    let listed = ctx.source.list().await?;
    let mut names: Vec<String> = listed.into_iter().map(|meta| meta.name).collect();
    // Batch index i must mean the same objects to every worker, whatever
    // order the backend listed them in.
    names.sort_unstable();
    let total = names.len();

    let mut progress = ProgressState::read_merged(
        ctx.state.as_ref(),
        ctx.config.hash(),
        total,
        ctx.batch_size,
    )
    .await?;

    let Some(range) = progress.claim_range() else {
        info!(worker = worker_index, total, "All objects processed.");
        return Ok(0);
    };
    info!(
        worker = worker_index,
        start = range.start,
        end = range.end,
        "Worker claimed range."
    );

    let handles: Vec<_> = range
        .clone()
        .map(|index| {
            let source_name = names[index].clone();
            let destination_name = ctx.config.destination_name(&source_name);
            let source = ctx.source.clone();
            let destination = ctx.destination.clone();
            let chain = ctx.chain.clone();
            let metrics = ctx.metrics.clone();
            tokio::spawn(async move {
                copy_object(
                    source,
                    destination,
                    chain,
                    metrics,
                    source_name,
                    destination_name,
                )
                .await
            })
        })
        .collect();

    let mut copied = 0;
    let mut first_failure: Option<RunError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => copied += 1,
            Ok(Err(err)) => {
                ctx.metrics.add_failures(1);
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
            Err(join_err) => {
                if first_failure.is_none() {
                    first_failure = Some(RunError::TaskJoin(join_err));
                }
            }
        }
    }
    if let Some(err) = first_failure {
        return Err(err);
    }

    progress.mark_done(range.start).map_err(ProgressError::from)?;
    progress.write_merged(ctx.state.as_ref()).await?;
    ctx.metrics.add_objects(copied as u64);
    ctx.metrics.add_batches(1);

    if let Some(report) = &ctx.progress {
        let processed = (progress.batches_done() * ctx.batch_size).min(total);
        report(worker_index, processed, total);
    }
    Ok(copied)
}

async fn copy_object(
    source: Arc<dyn ObjectStore>,
    destination: Arc<dyn ObjectStore>,
    chain: Arc<TransformChain>,
    metrics: Metrics,
    source_name: String,
    destination_name: String,
) -> Result<(), RunError> {
    let reader = source.reader(&source_name).await?;
    let writer = destination.writer(&destination_name).await?;

    let stats = chain
        .run(reader, writer)
        .await
        .map_err(|err| RunError::Object {
            name: source_name.clone(),
            source: err,
        })?;

    metrics.add_bytes_read(stats.bytes_read());
    metrics.add_bytes_written(stats.bytes_written());
    debug!(
        object = %source_name,
        destination = %destination_name,
        bytes_read = stats.bytes_read(),
        bytes_written = stats.bytes_written(),
        "Copied object."
    );
    Ok(())
}

/// Runs `options.parallelism` independent worker loops to completion and
/// folds their shared counters into a summary. Workers coordinate only
/// through the state location; the first error is surfaced after every
/// loop has joined, so no worker is cancelled mid-batch.
pub async fn run_pipeline_loop(
    registry: &StoreRegistry,
    config: PipelineConfig,
    options: RunOptions,
) -> Result<RunSummary, RunError> {
    let parallelism = options.parallelism.max(1);
    let ctx = Arc::new(RunContext::new(registry, config, &options)?);
    info!(
        config_hash = %ctx.config.hash(),
        source = %ctx.config.source,
        destination = %ctx.config.destination,
        parallelism,
        "Starting pipeline run."
    );

    let handles: Vec<_> = (0..parallelism)
        .map(|worker_index| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                loop {
                    if run_pipeline(&ctx, worker_index).await? == 0 {
                        return Ok::<(), RunError>(());
                    }
                }
            })
        })
        .collect();

    let mut first_failure: Option<RunError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
            Err(join_err) => {
                if first_failure.is_none() {
                    first_failure = Some(RunError::TaskJoin(join_err));
                }
            }
        }
    }
    if let Some(err) = first_failure {
        return Err(err);
    }

    let summary: RunSummary = ctx.metrics.snapshot().into();
    info!(
        objects = summary.objects_copied,
        batches = summary.batches_completed,
        bytes_read = summary.bytes_read,
        bytes_written = summary.bytes_written,
        "Pipeline run complete."
    );
    Ok(summary)
}
