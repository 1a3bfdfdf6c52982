use std::sync::Arc;
use std::time::Duration;

use engine_core::metrics::Metrics;
use engine_core::progress::BATCH_SIZE;
use engine_processing::TransformChain;
use model::config::PipelineConfig;
use model::location::Location;
use storage::{ObjectStore, StoreRegistry};

use crate::deadline::DeadlineStore;
use crate::error::RunError;

pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Called after each persisted batch with
/// `(worker_index, objects_processed, objects_total)`, where the processed
/// count reflects every batch known done, peers' work included.
pub type ProgressFn = Arc<dyn Fn(usize, usize, usize) + Send + Sync>;

#[derive(Clone)]
pub struct RunOptions {
    /// Worker loops started for the run.
    pub parallelism: usize,
    /// Deadline applied to every storage operation.
    pub op_timeout: Duration,
    /// Objects per claimed batch. The default suits real runs; tests shrink
    /// it to exercise batching with small object counts.
    pub batch_size: usize,
    pub progress: Option<ProgressFn>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            op_timeout: DEFAULT_OP_TIMEOUT,
            batch_size: BATCH_SIZE,
            progress: None,
        }
    }
}

/// Everything a worker loop needs, opened once per run and shared
/// immutably. Stores come wrapped in the operation deadline; the chain is
/// validated here so configuration mistakes fail before any store is
/// touched for data.
pub struct RunContext {
    pub config: Arc<PipelineConfig>,
    pub source: Arc<dyn ObjectStore>,
    pub destination: Arc<dyn ObjectStore>,
    pub state: Arc<dyn ObjectStore>,
    pub chain: Arc<TransformChain>,
    pub metrics: Metrics,
    pub batch_size: usize,
    pub progress: Option<ProgressFn>,
}

impl RunContext {
    pub fn new(
        registry: &StoreRegistry,
        config: PipelineConfig,
        options: &RunOptions,
    ) -> Result<Self, RunError> {
        let chain = Arc::new(TransformChain::build(&config.transforms)?);

        let open = |location: &Location| -> Result<Arc<dyn ObjectStore>, RunError> {
            let store = registry.open(location, &config.storage)?;
            Ok(Arc::new(DeadlineStore::new(store, options.op_timeout)))
        };
        let source = open(&config.source)?;
        let destination = open(&config.destination)?;
        let state = open(&config.state)?;

        Ok(Self {
            config: Arc::new(config),
            source,
            destination,
            state,
            chain,
            metrics: Metrics::new(),
            batch_size: options.batch_size.max(1),
            progress: options.progress.clone(),
        })
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("metrics", &self.metrics)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
