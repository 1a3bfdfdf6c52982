#![allow(dead_code)]

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use engine_runtime::{RunOptions, run_pipeline_loop};
use model::config::PipelineConfig;
use model::location::Location;
use model::summary::RunSummary;
use model::transform::TransformSpec;
use storage::{LocalFsStore, MemoryStore, ObjectStore, StoreRegistry, read_all, write_all};
use uuid::Uuid;

/// Hex AES keys reused across the encryption scenarios.
pub const KEY_A: &str = "000102030405060708090a0b0c0d0e0f";
pub const KEY_B: &str = "ffeeddccbbaa99887766554433221100";

/// A pipeline over three fresh `mem://` buckets; buckets are emptied when
/// the rig drops so tests stay independent.
pub struct MemPipeline {
    pub config: PipelineConfig,
    pub source: MemoryStore,
    pub destination: MemoryStore,
    pub state: MemoryStore,
    buckets: [String; 3],
}

impl MemPipeline {
    pub fn new(transforms: Vec<TransformSpec>) -> Self {
        let id = Uuid::new_v4();
        let buckets = [
            format!("e2e-src-{id}"),
            format!("e2e-dst-{id}"),
            format!("e2e-state-{id}"),
        ];
        let config = PipelineConfig::new(
            mem_location(&buckets[0]),
            mem_location(&buckets[1]),
            mem_location(&buckets[2]),
            transforms,
        );
        Self {
            source: MemoryStore::new(&buckets[0]),
            destination: MemoryStore::new(&buckets[1]),
            state: MemoryStore::new(&buckets[2]),
            config,
            buckets,
        }
    }
}

impl Drop for MemPipeline {
    fn drop(&mut self) {
        for bucket in &self.buckets {
            MemoryStore::clear(bucket);
        }
    }
}

/// A pipeline over `file://` subdirectories of one temp dir.
pub struct FsPipeline {
    pub config: PipelineConfig,
    root: tempfile::TempDir,
}

impl FsPipeline {
    pub fn new(transforms: Vec<TransformSpec>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let location = |name: &str| {
            Location::parse(&format!("file://{}", root.path().join(name).display())).unwrap()
        };
        let config = PipelineConfig::new(
            location("src"),
            location("dst"),
            location("state"),
            transforms,
        );
        Self { config, root }
    }

    pub fn source(&self) -> LocalFsStore {
        LocalFsStore::new(self.root.path().join("src"))
    }

    pub fn destination(&self) -> LocalFsStore {
        LocalFsStore::new(self.root.path().join("dst"))
    }

    pub fn state(&self) -> LocalFsStore {
        LocalFsStore::new(self.root.path().join("state"))
    }

    pub fn destination_dir(&self) -> std::path::PathBuf {
        self.root.path().join("dst")
    }
}

pub fn mem_location(bucket: &str) -> Location {
    Location::parse(&format!("mem://{bucket}")).unwrap()
}

pub fn body(index: usize) -> Vec<u8> {
    format!("object {index} line one\nobject {index} line two\n")
        .repeat(index % 3 + 1)
        .into_bytes()
}

pub async fn seed(store: &dyn ObjectStore, count: usize) {
    for index in 0..count {
        write_all(
            store,
            &format!("obj-{index:03}"),
            Bytes::from(body(index)),
        )
        .await
        .unwrap();
    }
}

pub async fn names(store: &dyn ObjectStore) -> Vec<String> {
    store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|meta| meta.name)
        .collect()
}

pub async fn contents(store: &dyn ObjectStore, name: &str) -> Vec<u8> {
    read_all(store, name).await.unwrap().to_vec()
}

pub async fn modified_times(store: &dyn ObjectStore) -> Vec<(String, SystemTime)> {
    store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|meta| (meta.name, meta.modified.unwrap()))
        .collect()
}

pub fn options(parallelism: usize, batch_size: usize) -> RunOptions {
    RunOptions {
        parallelism,
        batch_size,
        op_timeout: Duration::from_secs(5),
        ..RunOptions::default()
    }
}

/// Runs the pipeline to completion, panicking on failure.
pub async fn run(config: &PipelineConfig, options: RunOptions) -> RunSummary {
    run_pipeline_loop(&StoreRegistry::with_defaults(), config.clone(), options)
        .await
        .unwrap()
}

/// Mem-store mtimes only tick when a writer finishes; spacing runs out by a
/// few milliseconds makes "unchanged" and "rewritten" distinguishable.
pub async fn let_clock_tick() {
    tokio::time::sleep(Duration::from_millis(15)).await;
}
