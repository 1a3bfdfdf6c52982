use crate::{location::Location, transform::TransformSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Backend-specific options keyed by scheme, e.g.
/// `{ "s3": { "region": "eu-west-1" } }`. Handed untouched to the provider
/// factory for that scheme.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageOptions(BTreeMap<String, serde_json::Value>);

impl StorageOptions {
    pub fn for_scheme(&self, scheme: &str) -> Option<&serde_json::Value> {
        self.0.get(scheme)
    }

    pub fn insert(&mut self, scheme: impl Into<String>, options: serde_json::Value) {
        self.0.insert(scheme.into(), options);
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything one run needs to know. Parsed from the config document once,
/// then shared read-only by every worker loop; the only interior mutation is
/// the lazily computed configuration hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: Location,
    pub destination: Location,
    /// Where progress snapshots live. May be shared with unrelated pipelines;
    /// snapshot names are prefixed with the configuration hash to keep them
    /// apart. Deliberately not part of the hash, so relocating state does not
    /// orphan progress recorded elsewhere.
    pub state: Location,
    /// Appended to every destination object name. Empty means none.
    #[serde(default)]
    pub name_suffix: String,
    /// Trimmed from the end of the source name before `name_suffix` goes on,
    /// so `report.gz` can become `report.txt` across a decompress chain.
    #[serde(default)]
    pub strip_suffix: String,
    pub transforms: Vec<TransformSpec>,
    #[serde(default)]
    pub storage: StorageOptions,
    #[serde(skip)]
    hash: OnceLock<String>,
}

impl PipelineConfig {
    pub fn new(
        source: Location,
        destination: Location,
        state: Location,
        transforms: Vec<TransformSpec>,
    ) -> Self {
        Self {
            source,
            destination,
            state,
            name_suffix: String::new(),
            strip_suffix: String::new(),
            transforms,
            storage: StorageOptions::default(),
            hash: OnceLock::new(),
        }
    }

    /// Stable 16-hex-char identity of this pipeline: source, destination,
    /// both suffixes, and the transform list with arguments. Pipelines that
    /// differ only in a key or level get distinct state; the state location
    /// itself is excluded.
    pub fn hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(self.source.to_string().as_bytes());
            hasher.update(&[0]);
            hasher.update(self.destination.to_string().as_bytes());
            hasher.update(&[0]);
            hasher.update(self.name_suffix.as_bytes());
            hasher.update(&[0]);
            hasher.update(self.strip_suffix.as_bytes());
            hasher.update(&[0]);
            for spec in &self.transforms {
                spec.hash_into(&mut hasher);
            }
            hasher.finalize().to_hex()[..16].to_string()
        })
    }

    /// Destination object name for a source object name.
    pub fn destination_name(&self, source_name: &str) -> String {
        let base = source_name
            .strip_suffix(self.strip_suffix.as_str())
            .unwrap_or(source_name);
        format!("{base}{}", self.name_suffix)
    }
}

impl Clone for PipelineConfig {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            destination: self.destination.clone(),
            state: self.state.clone(),
            name_suffix: self.name_suffix.clone(),
            strip_suffix: self.strip_suffix.clone(),
            transforms: self.transforms.clone(),
            storage: self.storage.clone(),
            hash: OnceLock::new(),
        }
    }
}
