use crate::error::StorageError;
use crate::object_store::{CHUNK_SIZE, ObjectMeta, ObjectReader, ObjectStore, ObjectWriter};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Clone)]
struct StoredObject {
    bytes: Bytes,
    modified: SystemTime,
}

type Bucket = BTreeMap<String, StoredObject>;

lazy_static! {
    // Process-wide so every handle opened for the same bucket name sees the
    // same objects, the way independent worker loops see one real bucket.
    static ref BUCKETS: Mutex<HashMap<String, Bucket>> = Mutex::new(HashMap::new());
}

fn lock_buckets() -> Result<std::sync::MutexGuard<'static, HashMap<String, Bucket>>, StorageError> {
    BUCKETS
        .lock()
        .map_err(|_| StorageError::Lock("memory store mutex poisoned".into()))
}

/// In-memory object store, shared across the process by bucket name.
/// Backs `mem://` locations; tests lean on it for multi-handle scenarios.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    bucket: String,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    /// Drops every object in a bucket. Test hygiene.
    pub fn clear(bucket: &str) {
        if let Ok(mut buckets) = BUCKETS.lock() {
            buckets.remove(bucket);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self) -> Result<Vec<ObjectMeta>, StorageError> {
        let buckets = lock_buckets()?;
        let Some(bucket) = buckets.get(&self.bucket) else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .iter()
            .map(|(name, obj)| ObjectMeta {
                name: name.clone(),
                size: obj.bytes.len() as u64,
                modified: Some(obj.modified),
            })
            .collect())
    }

    async fn reader(&self, name: &str) -> Result<Box<dyn ObjectReader>, StorageError> {
        let buckets = lock_buckets()?;
        let object = buckets
            .get(&self.bucket)
            .and_then(|bucket| bucket.get(name))
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(Box::new(MemReader {
            remaining: object.bytes.clone(),
        }))
    }

    async fn writer(&self, name: &str) -> Result<Box<dyn ObjectWriter>, StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(Box::new(MemWriter {
            bucket: self.bucket.clone(),
            name: name.to_string(),
            buf: BytesMut::new(),
        }))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut buckets = lock_buckets()?;
        if let Some(bucket) = buckets.get_mut(&self.bucket) {
            bucket.remove(name);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MemReader {
    remaining: Bytes,
}

#[async_trait]
impl ObjectReader for MemReader {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StorageError> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        let take = self.remaining.len().min(CHUNK_SIZE);
        Ok(Some(self.remaining.split_to(take)))
    }
}

struct MemWriter {
    bucket: String,
    name: String,
    buf: BytesMut,
}

#[async_trait]
impl ObjectWriter for MemWriter {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<(), StorageError> {
        let mut buckets = lock_buckets()?;
        buckets.entry(self.bucket).or_default().insert(
            self.name,
            StoredObject {
                bytes: self.buf.freeze(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }
}
