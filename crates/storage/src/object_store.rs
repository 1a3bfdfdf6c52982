use crate::error::StorageError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::SystemTime;

/// Read granularity for object streams. Pipes between transform stages carry
/// chunks of at most this size, so per-stage buffering stays bounded.
pub const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Chunked stream over one object's bytes.
#[async_trait]
pub trait ObjectReader: std::fmt::Debug + Send {
    /// Next chunk, or `None` once the object is exhausted. Chunks are at
    /// most [`CHUNK_SIZE`] bytes but may be shorter.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StorageError>;
}

/// Chunked writer for one object. Nothing is visible at the destination
/// until `finish` returns; a dropped writer leaves no partial object behind.
#[async_trait]
pub trait ObjectWriter: Send {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StorageError>;

    /// Makes the object durable and visible, all or nothing.
    async fn finish(self: Box<Self>) -> Result<(), StorageError>;
}

/// One location (a directory, a bucket) in some store backend. Object names
/// are flat within the location.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    /// All objects in this location. Ordering is the backend's business;
    /// callers that need a stable order sort the names themselves.
    async fn list(&self) -> Result<Vec<ObjectMeta>, StorageError>;

    async fn reader(&self, name: &str) -> Result<Box<dyn ObjectReader>, StorageError>;

    async fn writer(&self, name: &str) -> Result<Box<dyn ObjectWriter>, StorageError>;

    /// Deleting an object that is already gone counts as success; peers
    /// race on deletes and the loser must not fail.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// Drains a whole object into memory. Meant for small control objects such
/// as progress snapshots, not for data payloads.
pub async fn read_all(store: &dyn ObjectStore, name: &str) -> Result<Bytes, StorageError> {
    let mut reader = store.reader(name).await?;
    let mut buf = BytesMut::new();
    while let Some(chunk) = reader.next_chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Writes a whole in-memory buffer as one object and finalizes it.
pub async fn write_all(
    store: &dyn ObjectStore,
    name: &str,
    bytes: Bytes,
) -> Result<(), StorageError> {
    let mut writer = store.writer(name).await?;
    writer.write_chunk(bytes).await?;
    writer.finish().await
}
