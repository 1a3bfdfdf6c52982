use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use storage::{ObjectMeta, ObjectReader, ObjectStore, ObjectWriter, StorageError};

/// Bounds every operation of an inner store with one deadline, chunk reads
/// and writes included. A hung backend call then fails the enclosing batch
/// instead of wedging a worker loop forever.
#[derive(Debug)]
pub struct DeadlineStore {
    inner: Arc<dyn ObjectStore>,
    op_timeout: Duration,
}

impl DeadlineStore {
    pub fn new(inner: Arc<dyn ObjectStore>, op_timeout: Duration) -> Self {
        Self { inner, op_timeout }
    }
}

async fn bounded<T, F>(op: &'static str, timeout: Duration, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(format!(
            "{op} exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}

#[async_trait]
impl ObjectStore for DeadlineStore {
    async fn list(&self) -> Result<Vec<ObjectMeta>, StorageError> {
        bounded("list", self.op_timeout, self.inner.list()).await
    }

    async fn reader(&self, name: &str) -> Result<Box<dyn ObjectReader>, StorageError> {
        let inner = bounded("open reader", self.op_timeout, self.inner.reader(name)).await?;
        Ok(Box::new(DeadlineReader {
            inner,
            op_timeout: self.op_timeout,
        }))
    }

    async fn writer(&self, name: &str) -> Result<Box<dyn ObjectWriter>, StorageError> {
        let inner = bounded("open writer", self.op_timeout, self.inner.writer(name)).await?;
        Ok(Box::new(DeadlineWriter {
            inner,
            op_timeout: self.op_timeout,
        }))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        bounded("delete", self.op_timeout, self.inner.delete(name)).await
    }
}

#[derive(Debug)]
struct DeadlineReader {
    inner: Box<dyn ObjectReader>,
    op_timeout: Duration,
}

#[async_trait]
impl ObjectReader for DeadlineReader {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StorageError> {
        bounded("read chunk", self.op_timeout, self.inner.next_chunk()).await
    }
}

struct DeadlineWriter {
    inner: Box<dyn ObjectWriter>,
    op_timeout: Duration,
}

#[async_trait]
impl ObjectWriter for DeadlineWriter {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        bounded("write chunk", self.op_timeout, self.inner.write_chunk(chunk)).await
    }

    async fn finish(self: Box<Self>) -> Result<(), StorageError> {
        bounded("finish writer", self.op_timeout, self.inner.finish()).await
    }
}
