pub mod crypt;
pub mod gzip;
pub mod identity;
pub mod sed;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use model::transform::TransformSpec;
use storage::{ObjectReader, ObjectWriter};

use crate::error::TransformError;
use crate::pipe::{PipeReader, PipeWriter};

/// Byte counts for one stage over one object.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// One stage of a transform chain. A transform pulls chunks from its input,
/// pushes derived chunks to its output, and reports how many bytes crossed
/// each side. Implementations must forward every input byte's effect before
/// returning; the chain finalizes the output afterwards.
#[async_trait]
pub trait Transform: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError>;
}

/// Where a stage reads from: the source object for the first stage, the
/// previous stage's pipe for every other.
pub enum StageInput {
    Store(Box<dyn ObjectReader>),
    Pipe(PipeReader),
}

impl StageInput {
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransformError> {
        match self {
            StageInput::Store(reader) => Ok(reader.next_chunk().await?),
            StageInput::Pipe(reader) => Ok(reader.recv().await?),
        }
    }
}

/// Where a stage writes to: the next stage's pipe, or the destination
/// object for the last stage.
pub enum StageOutput {
    Store(Box<dyn ObjectWriter>),
    Pipe(PipeWriter),
}

impl StageOutput {
    pub async fn put_chunk(&mut self, chunk: Bytes) -> Result<(), TransformError> {
        match self {
            StageOutput::Store(writer) => Ok(writer.write_chunk(chunk).await?),
            StageOutput::Pipe(writer) => Ok(writer.send(chunk).await?),
        }
    }

    /// Completes the stream. For a store-backed output this is the commit
    /// point that makes the destination object visible; for a pipe it is
    /// the clean end-of-stream marker. An output that is dropped instead
    /// of finished aborts the object.
    pub async fn finish(self) -> Result<(), TransformError> {
        match self {
            StageOutput::Store(writer) => Ok(writer.finish().await?),
            StageOutput::Pipe(writer) => Ok(writer.close().await?),
        }
    }
}

/// Instantiates one transform from its configuration, validating arguments
/// up front so a bad chain fails before any object is touched.
pub fn build(spec: &TransformSpec) -> Result<Arc<dyn Transform>, TransformError> {
    match spec {
        TransformSpec::Identity => Ok(Arc::new(identity::Identity)),
        TransformSpec::GzipCompress { level } => {
            Ok(Arc::new(gzip::GzipCompress::new(*level)?))
        }
        TransformSpec::GzipDecompress => Ok(Arc::new(gzip::GzipDecompress)),
        TransformSpec::Encrypt { hex_key } => Ok(Arc::new(crypt::Encrypt::new(hex_key)?)),
        TransformSpec::Decrypt { hex_key } => Ok(Arc::new(crypt::Decrypt::new(hex_key)?)),
        TransformSpec::Sed { script } => Ok(Arc::new(sed::Sed::new(script)?)),
    }
}

pub fn build_chain(specs: &[TransformSpec]) -> Result<Vec<Arc<dyn Transform>>, TransformError> {
    if specs.is_empty() {
        return Err(TransformError::EmptyChain);
    }
    specs.iter().map(build).collect()
}
