use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder};
use model::transform::DEFAULT_GZIP_LEVEL;

use crate::error::TransformError;
use crate::transform::{StageInput, StageOutput, StageStats, Transform};

/// Gzip-compresses the stream. The level defaults to the package-wide
/// default when the configuration leaves it out.
#[derive(Debug)]
pub struct GzipCompress {
    level: Compression,
}

impl GzipCompress {
    pub fn new(level: Option<u32>) -> Result<Self, TransformError> {
        let level = level.unwrap_or(DEFAULT_GZIP_LEVEL);
        if level > 9 {
            return Err(TransformError::InvalidConfig(format!(
                "gzip level must be between 0 and 9, got {level}"
            )));
        }
        Ok(Self { level: Compression::new(level) })
    }
}

/// Drains whatever the codec has produced so far and forwards it, so
/// compressed output streams out instead of pooling in memory.
async fn flush_buffer(
    buffer: &mut Vec<u8>,
    stats: &mut StageStats,
    output: &mut StageOutput,
) -> Result<(), TransformError> {
    if buffer.is_empty() {
        return Ok(());
    }
    let produced = std::mem::take(buffer);
    stats.bytes_out += produced.len() as u64;
    output.put_chunk(Bytes::from(produced)).await
}

#[async_trait]
impl Transform for GzipCompress {
    fn name(&self) -> &'static str {
        "gzip_compress"
    }

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError> {
        let mut stats = StageStats::default();
        let mut encoder = GzEncoder::new(Vec::new(), self.level);

        while let Some(chunk) = input.next_chunk().await? {
            stats.bytes_in += chunk.len() as u64;
            encoder
                .write_all(&chunk)
                .map_err(|e| TransformError::Gzip(e.to_string()))?;
            flush_buffer(encoder.get_mut(), &mut stats, output).await?;
        }

        let tail = encoder
            .finish()
            .map_err(|e| TransformError::Gzip(e.to_string()))?;
        if !tail.is_empty() {
            stats.bytes_out += tail.len() as u64;
            output.put_chunk(Bytes::from(tail)).await?;
        }
        Ok(stats)
    }
}

/// Inverse of [`GzipCompress`]. Fails on streams that are not gzip or that
/// end before the gzip trailer.
#[derive(Debug)]
pub struct GzipDecompress;

#[async_trait]
impl Transform for GzipDecompress {
    fn name(&self) -> &'static str {
        "gzip_decompress"
    }

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError> {
        let mut stats = StageStats::default();
        let mut decoder = GzDecoder::new(Vec::new());

        while let Some(chunk) = input.next_chunk().await? {
            stats.bytes_in += chunk.len() as u64;
            decoder
                .write_all(&chunk)
                .map_err(|e| TransformError::Gzip(e.to_string()))?;
            flush_buffer(decoder.get_mut(), &mut stats, output).await?;
        }

        // finish() is what notices a stream cut off before the trailer.
        let tail = decoder
            .finish()
            .map_err(|e| TransformError::Gzip(e.to_string()))?;
        if !tail.is_empty() {
            stats.bytes_out += tail.len() as u64;
            output.put_chunk(Bytes::from(tail)).await?;
        }
        Ok(stats)
    }
}
