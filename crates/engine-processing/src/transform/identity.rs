use async_trait::async_trait;

use crate::error::TransformError;
use crate::transform::{StageInput, StageOutput, StageStats, Transform};

/// Passes chunks through unchanged.
#[derive(Debug)]
pub struct Identity;

#[async_trait]
impl Transform for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError> {
        let mut stats = StageStats::default();
        while let Some(chunk) = input.next_chunk().await? {
            stats.bytes_in += chunk.len() as u64;
            stats.bytes_out += chunk.len() as u64;
            output.put_chunk(chunk).await?;
        }
        Ok(stats)
    }
}
