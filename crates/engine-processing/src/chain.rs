use std::sync::Arc;

use model::transform::TransformSpec;
use storage::{ObjectReader, ObjectWriter};
use tracing::debug;

use crate::error::{ChainError, TransformError};
use crate::pipe::{PIPE_DEPTH, pipe};
use crate::transform::{StageInput, StageOutput, StageStats, Transform, build_chain};

/// Per-stage byte counts for one object, in chain order.
#[derive(Clone, Debug, Default)]
pub struct ChainStats {
    pub stages: Vec<StageStats>,
}

impl ChainStats {
    /// Bytes pulled from the source object.
    pub fn bytes_read(&self) -> u64 {
        self.stages.first().map(|s| s.bytes_in).unwrap_or(0)
    }

    /// Bytes committed to the destination object.
    pub fn bytes_written(&self) -> u64 {
        self.stages.last().map(|s| s.bytes_out).unwrap_or(0)
    }
}

/// A validated sequence of transforms. Built once per run and shared by
/// every object; [`TransformChain::run`] moves one object through it.
#[derive(Debug)]
pub struct TransformChain {
    stages: Vec<Arc<dyn Transform>>,
}

impl TransformChain {
    /// Instantiates every stage up front so configuration mistakes surface
    /// before the first object is opened.
    pub fn build(specs: &[TransformSpec]) -> Result<Self, TransformError> {
        Ok(Self { stages: build_chain(specs)? })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Streams one object from `source` through every stage into
    /// `destination`. Stages run as concurrent tasks joined by bounded
    /// pipes, so memory stays capped regardless of object size.
    ///
    /// The destination is committed only when the last stage finishes its
    /// writer; any stage failure unwinds the others through their pipes
    /// and the object is left unwritten.
    pub async fn run(
        &self,
        source: Box<dyn ObjectReader>,
        destination: Box<dyn ObjectWriter>,
    ) -> Result<ChainStats, ChainError> {
        let mut inputs = Vec::with_capacity(self.stages.len());
        let mut outputs = Vec::with_capacity(self.stages.len());

        inputs.push(StageInput::Store(source));
        for _ in 1..self.stages.len() {
            let (tx, rx) = pipe(PIPE_DEPTH);
            outputs.push(StageOutput::Pipe(tx));
            inputs.push(StageInput::Pipe(rx));
        }
        outputs.push(StageOutput::Store(destination));

        let handles: Vec<_> = self
            .stages
            .iter()
            .cloned()
            .zip(inputs)
            .zip(outputs)
            .map(|((stage, mut input), mut output)| {
                let name = stage.name();
                let task = tokio::spawn(async move {
                    let stats = stage.apply(&mut input, &mut output).await?;
                    // A stage that errored above never reaches this, so its
                    // output is dropped unfinished and the rest of the
                    // chain unwinds instead of committing partial data.
                    output.finish().await?;
                    Ok::<StageStats, TransformError>(stats)
                });
                (name, task)
            })
            .collect();

        let mut stats = ChainStats::default();
        let mut failure: Option<TransformError> = None;
        let mut join_failure: Option<ChainError> = None;
        let mut disconnect: Option<TransformError> = None;

        for (name, task) in handles {
            match task.await {
                Ok(Ok(stage_stats)) => {
                    debug!(
                        stage = name,
                        bytes_in = stage_stats.bytes_in,
                        bytes_out = stage_stats.bytes_out,
                        "Stage completed."
                    );
                    stats.stages.push(stage_stats);
                }
                // Disconnects are downstream symptoms of another stage's
                // failure; keep the first real error for the caller.
                Ok(Err(e)) if e.is_pipe_disconnect() => {
                    if disconnect.is_none() {
                        disconnect = Some(e);
                    }
                }
                Ok(Err(e)) => {
                    debug!(stage = name, error = %e, "Stage failed.");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(join_err) => {
                    if join_failure.is_none() {
                        join_failure = Some(ChainError::Join(join_err));
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(ChainError::Transform(e));
        }
        if let Some(e) = join_failure {
            return Err(e);
        }
        if let Some(e) = disconnect {
            return Err(ChainError::Transform(e));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use storage::{MemoryStore, ObjectStore, read_all, write_all};
    use uuid::Uuid;

    const KEY: &str = "00112233445566778899aabbccddeeff";

    fn fresh_bucket() -> String {
        format!("chain-{}", Uuid::new_v4())
    }

    async fn run_chain(
        specs: &[TransformSpec],
        payload: &[u8],
    ) -> (Result<ChainStats, ChainError>, MemoryStore, String) {
        let src_bucket = fresh_bucket();
        let dst_bucket = fresh_bucket();
        let source = MemoryStore::new(&src_bucket);
        let destination = MemoryStore::new(&dst_bucket);
        write_all(&source, "obj", Bytes::copy_from_slice(payload))
            .await
            .unwrap();

        let chain = TransformChain::build(specs).unwrap();
        let reader = source.reader("obj").await.unwrap();
        let writer = destination.writer("obj").await.unwrap();
        let result = chain.run(reader, writer).await;

        MemoryStore::clear(&src_bucket);
        (result, destination, dst_bucket)
    }

    #[tokio::test]
    async fn single_identity_stage_copies_the_object() {
        let payload = vec![42u8; 70_000];
        let (result, destination, bucket) =
            run_chain(&[TransformSpec::Identity], &payload).await;

        let stats = result.unwrap();
        assert_eq!(stats.bytes_read(), payload.len() as u64);
        assert_eq!(stats.bytes_written(), payload.len() as u64);
        assert_eq!(&read_all(&destination, "obj").await.unwrap()[..], payload);
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn compress_decompress_chain_round_trips() {
        let payload = b"line of text\n".repeat(5_000);
        let specs = [
            TransformSpec::GzipCompress { level: None },
            TransformSpec::GzipDecompress,
        ];
        let (result, destination, bucket) = run_chain(&specs, &payload).await;

        let stats = result.unwrap();
        assert_eq!(stats.bytes_read(), payload.len() as u64);
        assert_eq!(stats.bytes_written(), payload.len() as u64);
        assert_eq!(&read_all(&destination, "obj").await.unwrap()[..], payload);
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn encrypt_decrypt_chain_round_trips() {
        let payload = b"confidential ledger".repeat(900);
        let specs = [
            TransformSpec::Encrypt { hex_key: KEY.to_string() },
            TransformSpec::Decrypt { hex_key: KEY.to_string() },
        ];
        let (result, destination, bucket) = run_chain(&specs, &payload).await;

        result.unwrap();
        assert_eq!(&read_all(&destination, "obj").await.unwrap()[..], payload);
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn three_stage_chain_applies_in_order() {
        let specs = [
            TransformSpec::Sed { script: "s/cat/dog/g".to_string() },
            TransformSpec::GzipCompress { level: None },
            TransformSpec::GzipDecompress,
        ];
        let (result, destination, bucket) =
            run_chain(&specs, b"cat chases cat\n").await;

        result.unwrap();
        assert_eq!(
            &read_all(&destination, "obj").await.unwrap()[..],
            b"dog chases dog\n"
        );
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn failed_stage_reports_its_error_and_writes_nothing() {
        // Decompressing plain text fails mid-chain; the reported error must
        // be the gzip failure, not the downstream pipe disconnect.
        let specs = [
            TransformSpec::Identity,
            TransformSpec::GzipDecompress,
            TransformSpec::Identity,
        ];
        let (result, destination, bucket) =
            run_chain(&specs, b"this is not a gzip stream at all").await;

        match result {
            Err(ChainError::Transform(TransformError::Gzip(_))) => {}
            other => panic!("expected gzip failure, got {other:?}"),
        }
        assert!(destination.list().await.unwrap().is_empty());
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn empty_spec_list_is_rejected() {
        let err = TransformChain::build(&[]).unwrap_err();
        assert!(matches!(err, TransformError::EmptyChain));
    }
}
