use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Chunks buffered per pipe. Together with the chunk size this caps what a
/// single object can hold in flight between two stages.
pub const PIPE_DEPTH: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Pipe closed by the other end")]
pub struct PipeClosed;

enum Frame {
    Chunk(Bytes),
    End,
}

/// Bounded in-memory pipe between two chain stages. The writer suspends on
/// send once the buffer is full; the reader suspends until data arrives.
///
/// End-of-stream is explicit: a writer that calls [`PipeWriter::close`]
/// produced a complete stream, while one that is merely dropped aborted
/// mid-stream, and the reader sees an error instead of a clean end. That
/// distinction is what keeps a failed upstream stage from letting its
/// downstream finalize a truncated object.
pub fn pipe(depth: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (PipeWriter { tx }, PipeReader { rx, ended: false })
}

pub struct PipeWriter {
    tx: mpsc::Sender<Frame>,
}

impl PipeWriter {
    /// Hands one chunk downstream, waiting while the pipe is full. Fails
    /// when the reader is gone, which is how a failed downstream stage
    /// unwinds its upstream.
    pub async fn send(&self, chunk: Bytes) -> Result<(), PipeClosed> {
        self.tx.send(Frame::Chunk(chunk)).await.map_err(|_| PipeClosed)
    }

    /// Marks the stream complete. A reader that never sees this treats the
    /// stream as aborted.
    pub async fn close(self) -> Result<(), PipeClosed> {
        self.tx.send(Frame::End).await.map_err(|_| PipeClosed)
    }
}

pub struct PipeReader {
    rx: mpsc::Receiver<Frame>,
    ended: bool,
}

impl PipeReader {
    /// Next chunk, `Ok(None)` at a clean end of stream, or an error when
    /// the writer vanished without closing.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, PipeClosed> {
        if self.ended {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Frame::Chunk(chunk)) => Ok(Some(chunk)),
            Some(Frame::End) => {
                self.ended = true;
                Ok(None)
            }
            None => Err(PipeClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_chunks_in_order_then_clean_end() {
        let (tx, mut rx) = pipe(2);
        let producer = tokio::spawn(async move {
            for i in 0u8..5 {
                tx.send(Bytes::from(vec![i])).await.unwrap();
            }
            tx.close().await.unwrap();
        });

        let mut seen = Vec::new();
        while let Some(chunk) = rx.recv().await.unwrap() {
            seen.extend_from_slice(&chunk);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        // End is sticky.
        assert_eq!(rx.recv().await, Ok(None));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_writer_reads_as_abort() {
        let (tx, mut rx) = pipe(4);
        tx.send(Bytes::from_static(b"partial")).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Ok(Some(Bytes::from_static(b"partial"))));
        assert_eq!(rx.recv().await, Err(PipeClosed));
    }

    #[tokio::test]
    async fn dropped_reader_unblocks_a_full_writer() {
        let (tx, rx) = pipe(1);
        tx.send(Bytes::from_static(b"fills the pipe")).await.unwrap();

        let blocked = tokio::spawn(async move {
            // Pipe is full; this parks until the reader goes away.
            tx.send(Bytes::from_static(b"never arrives")).await
        });

        drop(rx);
        assert_eq!(blocked.await.unwrap(), Err(PipeClosed));
    }
}
