use serde::Serialize;

/// What a finished run did, aggregated across every worker loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub objects_copied: u64,
    pub batches_completed: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl RunSummary {
    pub fn is_noop(&self) -> bool {
        self.objects_copied == 0
    }
}
