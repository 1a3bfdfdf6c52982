use crate::bitmap::Bitmap;
use crate::error::{BitmapError, ProgressError};
use bytes::Bytes;
use futures::StreamExt;
use std::ops::Range;
use storage::{ObjectStore, read_all, write_all};
use tracing::{info, warn};
use uuid::Uuid;

/// Objects per batch, i.e. per progress bit.
pub const BATCH_SIZE: usize = 16;

/// How many snapshot fetches run at once during a merge.
const MERGE_CONCURRENCY: usize = 8;

/// One worker's view of run progress: a bitmap with one bit per batch,
/// folded together from every snapshot peers have persisted for the same
/// configuration hash. Claiming is optimistic; two workers that pick the
/// same batch both process it, and idempotent overwrite makes that safe.
#[derive(Debug)]
pub struct ProgressState {
    config_hash: String,
    bitmap: Bitmap,
    total_objects: usize,
    batch_size: usize,
    worker_id: Option<String>,
    merged_snapshots: Vec<String>,
}

impl ProgressState {
    pub fn new(config_hash: impl Into<String>, total_objects: usize, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            config_hash: config_hash.into(),
            bitmap: Bitmap::new(total_objects.div_ceil(batch_size)),
            total_objects,
            batch_size,
            worker_id: None,
            merged_snapshots: Vec::new(),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.bitmap.size()
    }

    pub fn batches_done(&self) -> usize {
        self.bitmap.count_set()
    }

    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    pub fn merged_snapshot_count(&self) -> usize {
        self.merged_snapshots.len()
    }

    /// Picks a random unprocessed batch and returns its half-open object
    /// range. `None` means every batch is already done, which is the worker
    /// loop's termination signal. The first claim fixes this state's worker
    /// id, which only ever names the output snapshot.
    pub fn claim_range(&mut self) -> Option<Range<usize>> {
        let batch = self.bitmap.find_random_empty()?;
        if self.worker_id.is_none() {
            self.worker_id = Some(Uuid::new_v4().to_string());
        }
        let start = batch * self.batch_size;
        let end = ((batch + 1) * self.batch_size).min(self.total_objects);
        Some(start..end)
    }

    /// Records the batch holding `range_start` as processed. In-memory only;
    /// nothing is durable until [`ProgressState::write_merged`].
    pub fn mark_done(&mut self, range_start: usize) -> Result<(), BitmapError> {
        self.bitmap.set(range_start / self.batch_size)
    }

    fn snapshot_name(&self) -> Option<String> {
        let worker_id = self.worker_id.as_deref()?;
        Some(format!("{}_{}", self.config_hash, short_hash(worker_id)))
    }

    /// Lists the state location and folds every snapshot for `config_hash`
    /// into one fresh state. Snapshots that fail to fetch or decode are
    /// skipped (a peer may have deleted or be mid-write; the cost is
    /// duplicate work, never lost work). A snapshot whose bitmap size does
    /// not match is excluded with a warning and left in place.
    pub async fn read_merged(
        store: &dyn ObjectStore,
        config_hash: &str,
        total_objects: usize,
        batch_size: usize,
    ) -> Result<Self, ProgressError> {
        let mut state = Self::new(config_hash, total_objects, batch_size);
        let prefix = format!("{config_hash}_");

        let listed = store.list().await.map_err(ProgressError::List)?;
        let mut matching = Vec::new();
        for meta in listed {
            if meta.name.starts_with(&prefix) {
                matching.push(meta.name);
            } else {
                warn!(
                    object = %meta.name,
                    config_hash,
                    "Ignoring state object not matching configuration hash."
                );
            }
        }

        let fetched: Vec<(String, Result<Bytes, storage::StorageError>)> =
            futures::stream::iter(matching.into_iter().map(|name| async move {
                let bytes = read_all(store, &name).await;
                (name, bytes)
            }))
            .buffer_unordered(MERGE_CONCURRENCY)
            .collect()
            .await;

        for (name, result) in fetched {
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => {
                    // Deleted between list and fetch; whoever deleted it
                    // already folded its bits into a newer snapshot.
                    info!(snapshot = %name, "Progress snapshot vanished before fetch.");
                    continue;
                }
                Err(err) => {
                    info!(snapshot = %name, error = %err, "Could not fetch progress snapshot, skipping.");
                    continue;
                }
            };
            let bitmap = match Bitmap::from_bytes(&bytes) {
                Ok(bitmap) => bitmap,
                Err(err) => {
                    info!(snapshot = %name, error = %err, "Could not decode progress snapshot, skipping.");
                    continue;
                }
            };
            match state.bitmap.merge(&bitmap) {
                Ok(()) => state.merged_snapshots.push(name),
                Err(err) => {
                    // Excluded but not recorded for deletion; it stays put
                    // rather than wedging or silently vanishing.
                    warn!(snapshot = %name, error = %err, "Excluding progress snapshot with mismatched size.");
                }
            }
        }

        Ok(state)
    }

    /// Persists this state as a brand-new snapshot, then deletes the
    /// snapshots it merged from. Write-before-delete is the invariant that
    /// makes a crash here harmless: at worst, stale snapshots linger for the
    /// next reader to fold in again.
    pub async fn write_merged(&self, store: &dyn ObjectStore) -> Result<String, ProgressError> {
        let name = self.snapshot_name().ok_or(ProgressError::NoWorkerId)?;
        write_all(store, &name, Bytes::from(self.bitmap.to_bytes()))
            .await
            .map_err(|source| ProgressError::WriteSnapshot {
                name: name.clone(),
                source,
            })?;

        for merged in &self.merged_snapshots {
            if merged == &name {
                continue;
            }
            if let Err(err) = store.delete(merged).await {
                // A peer may have deleted it first; either way the bits are
                // safe in the snapshot written above.
                info!(snapshot = %merged, error = %err, "Could not delete merged snapshot.");
            }
        }
        Ok(name)
    }
}

fn short_hash(input: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(input.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStore;
    use uuid::Uuid;

    fn fresh_store() -> (MemoryStore, String) {
        let bucket = format!("progress-{}", Uuid::new_v4());
        (MemoryStore::new(&bucket), bucket)
    }

    #[test]
    fn claims_cover_everything_exactly_once() {
        let mut state = ProgressState::new("cfg", 10, 3);
        assert_eq!(state.batch_count(), 4);

        let mut seen = vec![false; 10];
        let mut claims = 0;
        while let Some(range) = state.claim_range() {
            claims += 1;
            assert!(claims <= 4, "claimed more batches than exist");
            for i in range.clone() {
                assert!(!seen[i], "object {i} claimed twice");
                seen[i] = true;
            }
            state.mark_done(range.start).unwrap();
        }
        assert_eq!(claims, 4);
        assert!(seen.into_iter().all(|done| done));
    }

    #[test]
    fn partial_tail_batch_stops_at_total() {
        let mut state = ProgressState::new("cfg", 10, 3);
        // Drain claims; exactly one of them must be the short tail 9..10.
        let mut tails = 0;
        while let Some(range) = state.claim_range() {
            if range == (9..10) {
                tails += 1;
            }
            assert!(range.end <= 10);
            state.mark_done(range.start).unwrap();
        }
        assert_eq!(tails, 1);
    }

    #[test]
    fn empty_source_claims_nothing() {
        let mut state = ProgressState::new("cfg", 0, 16);
        assert_eq!(state.batch_count(), 0);
        assert_eq!(state.claim_range(), None);
        assert!(state.worker_id().is_none());
    }

    #[test]
    fn worker_id_is_assigned_at_first_claim() {
        let mut state = ProgressState::new("cfg", 4, 2);
        assert!(state.worker_id().is_none());
        state.claim_range().unwrap();
        let id = state.worker_id().unwrap().to_string();
        state.claim_range().unwrap();
        assert_eq!(state.worker_id().unwrap(), id);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_store() {
        let (store, bucket) = fresh_store();

        let mut state = ProgressState::new("cfg", 10, 5);
        let range = state.claim_range().unwrap();
        state.mark_done(range.start).unwrap();
        let name = state.write_merged(&store).await.unwrap();
        assert!(name.starts_with("cfg_"));

        let merged = ProgressState::read_merged(&store, "cfg", 10, 5).await.unwrap();
        assert_eq!(merged.batches_done(), 1);
        assert_eq!(merged.merged_snapshot_count(), 1);
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn merge_compacts_peer_snapshots() {
        let (store, bucket) = fresh_store();

        // Two workers persist progress independently.
        for _ in 0..2 {
            let mut state = ProgressState::new("cfg", 20, 5);
            let range = state.claim_range().unwrap();
            state.mark_done(range.start).unwrap();
            state.write_merged(&store).await.unwrap();
        }

        let mut merged = ProgressState::read_merged(&store, "cfg", 20, 5).await.unwrap();
        // Both may have picked the same random batch.
        assert!(merged.batches_done() >= 1);
        let range = merged.claim_range().unwrap();
        merged.mark_done(range.start).unwrap();
        merged.write_merged(&store).await.unwrap();

        // Compaction: merged inputs removed, one combined snapshot remains.
        let remaining = store.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn foreign_objects_are_ignored_and_kept() {
        let (store, bucket) = fresh_store();
        write_all(&store, "otherhash_1234", Bytes::from_static(b"junk")).await.unwrap();
        write_all(&store, "README", Bytes::from_static(b"hello")).await.unwrap();

        let mut state = ProgressState::new("cfg", 4, 2);
        let range = state.claim_range().unwrap();
        state.mark_done(range.start).unwrap();
        state.write_merged(&store).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert!(names.contains(&"otherhash_1234".to_string()));
        assert!(names.contains(&"README".to_string()));
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn undecodable_snapshot_is_skipped_and_kept() {
        let (store, bucket) = fresh_store();
        write_all(&store, "cfg_garbage", Bytes::from_static(b"xx")).await.unwrap();

        let state = ProgressState::read_merged(&store, "cfg", 8, 4).await.unwrap();
        assert_eq!(state.batches_done(), 0);
        assert_eq!(state.merged_snapshot_count(), 0);

        // Still listed afterwards; skipped snapshots are never deleted.
        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert!(names.contains(&"cfg_garbage".to_string()));
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn size_mismatch_is_excluded_not_deleted() {
        let (store, bucket) = fresh_store();

        // Persisted when the source held a different object count.
        let mut stale = ProgressState::new("cfg", 40, 5);
        let range = stale.claim_range().unwrap();
        stale.mark_done(range.start).unwrap();
        let stale_name = stale.write_merged(&store).await.unwrap();

        let mut state = ProgressState::read_merged(&store, "cfg", 10, 5).await.unwrap();
        assert_eq!(state.batches_done(), 0);
        assert_eq!(state.merged_snapshot_count(), 0);

        let range = state.claim_range().unwrap();
        state.mark_done(range.start).unwrap();
        state.write_merged(&store).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert!(names.contains(&stale_name), "mismatched snapshot must survive");
        assert_eq!(names.len(), 2);
        MemoryStore::clear(&bucket);
    }

    #[tokio::test]
    async fn refuses_to_write_before_any_claim() {
        let (store, bucket) = fresh_store();
        let state = ProgressState::new("cfg", 8, 4);
        assert!(matches!(
            state.write_merged(&store).await,
            Err(ProgressError::NoWorkerId)
        ));
        MemoryStore::clear(&bucket);
    }
}
