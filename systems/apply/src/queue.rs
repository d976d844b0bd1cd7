//! Process-wide operation store and async lifecycle (C5)
//!
//! Submission returns an operation id immediately; status is read by
//! polling or by the waiter, which suspends on a version channel until the
//! record turns terminal or the caller's timeout expires. Terminal records
//! are retained for a TTL and then swept.

use std::collections::HashMap;
use std::time::Duration;

use archihub_core_types::{Handle, HubError, HubResult, OperationId, Shared, handle, shared};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::operation::{ChangeOutcome, OperationRecord, OperationStatus};

/// Default retention of terminal operation records
pub const DEFAULT_OP_TTL: Duration = Duration::from_secs(15 * 60);

/// Interval of the background eviction sweep
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cached result of one executed chunk, keyed by its idempotency sub-key
#[derive(Debug, Clone)]
pub struct ChunkReplay {
    pub outcomes: Vec<ChangeOutcome>,
    pub temp_ids: IndexMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

pub struct OperationStore {
    ops: Shared<HashMap<OperationId, OperationRecord>>,
    by_key: Shared<HashMap<String, OperationId>>,
    chunk_cache: Shared<HashMap<String, ChunkReplay>>,
    version_tx: watch::Sender<u64>,
    ttl: chrono::Duration,
}

impl OperationStore {
    pub fn new(ttl: Duration) -> Handle<Self> {
        let (version_tx, _) = watch::channel(0);
        handle(Self {
            ops: shared(HashMap::new()),
            by_key: shared(HashMap::new()),
            chunk_cache: shared(HashMap::new()),
            version_tx,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(15)),
        })
    }

    fn bump(&self) {
        self.version_tx.send_modify(|v| *v += 1);
    }

    /// Register a fresh record; indexes its idempotency key when present
    pub async fn insert(&self, record: OperationRecord) {
        if let Some(key) = &record.idempotency_key {
            self.by_key
                .write()
                .await
                .insert(key.clone(), record.id.clone());
        }
        debug!(op = %record.id, "operation queued");
        self.ops.write().await.insert(record.id.clone(), record);
        self.bump();
    }

    /// Prior operation registered under the idempotency key, if retained
    pub async fn find_by_key(&self, key: &str) -> Option<OperationRecord> {
        let id = self.by_key.read().await.get(key).cloned()?;
        self.ops.read().await.get(&id).cloned()
    }

    pub async fn get(&self, id: &OperationId) -> Option<OperationRecord> {
        self.ops.read().await.get(id).cloned()
    }

    /// Apply `f` to the record and wake waiters
    pub async fn update(
        &self,
        id: &OperationId,
        f: impl FnOnce(&mut OperationRecord),
    ) -> HubResult<()> {
        let mut ops = self.ops.write().await;
        let record = ops
            .get_mut(id)
            .ok_or_else(|| HubError::NotFound(format!("operation {id}")))?;
        f(record);
        if record.status.is_terminal() && record.expires_at.is_none() {
            record.expires_at = Some(Utc::now() + self.ttl);
        }
        drop(ops);
        self.bump();
        Ok(())
    }

    /// Most recent operations first
    pub async fn list(&self, limit: usize) -> Vec<OperationRecord> {
        let ops = self.ops.read().await;
        let mut all: Vec<OperationRecord> = ops.values().cloned().collect();
        all.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        all.truncate(limit);
        all
    }

    /// Block until the operation is terminal or `timeout` passes. On
    /// timeout the current non-terminal record is returned unchanged.
    pub async fn wait(&self, id: &OperationId, timeout: Duration) -> HubResult<OperationRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut version_rx = self.version_tx.subscribe();
        loop {
            let record = self
                .get(id)
                .await
                .ok_or_else(|| HubError::NotFound(format!("operation {id}")))?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if tokio::time::timeout_at(deadline, version_rx.changed())
                .await
                .is_err()
            {
                // Non-destructive: execution continues, the caller just
                // gets the current state back
                return Ok(record);
            }
        }
    }

    // --- chunk replay cache ----------------------------------------------

    pub async fn cache_chunk(&self, sub_key: String, replay: ChunkReplay) {
        self.chunk_cache.write().await.insert(sub_key, replay);
    }

    pub async fn cached_chunk(&self, sub_key: &str) -> Option<ChunkReplay> {
        self.chunk_cache.read().await.get(sub_key).cloned()
    }

    // --- eviction ---------------------------------------------------------

    /// Drop expired terminal records and stale chunk replays
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut freed_keys = Vec::new();
        let expired: Vec<OperationId> = {
            let mut ops = self.ops.write().await;
            let expired: Vec<OperationId> = ops
                .values()
                .filter(|r| r.status.is_terminal() && r.expires_at.is_some_and(|at| at <= now))
                .map(|r| r.id.clone())
                .collect();
            for id in &expired {
                if let Some(record) = ops.remove(id) {
                    if let Some(key) = record.idempotency_key {
                        freed_keys.push(key);
                    }
                }
            }
            expired
        };
        if !freed_keys.is_empty() {
            let mut by_key = self.by_key.write().await;
            for key in freed_keys {
                by_key.remove(&key);
            }
        }
        self.chunk_cache
            .write()
            .await
            .retain(|_, replay| replay.expires_at > now);
        if !expired.is_empty() {
            info!(evicted = expired.len(), "operation records swept");
        }
        expired.len()
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

/// Background eviction loop; runs for the life of the process
pub fn spawn_sweeper(store: Handle<OperationStore>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let evicted = store.sweep().await;
            if evicted > 0 {
                warn!(evicted, "expired operations evicted");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: Option<&str>) -> OperationRecord {
        OperationRecord::new(None, key.map(str::to_string), "hash".into(), 1, &[])
    }

    #[tokio::test]
    async fn idempotency_key_indexes_the_record() {
        let store = OperationStore::new(DEFAULT_OP_TTL);
        let r = record(Some("K1"));
        let id = r.id.clone();
        store.insert(r).await;
        assert_eq!(store.find_by_key("K1").await.unwrap().id, id);
        assert!(store.find_by_key("K2").await.is_none());
    }

    #[tokio::test]
    async fn wait_returns_once_terminal() {
        let store = OperationStore::new(DEFAULT_OP_TTL);
        let r = record(None);
        let id = r.id.clone();
        store.insert(r).await;

        let waiter = {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move { store.wait(&id, Duration::from_secs(5)).await })
        };
        store
            .update(&id, |r| {
                r.status = OperationStatus::Complete;
                r.push_event("complete", None);
            })
            .await
            .unwrap();
        let record = waiter.await.unwrap().unwrap();
        assert_eq!(record.status, OperationStatus::Complete);
    }

    #[tokio::test]
    async fn wait_times_out_non_destructively() {
        let store = OperationStore::new(DEFAULT_OP_TTL);
        let r = record(None);
        let id = r.id.clone();
        store.insert(r).await;

        let record = store.wait(&id, Duration::from_millis(20)).await.unwrap();
        assert_eq!(record.status, OperationStatus::Queued);
        assert!(store.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn sweep_evicts_only_expired_terminal_records() {
        let store = OperationStore::new(Duration::from_secs(0));
        let terminal = record(Some("done"));
        let terminal_id = terminal.id.clone();
        let running = record(None);
        let running_id = running.id.clone();
        store.insert(terminal).await;
        store.insert(running).await;

        store
            .update(&terminal_id, |r| r.status = OperationStatus::Complete)
            .await
            .unwrap();
        let evicted = store.sweep().await;
        assert_eq!(evicted, 1);
        assert!(store.get(&terminal_id).await.is_none());
        assert!(store.find_by_key("done").await.is_none());
        assert!(store.get(&running_id).await.is_some());
    }
}
