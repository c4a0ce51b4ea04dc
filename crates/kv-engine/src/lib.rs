//! The key-value engine: an in-memory map backed by a write-ahead log and
//! periodic snapshots.
//!
//! All mutating operations (and `get`, for simplicity — reads are cheap
//! in-memory lookups) serialize through a single `tokio::sync::Mutex`, so
//! WAL order, apply order, and observed read order always agree.

pub mod error;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use kv_index::IndexManager;
use kv_storage::{SnapshotStore, Wal};
use kv_types::{Record, Value};
use rand::Rng;
use tokio::sync::Mutex;

pub use error::{EngineError, EngineResult};

struct EngineState {
    data: IndexMap<String, Value>,
    indexer: IndexManager,
}

impl EngineState {
    fn apply(&mut self, record: &Record) {
        match record {
            Record::Set { k, v } => {
                let old = self.data.insert(k.clone(), v.clone());
                self.indexer.update(k, v, old.as_ref());
            }
            Record::Del { k } => {
                if let Some(old) = self.data.shift_remove(k) {
                    self.indexer.remove(k, &old);
                }
            }
            Record::Bulk { data } => {
                for (k, v) in data {
                    let old = self.data.insert(k.clone(), v.clone());
                    self.indexer.update(k, v, old.as_ref());
                }
            }
        }
    }
}

/// Probability that a `debug_fail`-flagged write is rejected before it
/// touches the WAL, for exercising client/error handling paths.
const SIMULATED_FAILURE_PROBABILITY: f64 = 0.01;

pub struct Engine {
    state: Mutex<EngineState>,
    wal: Wal,
    snapshot_store: SnapshotStore,
}

/// Summary of what happened during crash recovery, logged by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryReport {
    pub snapshot_loaded: bool,
    pub wal_records_applied: u64,
    pub wal_records_corrupt: u64,
}

impl Engine {
    /// Opens (or creates) the data directory and recovers state: load the
    /// snapshot if present and decodable, then replay the WAL on top. If
    /// the snapshot fails to decode, recovery proceeds from an empty map
    /// and replays the WAL alone.
    pub async fn open(data_dir: impl AsRef<Path>) -> EngineResult<(Self, RecoveryReport)> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(kv_storage::StorageError::from)?;

        let wal = Wal::new(wal_path(data_dir));
        let snapshot_store = SnapshotStore::new(snapshot_path(data_dir));

        let loaded = snapshot_store.load().await?;
        let mut state = EngineState {
            data: loaded.clone().unwrap_or_default(),
            indexer: IndexManager::new(),
        };
        // Rebuild the derived indexes over whatever the snapshot restored;
        // the WAL replay below extends them with anything written since.
        for (k, v) in state.data.clone() {
            state.indexer.update(&k, &v, None);
        }

        let mut report = RecoveryReport {
            snapshot_loaded: loaded.is_some(),
            ..Default::default()
        };

        let replay = wal
            .replay(|record| state.apply(&record))
            .await?;
        report.wal_records_applied = replay.applied;
        report.wal_records_corrupt = replay.corrupt;

        if replay.corrupt > 0 {
            tracing::warn!(
                corrupt = replay.corrupt,
                "wal replay skipped corrupt trailing records"
            );
        }
        tracing::info!(
            snapshot_loaded = report.snapshot_loaded,
            applied = report.wal_records_applied,
            corrupt = report.wal_records_corrupt,
            "engine recovered"
        );

        Ok((
            Engine {
                state: Mutex::new(state),
                wal,
                snapshot_store,
            },
            report,
        ))
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state.data.get(key).cloned()
    }

    pub async fn set(&self, key: String, value: Value, debug_fail: bool) -> EngineResult<()> {
        self.maybe_simulate_failure(debug_fail)?;
        let record = Record::Set { k: key, v: value };
        let mut state = self.state.lock().await;
        self.wal.append(&record).await?;
        state.apply(&record);
        Ok(())
    }

    pub async fn delete(&self, key: String) -> EngineResult<()> {
        let record = Record::Del { k: key };
        let mut state = self.state.lock().await;
        self.wal.append(&record).await?;
        state.apply(&record);
        Ok(())
    }

    pub async fn bulk_set(&self, items: Vec<(String, Value)>, debug_fail: bool) -> EngineResult<()> {
        self.maybe_simulate_failure(debug_fail)?;
        let record = Record::bulk(items);
        let mut state = self.state.lock().await;
        self.wal.append(&record).await?;
        state.apply(&record);
        Ok(())
    }

    /// Applies a record received from a leader. Followers apply first and
    /// append to their own WAL second, matching the exact order the
    /// reference replication surface uses.
    pub async fn apply_external(&self, record: Record) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.apply(&record);
        self.wal.append(&record).await?;
        Ok(())
    }

    /// Snapshots the current map to disk and truncates the WAL, all while
    /// holding the engine's single-writer lock so no write is lost or
    /// duplicated across the cut.
    pub async fn snapshot(&self) -> EngineResult<()> {
        let state = self.state.lock().await;
        self.snapshot_store.snapshot(&state.data, &self.wal).await?;
        Ok(())
    }

    pub async fn search(&self, query: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state.indexer.search(query)
    }

    pub async fn vector_search(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        let state = self.state.lock().await;
        state.indexer.vector_search(query, top_k)
    }

    fn maybe_simulate_failure(&self, debug_fail: bool) -> EngineResult<()> {
        if debug_fail && rand::thread_rng().gen_bool(SIMULATED_FAILURE_PROBABILITY) {
            return Err(EngineError::SimulatedFailure);
        }
        Ok(())
    }
}

fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal.log")
}

fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join("db.snapshot")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _report) = Engine::open(dir.path()).await.unwrap();
        (dir, engine)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_dir, engine) = open_engine().await;
        engine
            .set("foo".into(), Value::String("bar".into()), false)
            .await
            .unwrap();
        assert_eq!(engine.get("foo").await, Some(Value::String("bar".into())));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let (_dir, engine) = open_engine().await;
        engine
            .set("foo".into(), Value::String("bar".into()), false)
            .await
            .unwrap();
        engine.delete("foo".into()).await.unwrap();
        assert_eq!(engine.get("foo").await, None);
    }

    #[tokio::test]
    async fn delete_on_absent_key_is_a_no_op() {
        let (_dir, engine) = open_engine().await;
        engine.delete("missing".into()).await.unwrap();
        assert_eq!(engine.get("missing").await, None);
    }

    #[tokio::test]
    async fn bulk_set_applies_all_pairs_in_order() {
        let (_dir, engine) = open_engine().await;
        engine
            .bulk_set(
                vec![
                    ("k1".into(), Value::String("v1".into())),
                    ("k2".into(), Value::String("v2".into())),
                ],
                false,
            )
            .await
            .unwrap();
        assert_eq!(engine.get("k1").await, Some(Value::String("v1".into())));
        assert_eq!(engine.get("k2").await, Some(Value::String("v2".into())));
    }

    #[tokio::test]
    async fn persists_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (engine, _report) = Engine::open(dir.path()).await.unwrap();
            engine
                .set("persist_key".into(), Value::String("persist_val".into()), false)
                .await
                .unwrap();
        }
        let (engine, report) = Engine::open(dir.path()).await.unwrap();
        assert_eq!(report.wal_records_applied, 1);
        assert_eq!(
            engine.get("persist_key").await,
            Some(Value::String("persist_val".into()))
        );
    }

    #[tokio::test]
    async fn snapshot_then_restart_preserves_state_and_resets_wal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (engine, _report) = Engine::open(dir.path()).await.unwrap();
            engine
                .set("k".into(), Value::String("v".into()), false)
                .await
                .unwrap();
            engine.snapshot().await.unwrap();
        }
        let (engine, report) = Engine::open(dir.path()).await.unwrap();
        assert!(report.snapshot_loaded);
        assert_eq!(report.wal_records_applied, 0);
        assert_eq!(engine.get("k").await, Some(Value::String("v".into())));
    }

    #[tokio::test]
    async fn apply_external_writes_to_local_wal_and_state() {
        let (_dir, engine) = open_engine().await;
        engine
            .apply_external(Record::Set {
                k: "replicated".into(),
                v: Value::Bool(true),
            })
            .await
            .unwrap();
        assert_eq!(engine.get("replicated").await, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn search_finds_string_values_by_word() {
        let (_dir, engine) = open_engine().await;
        engine
            .set("doc1".into(), Value::String("the quick brown fox".into()), false)
            .await
            .unwrap();
        assert_eq!(engine.search("quick").await, vec!["doc1".to_string()]);
    }
}
