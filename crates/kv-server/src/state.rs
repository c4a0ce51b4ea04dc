//! Shared server state, cloned (cheaply, via `Arc`) into every axum handler.

use std::sync::Arc;

use kv_engine::Engine;
use kv_replication::ReplicationManager;

#[derive(Clone)]
pub struct AppState {
    pub node_id: u64,
    pub engine: Arc<Engine>,
    pub replication: Arc<ReplicationManager>,
    pub shutdown: Arc<tokio::sync::Notify>,
}

impl AppState {
    /// Returns an error naming the currently believed leader unless this
    /// node is the leader, following the ensure-leader gate every mutating
    /// client endpoint applies before touching the engine.
    pub async fn ensure_leader(&self) -> Result<(), crate::error::ApiError> {
        if self.replication.is_leader().await {
            Ok(())
        } else {
            Err(crate::error::ApiError::NotLeader {
                leader: self.replication.leader_id().await,
            })
        }
    }
}
