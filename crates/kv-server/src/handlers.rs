//! HTTP handlers for the client surface (§6, client table) and the
//! internal peer surface (§6, internal table). This module only translates
//! between HTTP and the engine/replication APIs; no decision logic lives
//! here beyond the leadership gate.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use kv_replication::{HeartbeatRequest, ReplicateAck, ReplicateRequest, VoteRequest, VoteResponse};
use kv_types::Value;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetBody {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    pub items: Vec<(String, Value)>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DebugInfoResponse {
    pub node_id: u64,
    pub role: String,
    pub leader: Option<u64>,
    pub term: u64,
    pub peers: Vec<String>,
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "kv-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Requests graceful process shutdown; mirrors the reference server's
/// self-signal shutdown endpoint.
pub async fn shutdown(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.shutdown.notify_one();
    Json(json!({ "status": "shutting down" }))
}

pub async fn debug_info(State(state): State<AppState>) -> Json<DebugInfoResponse> {
    let role = format!("{:?}", state.replication.role().await).to_uppercase();
    Json(DebugInfoResponse {
        node_id: state.node_id,
        role,
        leader: state.replication.leader_id().await,
        term: state.replication.term().await,
        peers: state.replication.peers().to_vec(),
    })
}

pub async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ensure_leader().await?;
    match state.engine.get(&key).await {
        Some(value) => Ok(Json(json!({ "key": key, "value": value }))),
        None => Err(ApiError::NotFound),
    }
}

pub async fn set_key(
    State(state): State<AppState>,
    Json(body): Json<SetBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ensure_leader().await?;
    let record = kv_types::Record::Set {
        k: body.key.clone(),
        v: body.value.clone(),
    };
    state
        .engine
        .set(body.key.clone(), body.value, body.debug)
        .await?;
    state.replication.replicate_to_peers(record).await;
    Ok(Json(json!({ "status": "ok", "key": body.key })))
}

pub async fn delete_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ensure_leader().await?;
    let record = kv_types::Record::Del { k: key.clone() };
    // Unlike /set and /bulk, the client surface for delete never surfaces
    // a write failure as a 500 — it always reports ok, matching the
    // reference server's unconditional response.
    if let Err(e) = state.engine.delete(key.clone()).await {
        tracing::warn!(key = %key, error = %e, "delete failed but is not surfaced to the client");
    } else {
        state.replication.replicate_to_peers(record).await;
    }
    Ok(Json(json!({ "status": "ok", "key": key })))
}

pub async fn bulk_set(
    State(state): State<AppState>,
    Json(body): Json<BulkBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ensure_leader().await?;
    let record = kv_types::Record::bulk(body.items.clone());
    let count = body.items.len();
    state.engine.bulk_set(body.items, body.debug).await?;
    state.replication.replicate_to_peers(record).await;
    Ok(Json(json!({ "status": "ok", "count": count })))
}

pub async fn snapshot(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.snapshot().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn search(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let query = params.get("q").cloned().unwrap_or_default();
    let keys = state.engine.search(&query).await;
    Json(json!({ "keys": keys }))
}

pub async fn vector_search(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let query = params.get("q").cloned().unwrap_or_default();
    let top_k = params
        .get("top_k")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(5);
    let results = state.engine.vector_search(&query, top_k).await;
    Json(json!({ "results": results }))
}

// --- internal peer surface ---

pub async fn internal_heartbeat(
    State(state): State<AppState>,
    Json(body): Json<HeartbeatRequest>,
) -> Json<serde_json::Value> {
    state.replication.handle_heartbeat(body.term, body.leader_id).await;
    Json(json!({ "status": "ok" }))
}

pub async fn internal_vote(
    State(state): State<AppState>,
    Json(body): Json<VoteRequest>,
) -> Json<VoteResponse> {
    let response = state
        .replication
        .handle_vote_request(body.term, body.candidate_id)
        .await;
    Json(response)
}

pub async fn internal_replicate(
    State(state): State<AppState>,
    Json(body): Json<ReplicateRequest>,
) -> Result<Json<ReplicateAck>, ApiError> {
    state.engine.apply_external(body.record).await?;
    Ok(Json(ReplicateAck {
        status: "ack".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use kv_engine::Engine;
    use kv_replication::ReplicationConfig;
    use std::sync::Arc;

    async fn leader_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _report) = Engine::open(dir.path()).await.unwrap();
        let config = ReplicationConfig::builder().node_id(1).peers(vec![]).build().unwrap();
        AppState {
            node_id: 1,
            engine: Arc::new(engine),
            replication: Arc::new(kv_replication::ReplicationManager::new(config)),
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    async fn follower_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _report) = Engine::open(dir.path()).await.unwrap();
        let config = ReplicationConfig::builder()
            .node_id(1)
            .peers(vec!["http://peer:8000".to_string()])
            .build()
            .unwrap();
        AppState {
            node_id: 1,
            engine: Arc::new(engine),
            replication: Arc::new(kv_replication::ReplicationManager::new(config)),
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    #[tokio::test]
    async fn get_missing_key_returns_404() {
        let state = leader_state().await;
        let err = get_key(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_on_follower_returns_503() {
        let state = follower_state().await;
        let err = get_key(State(state), Path("any".to_string()))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn set_on_follower_returns_503() {
        let state = follower_state().await;
        let body = SetBody {
            key: "foo".to_string(),
            value: Value::String("bar".to_string()),
            debug: false,
        };
        let err = set_key(State(state), Json(body)).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn delete_on_follower_returns_503() {
        let state = follower_state().await;
        let err = delete_key(State(state), Path("foo".to_string())).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn set_then_get_on_leader_round_trips() {
        let state = leader_state().await;
        let body = SetBody {
            key: "foo".to_string(),
            value: Value::String("bar".to_string()),
            debug: false,
        };
        set_key(State(state.clone()), Json(body)).await.unwrap();
        let Json(response) = get_key(State(state), Path("foo".to_string())).await.unwrap();
        assert_eq!(response["value"], serde_json::json!("bar"));
    }

    #[tokio::test]
    async fn delete_on_leader_always_reports_ok() {
        let state = leader_state().await;
        let Json(response) = delete_key(State(state), Path("missing".to_string())).await.unwrap();
        assert_eq!(response["status"], serde_json::json!("ok"));
    }
}
