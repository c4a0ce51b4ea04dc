//! The replication and election manager: a background task that ticks
//! roughly every 100ms, plus the handlers invoked when a peer's request
//! arrives over the internal HTTP surface.
//!
//! This deliberately does not implement log-matching (`next_index`/
//! `match_index`, `AppendEntries` consistency checks): the leader fans a
//! committed write out to every peer concurrently, best-effort, and does
//! not retry a peer that missed it. Catching a lagging follower up after a
//! failover is explicitly not handled here.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::config::ReplicationConfig;
use crate::message::{HeartbeatRequest, ReplicateRequest, VoteRequest, VoteResponse};
use crate::state::{ReplicationState, Role};
use kv_types::Record;

pub struct ReplicationManager {
    config: ReplicationConfig,
    state: Arc<RwLock<ReplicationState>>,
    http: reqwest::Client,
}

impl ReplicationManager {
    pub fn new(config: ReplicationConfig) -> Self {
        let is_single_node = config.is_single_node();
        let state = ReplicationState::new(config.node_id, is_single_node);
        let http = reqwest::Client::builder()
            .timeout(config.peer_request_timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");

        ReplicationManager {
            config,
            state: Arc::new(RwLock::new(state)),
            http,
        }
    }

    pub async fn role(&self) -> Role {
        self.state.read().await.role
    }

    pub async fn term(&self) -> u64 {
        self.state.read().await.term
    }

    pub async fn leader_id(&self) -> Option<u64> {
        self.state.read().await.leader_id
    }

    pub async fn is_leader(&self) -> bool {
        self.role().await == Role::Leader
    }

    /// Runs forever, ticking the election/heartbeat state machine. Intended
    /// to be spawned as its own tokio task for the lifetime of the process.
    pub async fn run(self: Arc<Self>) {
        {
            let mut state = self.state.write().await;
            state.reset_election_deadline(
                self.config.election_timeout_min,
                self.config.election_timeout_max,
            );
        }

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        let mut last_heartbeat = tokio::time::Instant::now();

        loop {
            ticker.tick().await;

            let role = self.role().await;
            match role {
                Role::Leader => {
                    if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                        self.send_heartbeats().await;
                        last_heartbeat = tokio::time::Instant::now();
                    }
                }
                Role::Follower | Role::Candidate => {
                    let timed_out = self.state.read().await.election_timed_out();
                    if timed_out {
                        self.run_election().await;
                    }
                }
            }
        }
    }

    async fn send_heartbeats(&self) {
        let (term, leader_id) = {
            let state = self.state.read().await;
            (state.term, state.node_id)
        };
        let body = HeartbeatRequest { term, leader_id };

        let requests = self.config.peers.iter().map(|peer| {
            let http = self.http.clone();
            let url = format!("{peer}/internal/heartbeat");
            let body = body.clone();
            async move {
                if let Err(e) = http.post(&url).json(&body).send().await {
                    tracing::warn!(peer = %url, error = %e, "heartbeat delivery failed");
                }
            }
        });
        join_all(requests).await;
    }

    async fn run_election(&self) {
        let (term, node_id) = {
            let mut state = self.state.write().await;
            let term = state.start_election();
            state.reset_election_deadline(
                self.config.election_timeout_min,
                self.config.election_timeout_max,
            );
            (term, state.node_id)
        };

        tracing::info!(term, node_id, "starting election");

        let body = VoteRequest {
            term,
            candidate_id: node_id,
        };

        let responses = join_all(self.config.peers.iter().map(|peer| {
            let http = self.http.clone();
            let url = format!("{peer}/internal/vote");
            let body = body.clone();
            async move { http.post(&url).json(&body).send().await }
        }))
        .await;

        for response in responses {
            match response {
                Ok(resp) => match resp.json::<VoteResponse>().await {
                    Ok(vote) if vote.vote_granted => {
                        let mut state = self.state.write().await;
                        // A vote granted under a stale view of our term
                        // doesn't count if we've since learned of a newer
                        // term from someone else.
                        if state.term == term {
                            state.record_vote_granted();
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "vote response decode failed"),
                },
                Err(e) => tracing::warn!(error = %e, "vote request failed"),
            }
        }

        let mut state = self.state.write().await;
        if state.term == term && state.role == Role::Candidate && state.has_majority(self.config.peers.len()) {
            state.become_leader();
            tracing::info!(term, node_id, "won election");
            drop(state);
            self.send_heartbeats().await;
        } else if state.role == Role::Candidate {
            state.step_down();
            tracing::info!(term, "election did not reach a majority, stepping back to follower");
        }
    }

    /// Invoked by the HTTP layer when a peer's heartbeat arrives.
    pub async fn handle_heartbeat(&self, term: u64, leader_id: u64) {
        let mut state = self.state.write().await;
        if state.receive_heartbeat(term, leader_id) {
            state.reset_election_deadline(
                self.config.election_timeout_min,
                self.config.election_timeout_max,
            );
        }
    }

    /// Invoked by the HTTP layer when a peer's vote request arrives.
    pub async fn handle_vote_request(&self, term: u64, _candidate_id: u64) -> VoteResponse {
        let mut state = self.state.write().await;
        let granted = state.receive_vote_request(term);
        if granted {
            state.reset_election_deadline(
                self.config.election_timeout_min,
                self.config.election_timeout_max,
            );
        }
        VoteResponse {
            term: state.term,
            vote_granted: granted,
        }
    }

    /// Fans a committed write out to every peer concurrently. Best-effort:
    /// failures are logged and otherwise ignored, since the client's ack
    /// already depended only on the leader's local durability.
    pub async fn replicate_to_peers(&self, record: Record) {
        let body = ReplicateRequest { record };
        let requests = self.config.peers.iter().map(|peer| {
            let http = self.http.clone();
            let url = format!("{peer}/internal/replicate");
            let body = body.clone();
            async move {
                if let Err(e) = http.post(&url).json(&body).send().await {
                    tracing::warn!(peer = %url, error = %e, "replication delivery failed");
                }
            }
        });
        join_all(requests).await;
    }

    pub fn peers(&self) -> &[String] {
        &self.config.peers
    }

    pub async fn heartbeat_once_for_tests(&self) {
        self.send_heartbeats().await;
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }
}
