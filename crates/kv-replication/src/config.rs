//! Typed configuration for the replication manager, built with the same
//! validating-builder shape used elsewhere in this workspace.

use std::time::Duration;

use crate::error::{ReplicationError, ReplicationResult};

#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    pub node_id: u64,
    pub peers: Vec<String>,
    pub election_timeout_min: Duration,
    pub election_timeout_max: Duration,
    pub heartbeat_interval: Duration,
    pub peer_request_timeout: Duration,
    pub tick_interval: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        ReplicationConfig {
            node_id: 0,
            peers: Vec::new(),
            election_timeout_min: Duration::from_millis(1500),
            election_timeout_max: Duration::from_millis(3000),
            heartbeat_interval: Duration::from_millis(500),
            peer_request_timeout: Duration::from_secs(1),
            tick_interval: Duration::from_millis(100),
        }
    }
}

impl ReplicationConfig {
    pub fn builder() -> ReplicationConfigBuilder {
        ReplicationConfigBuilder::default()
    }

    pub fn validate(&self) -> ReplicationResult<()> {
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(ReplicationError::configuration(
                "election_timeout_min must be less than election_timeout_max",
            ));
        }
        if self.heartbeat_interval >= self.election_timeout_min {
            return Err(ReplicationError::configuration(
                "heartbeat_interval must be smaller than the election timeout range",
            ));
        }
        Ok(())
    }

    pub fn is_single_node(&self) -> bool {
        self.peers.is_empty()
    }
}

#[derive(Default)]
pub struct ReplicationConfigBuilder {
    config: ReplicationConfig,
}

impl ReplicationConfigBuilder {
    pub fn node_id(mut self, node_id: u64) -> Self {
        self.config.node_id = node_id;
        self
    }

    pub fn peers(mut self, peers: Vec<String>) -> Self {
        self.config.peers = peers;
        self
    }

    pub fn build(self) -> ReplicationResult<ReplicationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
