//! Leader election and best-effort write replication across a cluster of
//! key-value nodes. This is deliberately not a full Raft implementation:
//! there is no log index, no `AppendEntries` consistency check, and no
//! catch-up mechanism for a follower that missed a write.

pub mod config;
pub mod error;
pub mod manager;
pub mod message;
pub mod state;

pub use config::{ReplicationConfig, ReplicationConfigBuilder};
pub use error::{ReplicationError, ReplicationResult};
pub use manager::ReplicationManager;
pub use message::{HeartbeatRequest, ReplicateAck, ReplicateRequest, VoteRequest, VoteResponse};
pub use state::{ReplicationState, Role};
