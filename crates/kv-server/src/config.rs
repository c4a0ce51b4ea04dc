//! CLI configuration, with environment-variable fallback for every flag,
//! following the same `clap` derive shape used across this workspace.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "kv-server")]
#[command(about = "Replicated, persistent key-value store node")]
#[command(version)]
pub struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "KV_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "KV_PORT", default_value_t = 8000)]
    pub port: u16,

    /// This node's unique id within the cluster.
    #[arg(long, env = "KV_NODE_ID", default_value_t = 0)]
    pub node_id: u64,

    /// Comma-separated list of peer base URLs (e.g. http://host:8000). May
    /// be empty for a single-node cluster.
    #[arg(long, env = "KV_PEERS", default_value = "")]
    pub peers: String,

    /// Directory holding this node's WAL and snapshot files.
    #[arg(long, env = "KV_DATA_DIR", default_value = "data")]
    pub data_dir: String,

    /// Log level passed to the tracing env-filter.
    #[arg(long, env = "KV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn peer_list(&self) -> Vec<String> {
        self.peers
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .collect()
    }
}
