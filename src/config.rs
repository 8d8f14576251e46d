use raftline_consensus::election::TimingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Top-level configuration surface for one node.
///
/// The core never interprets `backend.credentials`; it is handed to
/// whatever `StateMachine` the embedder constructs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftlineConfig {
    pub node: NodeConfig,
    pub timing: TimingConfigDef,
    pub backend: BackendConfig,
    pub network: NetworkConfig,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node ID.
    pub node_id: u64,

    /// The other cluster members (this node excluded), keyed by peer id.
    pub peers: HashMap<u64, String>,
}

/// Timing knobs in millisecond form, the serializable counterpart of
/// `raftline_consensus::election::TimingConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfigDef {
    pub min_leader_timeout_ms: u64,
    pub max_leader_timeout_ms: u64,
    pub min_election_timeout_ms: u64,
    pub max_election_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub min_election_delay_ms: u64,
}

impl TimingConfigDef {
    pub fn to_timing_config(&self) -> TimingConfig {
        use raftline_consensus::timer::TimeoutRange;
        TimingConfig {
            leader_timeout: TimeoutRange::new(
                Duration::from_millis(self.min_leader_timeout_ms),
                Duration::from_millis(self.max_leader_timeout_ms),
            ),
            election_timeout: TimeoutRange::new(
                Duration::from_millis(self.min_election_timeout_ms),
                Duration::from_millis(self.max_election_timeout_ms),
            ),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            min_election_delay: Duration::from_millis(self.min_election_delay_ms),
        }
    }
}

impl Default for TimingConfigDef {
    fn default() -> Self {
        let defaults = TimingConfig::default();
        Self {
            min_leader_timeout_ms: defaults.leader_timeout.min.as_millis() as u64,
            max_leader_timeout_ms: defaults.leader_timeout.max.as_millis() as u64,
            min_election_timeout_ms: defaults.election_timeout.min.as_millis() as u64,
            max_election_timeout_ms: defaults.election_timeout.max.as_millis() as u64,
            heartbeat_interval_ms: defaults.heartbeat_interval.as_millis() as u64,
            min_election_delay_ms: defaults.min_election_delay.as_millis() as u64,
        }
    }
}

/// The external state-machine back end's opaque configuration.
/// `disabled` selects `NullStateMachine` over a real back end so the
/// consensus core can be exercised on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub credentials: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port the front-end request router listens on.
    pub router_port: u16,

    /// Port peer RPC traffic uses.
    pub protocol_port: u16,
}

impl Default for RaftlineConfig {
    fn default() -> Self {
        let mut peers = HashMap::new();
        peers.insert(2, "127.0.0.1:7002".to_string());
        peers.insert(3, "127.0.0.1:7003".to_string());
        Self {
            node: NodeConfig { node_id: 1, peers },
            timing: TimingConfigDef::default(),
            backend: BackendConfig {
                credentials: None,
                disabled: false,
            },
            network: NetworkConfig {
                router_port: 7101,
                protocol_port: 7001,
            },
            debug: false,
        }
    }
}

impl RaftlineConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
