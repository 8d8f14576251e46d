use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaftlineError>;

#[derive(Error, Debug, Clone)]
pub enum RaftlineError {
    #[error("not leader: current leader is {0:?}")]
    NotLeader(Option<u64>),

    #[error("consensus invariant violated: {0}")]
    ConsensusError(String),

    #[error("unknown command type: {0}")]
    UnknownCommand(String),

    #[error("replication error: {0}")]
    ReplicationError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("quorum not available")]
    QuorumNotAvailable,

    #[error("operation timeout")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("snapshot RPC is reserved and not implemented")]
    SnapshotNotImplemented,

    #[error("io error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for RaftlineError {
    fn from(err: std::io::Error) -> Self {
        RaftlineError::IoError(err.to_string())
    }
}
