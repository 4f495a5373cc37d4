use crate::types::Rank;

pub type Result<T> = std::result::Result<T, TreefoldError>;

#[derive(Debug, thiserror::Error)]
pub enum TreefoldError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("failed to allocate output storage for {elements} elements")]
    AllocationFailed { elements: usize },

    #[error("protocol violation from rank {rank}: {reason}")]
    ProtocolViolation { rank: Rank, reason: String },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u8, remote: u8 },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("rank {rank} not found in group")]
    UnknownPeer { rank: Rank },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },
}

impl TreefoldError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an `InvalidArgument` error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// True for errors detected by this process alone: argument checks and
    /// output allocation.
    ///
    /// Peers of a process that hit one of these are not notified and may
    /// block inside the collective.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::SizeMismatch { .. }
                | Self::InvalidRank { .. }
                | Self::AllocationFailed { .. }
        )
    }
}
