//! Error types for registry operations

/// Errors surfaced by the registry and its cluster plumbing.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Write attempted on a node that is not the cluster leader.
    #[error("not leader, writes go to {}", leader.as_deref().unwrap_or("unknown"))]
    NotLeader { leader: Option<String> },

    /// Missing or unparseable request input.
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    /// Probe or snapshot fetch against a peer failed.
    #[error("peer {url} unreachable: {reason}")]
    PeerUnreachable { url: String, reason: String },

    /// A snapshot blob (from a peer or the durable store) did not decode.
    #[error("snapshot decode failed: {reason}")]
    SnapshotDecode { reason: String },

    /// Durable store read/write failure.
    #[error("snapshot persistence failed at {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected failure inside a periodic task.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
