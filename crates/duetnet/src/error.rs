//! Unified error type for duetnet.

use duetnet_protocol::{ProtocolError, Role};
use duetnet_replication::ReplicationError;
use duetnet_session::SessionError;
use duetnet_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors, so callers
/// of [`NetManager`](crate::NetManager) only ever match on this type.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Bind, connect, or send failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// An operation was called on the wrong side, e.g. `send_time` on a
    /// client. A programming error, not something to retry.
    #[error("{operation} is not available on the {role}")]
    RoleMisuse { operation: &'static str, role: Role },

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
