//! Error types for the replication layer.

use duetnet_protocol::Role;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    /// An operation reserved for one role was called on the other.
    /// Always a programming error.
    #[error("{operation} is not available on a {role}")]
    RoleMisuse {
        operation: &'static str,
        role: Role,
    },
}
