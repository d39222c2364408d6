//! Failures of a relayed call.

use std::time::Duration;

use tabproto::{Guid, ProtoError};
use thiserror::Error;

use crate::peers::PeerId;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Nothing to send to. Reported before anything is registered.
    #[error("No browser clients connected")]
    NoPeers,

    #[error("Timeout waiting for response to guid: {guid}")]
    Timeout { guid: Guid, after: Duration },

    /// The extension answered with an `error` field.
    #[error("{message}")]
    PeerReported { message: String },

    #[error("malformed message: {0}")]
    Malformed(#[from] ProtoError),

    #[error("guid {0} is already pending")]
    DuplicateRegistration(Guid),

    #[error("failed to send to peer {peer}: {reason}")]
    Transmit { peer: PeerId, reason: String },

    #[error("request {0} abandoned: relay shut down")]
    Abandoned(Guid),
}

impl RelayError {
    /// Whether the caller should see this as a tool-level error result
    /// rather than a protocol error.
    pub fn is_tool_error(&self) -> bool {
        matches!(self, RelayError::NoPeers | RelayError::PeerReported { .. })
    }
}
