//! Registry of connected browser extensions.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::error::RelayError;

/// Monotonic connection id. Lower ids connected earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PeerId(u64);

impl PeerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending side of one peer connection.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    remote_addr: SocketAddr,
    connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<String>,
}

impl PeerHandle {
    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Open until the connection's writer task drops its receiver.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue a text frame without waiting.
    pub fn send(&self, text: String) -> Result<(), RelayError> {
        self.outbound.try_send(text).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue full",
                TrySendError::Closed(_) => "connection closed",
            };
            RelayError::Transmit {
                peer: self.id,
                reason: reason.to_string(),
            }
        })
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id,
            remote_addr: self.remote_addr.to_string(),
            connected_at: self.connected_at,
            open: self.is_open(),
        }
    }
}

/// Diagnostic view of a peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub id: PeerId,
    pub remote_addr: String,
    pub connected_at: DateTime<Utc>,
    pub open: bool,
}

/// Connected peers in connection order.
///
/// Locks are held only for map operations, never across an await.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<BTreeMap<PeerId, PeerHandle>>,
    next_id: AtomicU64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection whose frames will be written from `outbound`.
    pub fn add(&self, remote_addr: SocketAddr, outbound: mpsc::Sender<String>) -> PeerHandle {
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let handle = PeerHandle {
            id,
            remote_addr,
            connected_at: Utc::now(),
            outbound,
        };
        self.peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, handle.clone());
        debug!(peer = %id, %remote_addr, "peer registered");
        handle
    }

    /// Returns whether the peer was present.
    pub fn remove(&self, id: PeerId) -> bool {
        let removed = self
            .peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some();
        if removed {
            debug!(peer = %id, "peer removed");
        }
        removed
    }

    /// Earliest connected peer that is still open.
    pub fn first(&self) -> Option<PeerHandle> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .find(|p| p.is_open())
            .cloned()
    }

    /// Every open peer, earliest first.
    pub fn all_open(&self) -> Vec<PeerHandle> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PeerInfo> {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(PeerHandle::info)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
