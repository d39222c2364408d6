//! The relay instance: peers, pending requests, and dispatch in one place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tabconf::RelayConfig;
use tabproto::{BrowserMethod, DeliveryMode};
use tracing::info;

use crate::correlation::CorrelationTable;
use crate::error::RelayError;
use crate::peers::PeerRegistry;
use crate::router::{Dispatch, Dispatcher};

/// Built once in `main` and shared as `Arc<Relay>` between the WebSocket
/// listener and the MCP handler.
pub struct Relay {
    peers: Arc<PeerRegistry>,
    table: CorrelationTable,
    dispatcher: Dispatcher,
    outbound_buffer: usize,
    started: Instant,
}

impl Relay {
    pub fn new(config: &RelayConfig) -> Self {
        let peers = Arc::new(PeerRegistry::new());
        let table = CorrelationTable::new(config.timeout());
        let dispatcher = Dispatcher::new(Arc::clone(&peers), table.clone());
        Self {
            peers,
            table,
            dispatcher,
            outbound_buffer: config.outbound_buffer.max(1),
            started: Instant::now(),
        }
    }

    pub async fn send(
        &self,
        method: BrowserMethod,
        args: Vec<Value>,
        mode: DeliveryMode,
    ) -> Result<Dispatch, RelayError> {
        self.dispatcher.send(method, args, mode).await
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn table(&self) -> &CorrelationTable {
        &self.table
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wake every waiting caller with `Abandoned`.
    pub fn shutdown(&self) {
        let abandoned = self.table.abandon_all();
        info!(abandoned, "relay shut down");
    }
}
