//! Correlation table: guid → waiting caller.
//!
//! Every outbound request registers its guid here before the frame is
//! sent. The entry is settled exactly once, by whichever comes first:
//! a matching response from the listener, or the per-entry timer.
//! Both paths go through `DashMap::remove`, so only one of them ever sees
//! the entry.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tabproto::Guid;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::RelayError;

type Completion = Result<Value, RelayError>;

struct PendingRequest {
    response_tx: oneshot::Sender<Completion>,
    timer: AbortHandle,
    created: Instant,
}

struct Inner {
    pending: DashMap<Guid, PendingRequest>,
    timeout: Duration,
}

/// Cheap to clone; all clones share one table.
#[derive(Clone)]
pub struct CorrelationTable {
    inner: Arc<Inner>,
}

impl CorrelationTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: DashMap::new(),
                timeout,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Register `guid` and arm its timer.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn register(&self, guid: Guid) -> Result<PendingResponse, RelayError> {
        match self.inner.pending.entry(guid) {
            Entry::Occupied(_) => {
                warn!(%guid, "duplicate registration");
                Err(RelayError::DuplicateRegistration(guid))
            }
            Entry::Vacant(slot) => {
                let (response_tx, response_rx) = oneshot::channel();
                let timer = spawn_timer(Arc::downgrade(&self.inner), guid, self.inner.timeout);
                slot.insert(PendingRequest {
                    response_tx,
                    timer,
                    created: Instant::now(),
                });
                Ok(PendingResponse { guid, response_rx })
            }
        }
    }

    /// Resolve a pending request. Returns false if nothing was waiting.
    pub fn complete(&self, guid: &Guid, payload: Value) -> bool {
        self.settle(guid, Ok(payload))
    }

    /// Reject a pending request. Returns false if nothing was waiting.
    pub fn fail(&self, guid: &Guid, error: RelayError) -> bool {
        self.settle(guid, Err(error))
    }

    fn settle(&self, guid: &Guid, outcome: Completion) -> bool {
        let Some((_, pending)) = self.inner.pending.remove(guid) else {
            return false;
        };
        pending.timer.abort();
        debug!(
            %guid,
            ok = outcome.is_ok(),
            elapsed_ms = pending.created.elapsed().as_millis() as u64,
            "settled"
        );
        // Receiver may be gone if the caller stopped waiting
        let _ = pending.response_tx.send(outcome);
        true
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_pending(&self, guid: &Guid) -> bool {
        self.inner.pending.contains_key(guid)
    }

    /// Drop every pending entry. Waiters see `Abandoned`.
    pub fn abandon_all(&self) -> usize {
        let guids: Vec<Guid> = self.inner.pending.iter().map(|e| *e.key()).collect();
        let mut dropped = 0;
        for guid in guids {
            if let Some((_, pending)) = self.inner.pending.remove(&guid) {
                pending.timer.abort();
                dropped += 1;
            }
        }
        dropped
    }
}

fn spawn_timer(table: Weak<Inner>, guid: Guid, after: Duration) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if let Some(inner) = table.upgrade() {
            let table = CorrelationTable { inner };
            if table.fail(&guid, RelayError::Timeout { guid, after }) {
                debug!(%guid, ?after, "timed out");
            }
        }
    })
    .abort_handle()
}

/// The waiting half of a registration.
pub struct PendingResponse {
    guid: Guid,
    response_rx: oneshot::Receiver<Completion>,
}

impl PendingResponse {
    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub async fn wait(self) -> Result<Value, RelayError> {
        match self.response_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RelayError::Abandoned(self.guid)),
        }
    }
}
