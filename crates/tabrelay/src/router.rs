//! Dispatch: one logical call to the first peer or to every open peer.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tabproto::{BrowserMethod, DeliveryMode, Guid, RequestEnvelope};
use tracing::{debug, instrument};

use crate::correlation::CorrelationTable;
use crate::error::RelayError;
use crate::peers::{PeerHandle, PeerId, PeerRegistry};

/// Result of a dispatched call.
#[derive(Debug)]
pub enum Dispatch {
    /// `first` mode: the single peer's response, unwrapped.
    Single(Value),
    /// `all` mode: one outcome per peer, in connection order.
    Broadcast(Vec<PeerOutcome>),
}

#[derive(Debug)]
pub struct PeerOutcome {
    pub peer: PeerId,
    pub result: Result<Value, RelayError>,
}

impl PeerOutcome {
    /// The response itself on success, `{error, peer}` otherwise.
    pub fn to_json(&self) -> Value {
        match &self.result {
            Ok(value) => value.clone(),
            Err(e) => json!({ "error": e.to_string(), "peer": self.peer }),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    peers: Arc<PeerRegistry>,
    table: CorrelationTable,
}

impl Dispatcher {
    pub fn new(peers: Arc<PeerRegistry>, table: CorrelationTable) -> Self {
        Self { peers, table }
    }

    #[instrument(skip_all, fields(method = %method, mode = %mode))]
    pub async fn send(
        &self,
        method: BrowserMethod,
        args: Vec<Value>,
        mode: DeliveryMode,
    ) -> Result<Dispatch, RelayError> {
        match mode {
            DeliveryMode::First => {
                let peer = self.peers.first().ok_or(RelayError::NoPeers)?;
                let value = self.transmit(&peer, method, args).await?;
                Ok(Dispatch::Single(value))
            }
            DeliveryMode::All => {
                let peers = self.peers.all_open();
                if peers.is_empty() {
                    return Err(RelayError::NoPeers);
                }
                let calls = peers.iter().map(|peer| {
                    let args = args.clone();
                    async move {
                        PeerOutcome {
                            peer: peer.id(),
                            result: self.transmit(peer, method, args).await,
                        }
                    }
                });
                Ok(Dispatch::Broadcast(join_all(calls).await))
            }
        }
    }

    /// Register, send, and wait for one peer's answer.
    async fn transmit(
        &self,
        peer: &PeerHandle,
        method: BrowserMethod,
        args: Vec<Value>,
    ) -> Result<Value, RelayError> {
        let guid = Guid::new();
        let text = RequestEnvelope::new(method, args, guid).to_text()?;
        let pending = self.table.register(guid)?;

        if let Err(e) = peer.send(text) {
            debug!(peer = %peer.id(), %guid, error = %e, "send failed");
            self.table.fail(&guid, e);
        } else {
            debug!(peer = %peer.id(), %guid, "request sent");
        }

        pending.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tabproto::ResponseEnvelope;
    use tokio::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn setup(timeout: Duration) -> (Arc<PeerRegistry>, CorrelationTable, Dispatcher) {
        let peers = Arc::new(PeerRegistry::new());
        let table = CorrelationTable::new(timeout);
        let dispatcher = Dispatcher::new(Arc::clone(&peers), table.clone());
        (peers, table, dispatcher)
    }

    /// Answers every request on `rx` with `reply(request)`.
    fn fake_browser<F>(mut rx: mpsc::Receiver<String>, table: CorrelationTable, reply: F)
    where
        F: Fn(&RequestEnvelope) -> Option<Value> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                let request: RequestEnvelope = serde_json::from_str(&text).unwrap();
                if let Some(value) = reply(&request) {
                    table.complete(&request.guid, value);
                }
            }
        });
    }

    #[tokio::test]
    async fn first_with_no_peers_registers_nothing() {
        let (_peers, table, dispatcher) = setup(Duration::from_secs(10));

        let err = dispatcher
            .send(BrowserMethod::TabsQuery, vec![json!({})], DeliveryMode::First)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::NoPeers));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn all_with_no_peers_is_no_peers() {
        let (_peers, table, dispatcher) = setup(Duration::from_secs(10));
        let err = dispatcher
            .send(BrowserMethod::TabsQuery, vec![], DeliveryMode::All)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NoPeers));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn first_returns_unwrapped_value() {
        let (peers, table, dispatcher) = setup(Duration::from_secs(10));
        let (tx, rx) = mpsc::channel(8);
        peers.add(addr(5001), tx);
        fake_browser(rx, table.clone(), |req| {
            assert_eq!(req.method, BrowserMethod::TabsCreate);
            Some(json!({"id": 42, "url": req.args[0]["url"]}))
        });

        let result = dispatcher
            .send(
                BrowserMethod::TabsCreate,
                vec![json!({"url": "https://example.com"})],
                DeliveryMode::First,
            )
            .await
            .unwrap();

        match result {
            Dispatch::Single(v) => assert_eq!(v, json!({"id": 42, "url": "https://example.com"})),
            other => panic!("expected single, got {other:?}"),
        }
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_reports_every_peer_in_order() {
        let (peers, table, dispatcher) = setup(Duration::from_secs(10));
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);
        let a = peers.add(addr(5001), tx_a);
        let b = peers.add(addr(5002), tx_b);

        // A answers, B stays silent
        fake_browser(rx_a, table.clone(), |_| Some(json!({"tabs": [{"id": 1}]})));

        let result = dispatcher
            .send(BrowserMethod::TabsQuery, vec![json!({})], DeliveryMode::All)
            .await
            .unwrap();

        let Dispatch::Broadcast(outcomes) = result else {
            panic!("expected broadcast");
        };
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].peer, a.id());
        assert_eq!(outcomes[0].result.as_ref().unwrap(), &json!({"tabs": [{"id": 1}]}));
        assert_eq!(outcomes[1].peer, b.id());
        assert!(matches!(outcomes[1].result, Err(RelayError::Timeout { .. })));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn transmit_failure_is_per_peer() {
        let (peers, table, dispatcher) = setup(Duration::from_secs(10));
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(1);
        peers.add(addr(5001), tx_a);
        let b = peers.add(addr(5002), tx_b);

        // Fill B's queue so the send fails immediately
        b.send("occupied".into()).unwrap();
        let _hold_b = rx_b;
        fake_browser(rx_a, table.clone(), |_| Some(json!([])));

        let Dispatch::Broadcast(outcomes) = dispatcher
            .send(BrowserMethod::WindowsGetAll, vec![json!({})], DeliveryMode::All)
            .await
            .unwrap()
        else {
            panic!("expected broadcast");
        };

        assert_eq!(outcomes[0].to_json(), json!([]));
        let failed = outcomes[1].to_json();
        assert_eq!(failed["peer"], json!(b.id()));
        assert!(failed["error"].as_str().unwrap().contains("outbound queue full"));
    }

    #[tokio::test]
    async fn peer_error_fails_first_mode() {
        let (peers, table, dispatcher) = setup(Duration::from_secs(10));
        let (tx, mut rx) = mpsc::channel::<String>(8);
        peers.add(addr(5001), tx);

        let responder = table.clone();
        tokio::spawn(async move {
            let text = rx.recv().await.unwrap();
            let request: RequestEnvelope = serde_json::from_str(&text).unwrap();
            let reply = ResponseEnvelope::failure(request.method, request.guid, "No tab with id: 9");
            responder.fail(
                &request.guid,
                RelayError::PeerReported {
                    message: reply.error.unwrap(),
                },
            );
        });

        let err = dispatcher
            .send(BrowserMethod::TabsReload, vec![json!(9)], DeliveryMode::First)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No tab with id: 9");
    }

    #[tokio::test]
    async fn concurrent_calls_to_one_peer_answered_out_of_order() {
        let (peers, table, dispatcher) = setup(Duration::from_secs(10));
        let (tx, mut rx) = mpsc::channel::<String>(8);
        peers.add(addr(5001), tx);

        // Hold both requests, then answer the second one first
        let responder = table.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while held.len() < 2 {
                let text = rx.recv().await.unwrap();
                held.push(serde_json::from_str::<RequestEnvelope>(&text).unwrap());
            }
            for request in held.iter().rev() {
                responder.complete(&request.guid, request.args[0]["tag"].clone());
            }
        });

        let (a, b) = tokio::join!(
            dispatcher.send(BrowserMethod::TabsQuery, vec![json!({"tag": "A"})], DeliveryMode::First),
            dispatcher.send(BrowserMethod::TabsQuery, vec![json!({"tag": "B"})], DeliveryMode::First),
        );

        assert!(matches!(a.unwrap(), Dispatch::Single(v) if v == json!("A")));
        assert!(matches!(b.unwrap(), Dispatch::Single(v) if v == json!("B")));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn each_peer_gets_its_own_guid() {
        let (peers, table, dispatcher) = setup(Duration::from_secs(10));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        for port in [5001, 5002, 5003] {
            let (tx, rx) = mpsc::channel(8);
            peers.add(addr(port), tx);
            let seen = seen_tx.clone();
            fake_browser(rx, table.clone(), move |req| {
                seen.send(req.guid).unwrap();
                Some(json!(port))
            });
        }

        let Dispatch::Broadcast(outcomes) = dispatcher
            .send(BrowserMethod::TabsQuery, vec![json!({})], DeliveryMode::All)
            .await
            .unwrap()
        else {
            panic!("expected broadcast");
        };
        let values: Vec<Value> = outcomes.iter().map(PeerOutcome::to_json).collect();
        assert_eq!(values, vec![json!(5001), json!(5002), json!(5003)]);

        let mut guids = Vec::new();
        while let Ok(guid) = seen_rx.try_recv() {
            guids.push(guid);
        }
        guids.sort_by_key(|g| g.to_string());
        guids.dedup();
        assert_eq!(guids.len(), 3);
    }
}
