use async_trait::async_trait;
use raftline_core::{PeerId, Result};
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::message::Message;

/// The only thing the consensus core asks of the network: send a message
/// to a destination. Connection establishment, reconnection, and peer
/// authentication are out of scope and live entirely outside this
/// trait's implementer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, dest: PeerId, msg: Message) -> Result<()>;
}

/// In-process test double wiring a fixed set of nodes together over
/// `tokio::sync::mpsc` channels. Stands in for real peer sockets in tests
/// that exercise the core end to end (S1-S6) without touching a network.
pub struct ChannelTransport {
    self_id: PeerId,
    peers: HashMap<PeerId, mpsc::UnboundedSender<Message>>,
}

impl ChannelTransport {
    /// Build a fully-connected mesh of `ChannelTransport`s for the given
    /// peer ids, returning each node's transport handle alongside the
    /// receiver it should poll for inbound messages.
    pub fn cluster(ids: &[PeerId]) -> HashMap<PeerId, (ChannelTransport, mpsc::UnboundedReceiver<Message>)> {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for &id in ids {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(id, tx);
            receivers.insert(id, rx);
        }

        ids.iter()
            .map(|&id| {
                let transport = ChannelTransport {
                    self_id: id,
                    peers: senders.clone(),
                };
                let rx = receivers.remove(&id).expect("receiver present for every id");
                (id, (transport, rx))
            })
            .collect()
    }
}

#[async_trait]
impl PeerTransport for ChannelTransport {
    async fn send(&self, dest: PeerId, msg: Message) -> Result<()> {
        if dest == self.self_id {
            return Ok(());
        }
        if let Some(tx) = self.peers.get(&dest) {
            // Best-effort delivery: a closed channel models an unreachable peer.
            let _ = tx.send(msg);
        }
        Ok(())
    }
}
