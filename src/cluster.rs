use std::sync::Arc;

use raftline_consensus::election::TimingConfig;
use raftline_consensus::{RaftConfig, RaftHandle, RaftNode};
use raftline_core::{PeerId, RequestRouter, StateMachine};
use raftline_rpc::ChannelTransport;
use tokio::task::JoinHandle;

use crate::router::LoggingRouter;

/// An in-process cluster of `RaftNode`s wired together over
/// `ChannelTransport` (design goal: "two nodes in one process must be
/// independently constructible for testing").
///
/// Real peer sockets are out of scope for this core; this is the one
/// concrete `PeerTransport` the workspace ships, so the runnable demo
/// binary and the multi-node scenario tests both build their cluster this
/// way rather than against a network.
pub struct Cluster {
    handles: Vec<(PeerId, RaftHandle)>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cluster {
    /// Start one `RaftNode` per id in `peer_ids`, each running on its own
    /// tokio task, fully connected via `ChannelTransport`. `state_machine`
    /// is shared (by `Arc`) across every node; each node gets its own
    /// `LoggingRouter`.
    pub fn start(peer_ids: &[PeerId], timing: TimingConfig, state_machine: Arc<dyn StateMachine>) -> Self {
        let mut transports = ChannelTransport::cluster(peer_ids);
        let mut handles = Vec::with_capacity(peer_ids.len());
        let mut tasks = Vec::with_capacity(peer_ids.len());

        for &node_id in peer_ids {
            let (transport, message_rx) = transports
                .remove(&node_id)
                .expect("ChannelTransport::cluster returns an entry per id");
            let peers: Vec<PeerId> = peer_ids.iter().copied().filter(|&p| p != node_id).collect();

            let config = RaftConfig {
                node_id,
                peers,
                timing,
            };
            let router: Arc<dyn RequestRouter> = Arc::new(LoggingRouter::new(node_id));

            let (handle, node) = RaftNode::new(
                config,
                Arc::new(transport),
                Arc::clone(&state_machine),
                router,
                message_rx,
            );
            tasks.push(tokio::spawn(node.run()));
            handles.push((node_id, handle));
        }

        Self { handles, tasks }
    }

    pub fn handle(&self, id: PeerId) -> Option<&RaftHandle> {
        self.handles.iter().find(|(p, _)| *p == id).map(|(_, h)| h)
    }

    pub fn ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.handles.iter().map(|(p, _)| *p)
    }

    /// Poll every node for leadership until one reports itself leader, or
    /// `attempts` polls pass with none found.
    pub async fn find_leader(&self, attempts: usize, poll_interval: std::time::Duration) -> Option<PeerId> {
        for _ in 0..attempts {
            for (id, handle) in &self.handles {
                if handle.is_leader().await {
                    return Some(*id);
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
        None
    }

    /// Stop every node and await its task.
    pub async fn stop(self) {
        for (_, handle) in &self.handles {
            handle.stop();
        }
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
