use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use raftline::config::RaftlineConfig;
use raftline_core::{Command, CommandType, PeerId};
use raftline_statemachine::{InMemoryStateMachine, NullStateMachine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let config = RaftlineConfig::default();
    // Defensively dedupe: a hand-edited config could list this node's own
    // id in `peers` alongside `node_id` without either field noticing.
    let peer_ids: Vec<PeerId> = std::iter::once(config.node.node_id)
        .chain(config.node.peers.keys().copied())
        .collect::<BTreeSet<u64>>()
        .into_iter()
        .map(PeerId::new)
        .collect();

    tracing::info!(
        node_id = config.node.node_id,
        cluster_size = peer_ids.len(),
        "starting in-process raftline cluster"
    );

    let state_machine: Arc<dyn raftline_core::StateMachine> = if config.backend.disabled {
        Arc::new(NullStateMachine)
    } else {
        Arc::new(InMemoryStateMachine::new())
    };

    let cluster = raftline::Cluster::start(&peer_ids, config.timing.to_timing_config(), state_machine);

    let leader = cluster
        .find_leader(50, Duration::from_millis(50))
        .await
        .ok_or_else(|| anyhow::anyhow!("no leader elected within the startup window"))?;
    tracing::info!(leader = %leader, "cluster converged on a leader");

    let handle = cluster.handle(leader).expect("leader id came from this cluster");
    let (index, completion) = handle
        .submit(Command::new(CommandType::NewUser, bytes::Bytes::new()))
        .await?;
    tracing::info!(index = %index, "submitted demo command, awaiting commit");
    let result = completion.await??;
    tracing::info!(?result, "demo command committed");

    cluster.stop().await;
    Ok(())
}
