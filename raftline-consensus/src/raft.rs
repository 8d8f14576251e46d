use std::sync::Arc;
use std::time::Instant;

use raftline_core::{Command, LogIndex, PeerId, RaftlineError, RequestRouter, Result, StateMachine};
use raftline_replication::{compute_commit_index, ProgressTable};
use raftline_rpc::{Message, PeerTransport, WireLogEntry};
use tokio::sync::{mpsc, oneshot};

use crate::applier;
use crate::election::TimingConfig;
use crate::log::LogRecord;
use crate::state::{NodeState, Role};
use crate::timer::{HeartbeatTimers, Timer};
use crate::CompletionResult;

/// Static configuration for one node, restricted to what the consensus
/// core itself needs.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    pub node_id: PeerId,
    pub peers: Vec<PeerId>,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Copy)]
enum TimerEvent {
    LeaderFired,
    ElectionFired,
    HeartbeatFired(PeerId),
}

enum ActorEvent {
    Submit {
        command: Command,
        respond_to: oneshot::Sender<Result<(LogIndex, oneshot::Receiver<CompletionResult>)>>,
    },
    IsLeader(oneshot::Sender<bool>),
    LeaderId(oneshot::Sender<Option<PeerId>>),
    Status(oneshot::Sender<NodeStatus>),
    Stop,
}

/// A point-in-time snapshot of a node's consensus state, for monitoring
/// and tests. Not part of the RPC surface; every field round-trips
/// through the actor mailbox like any other query.
#[derive(Debug, Clone, Copy)]
pub struct NodeStatus {
    pub role: Role,
    pub current_term: u64,
    pub current_leader_id: Option<PeerId>,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub last_log_index: LogIndex,
}

/// A cloneable handle to a running node. This is the only way callers
/// outside the actor task touch consensus state; every call round-trips
/// through the actor's mailbox, so `NodeState` itself is never shared.
#[derive(Clone)]
pub struct RaftHandle {
    event_tx: mpsc::UnboundedSender<ActorEvent>,
}

impl RaftHandle {
    /// Submit a command. Returns the index it was assigned and a
    /// receiver that resolves once the entry commits and applies.
    /// Non-leaders reject with `NotLeader(currentLeaderId)`.
    pub async fn submit(
        &self,
        command: Command,
    ) -> Result<(LogIndex, oneshot::Receiver<CompletionResult>)> {
        let (tx, rx) = oneshot::channel();
        self.event_tx
            .send(ActorEvent::Submit {
                command,
                respond_to: tx,
            })
            .map_err(|_| RaftlineError::ConsensusError("node is stopped".into()))?;
        rx.await
            .map_err(|_| RaftlineError::ConsensusError("node stopped before responding".into()))?
    }

    pub async fn is_leader(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.event_tx.send(ActorEvent::IsLeader(tx)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn leader_id(&self) -> Option<PeerId> {
        let (tx, rx) = oneshot::channel();
        if self.event_tx.send(ActorEvent::LeaderId(tx)).is_err() {
            return None;
        }
        rx.await.unwrap_or(None)
    }

    /// A point-in-time status snapshot (role, term, commit/apply
    /// progress). `None` if the node has already stopped.
    pub async fn status(&self) -> Option<NodeStatus> {
        let (tx, rx) = oneshot::channel();
        if self.event_tx.send(ActorEvent::Status(tx)).is_err() {
            return None;
        }
        rx.await.ok()
    }

    /// Stop the actor loop. Drains no in-flight applier invocation beyond
    /// the one already running.
    pub fn stop(&self) {
        let _ = self.event_tx.send(ActorEvent::Stop);
    }
}

/// The consensus actor for one node: owns `NodeState` exclusively and
/// serializes every inbound RPC, timer fire, and submission through a
/// single task.
pub struct RaftNode {
    node_id: PeerId,
    peers: Vec<PeerId>,
    timing: TimingConfig,
    state: NodeState,
    transport: Arc<dyn PeerTransport>,
    state_machine: Arc<dyn StateMachine>,
    router: Arc<dyn RequestRouter>,

    leader_timer: Timer,
    election_timer: Timer,
    heartbeat_timers: HeartbeatTimers,
    last_election_start: Option<Instant>,
    vote_message_num: std::collections::HashMap<PeerId, u64>,

    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    event_tx: mpsc::UnboundedSender<ActorEvent>,
    event_rx: mpsc::UnboundedReceiver<ActorEvent>,
    message_rx: mpsc::UnboundedReceiver<Message>,
}

impl RaftNode {
    pub fn new(
        config: RaftConfig,
        transport: Arc<dyn PeerTransport>,
        state_machine: Arc<dyn StateMachine>,
        router: Arc<dyn RequestRouter>,
        message_rx: mpsc::UnboundedReceiver<Message>,
    ) -> (RaftHandle, Self) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = RaftHandle {
            event_tx: event_tx.clone(),
        };
        let node = Self {
            node_id: config.node_id,
            peers: config.peers,
            timing: config.timing,
            state: NodeState::new(config.node_id),
            transport,
            state_machine,
            router,
            leader_timer: Timer::new(),
            election_timer: Timer::new(),
            heartbeat_timers: HeartbeatTimers::new(),
            last_election_start: None,
            vote_message_num: std::collections::HashMap::new(),
            timer_tx,
            timer_rx,
            event_tx,
            event_rx,
            message_rx,
        };
        (handle, node)
    }

    /// Run the actor loop until `stop()` is called or a fatal invariant
    /// violation is reported.
    pub async fn run(mut self) {
        self.arm_leader_timer();

        enum Next {
            Message(Message),
            Timer(TimerEvent),
            Actor(ActorEvent),
            Closed,
        }

        loop {
            let next = tokio::select! {
                m = self.message_rx.recv() => m.map(Next::Message).unwrap_or(Next::Closed),
                t = self.timer_rx.recv() => t.map(Next::Timer).unwrap_or(Next::Closed),
                e = self.event_rx.recv() => e.map(Next::Actor).unwrap_or(Next::Closed),
            };

            let result = match next {
                Next::Message(msg) => self.handle_inbound(msg).await,
                Next::Timer(timer_event) => {
                    self.handle_timer(timer_event).await;
                    Ok(())
                }
                Next::Actor(ActorEvent::Stop) => break,
                Next::Actor(event) => {
                    self.handle_actor_event(event).await;
                    Ok(())
                }
                Next::Closed => break,
            };

            if let Err(err) = result {
                tracing::error!(error = %err, node = %self.node_id, "fatal consensus error, stopping node");
                break;
            }
        }
    }

    // -- term-bump rule -----------------------------------------------------

    fn term_bump(&mut self, inbound_term: u64, sender: PeerId, is_append_entries_request: bool) {
        if inbound_term <= self.state.persistent.current_term {
            return;
        }

        match self.state.role {
            Role::Leader => self.heartbeat_timers.cancel_all(),
            Role::Candidate => {
                self.heartbeat_timers.cancel_all();
                self.election_timer.cancel();
            }
            Role::Follower => {}
        }

        self.state.role = Role::Follower;
        self.state.persistent.current_term = inbound_term;
        self.state.last_message_num = -1;
        self.state.persistent.voted_for = None;
        self.state.leader = None;
        self.state.current_leader_id = if is_append_entries_request {
            Some(sender)
        } else {
            None
        };

        self.arm_leader_timer();
        self.router.on_leadership_change(self.state.current_leader_id);
    }

    async fn handle_inbound(&mut self, msg: Message) -> Result<()> {
        let sender = msg.sender_id();
        let term = msg.term();
        let is_append_entries_request = matches!(msg, Message::AppendEntriesRequest { .. });
        self.term_bump(term, sender, is_append_entries_request);

        match msg {
            Message::AppendEntriesRequest {
                term,
                message_num,
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit,
                ..
            } => {
                self.on_append_entries_request(
                    sender,
                    term,
                    message_num,
                    prev_log_index,
                    prev_log_term,
                    entries,
                    leader_commit,
                )
                .await
            }
            Message::AppendEntriesResponse {
                term, success, ..
            } => {
                self.on_append_entries_response(sender, term, success).await;
                Ok(())
            }
            Message::RequestVoteRequest {
                term,
                message_num,
                last_log_index,
                last_log_term,
                ..
            } => {
                self.on_request_vote_request(sender, term, message_num, last_log_index, last_log_term)
                    .await;
                Ok(())
            }
            Message::RequestVoteResponse { term, vote_granted, .. } => {
                self.on_request_vote_response(sender, term, vote_granted).await;
                Ok(())
            }
            Message::Snapshot { .. } => {
                tracing::warn!(peer = %sender, "snapshot RPC received but not implemented");
                Ok(())
            }
        }
    }

    // -- follower behavior ---------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn on_append_entries_request(
        &mut self,
        sender: PeerId,
        term: u64,
        message_num: u64,
        prev_log_index: LogIndex,
        prev_log_term: u64,
        entries: Vec<WireLogEntry>,
        leader_commit: LogIndex,
    ) -> Result<()> {
        match self.state.role {
            Role::Leader => {
                // A stale leader; reject.
                self.reply_append(sender, false).await;
                return Ok(());
            }
            Role::Candidate => {
                if term < self.state.persistent.current_term {
                    self.reply_append(sender, false).await;
                    return Ok(());
                }
                // term == current_term: a leader for this term already
                // exists. Revert to Follower without bumping the term, but
                // otherwise mirror the term-bump path so a stale
                // last_message_num carried over from whatever term this
                // node last followed someone in can't make the new
                // leader's first AppendEntries look like a stale retransmit.
                self.heartbeat_timers.cancel_all();
                self.election_timer.cancel();
                self.state.role = Role::Follower;
                self.state.last_message_num = -1;
                self.state.current_leader_id = Some(sender);
                self.arm_leader_timer();
            }
            Role::Follower => {}
        }

        if term < self.state.persistent.current_term {
            self.reply_append(sender, false).await;
            return Ok(());
        }

        if (message_num as i64) <= self.state.last_message_num {
            return Ok(()); // stale duplicate/retransmit; ignore
        }

        match self.state.current_leader_id {
            None => self.state.current_leader_id = Some(sender),
            Some(leader) if leader != sender => return Ok(()), // two claimants; ignore
            _ => {}
        }

        if prev_log_index.0 >= 0 {
            let matches = self.state.persistent.log.term_at(prev_log_index) == Some(prev_log_term);
            if !matches {
                self.reply_append(sender, false).await;
                self.arm_leader_timer();
                return Ok(());
            }
        }

        if !entries.is_empty() {
            self.append_with_conflict_check(prev_log_index, &entries)?;
        }

        if leader_commit.0 > self.state.volatile.commit_index.0 {
            let last_index = self.state.persistent.log.last_index();
            self.state.volatile.commit_index = LogIndex::new(leader_commit.0.min(last_index.0));
            self.run_applier().await?;
        }

        self.reply_append(sender, true).await;
        self.state.last_message_num = message_num as i64;
        self.arm_leader_timer();
        Ok(())
    }

    fn append_with_conflict_check(
        &mut self,
        prev_log_index: LogIndex,
        entries: &[WireLogEntry],
    ) -> Result<()> {
        for (i, entry) in entries.iter().enumerate() {
            let j = LogIndex::new(prev_log_index.0 + 1 + i as i64);
            match self.state.persistent.log.term_at(j) {
                Some(existing_term) => {
                    if existing_term != entry.term {
                        self.state.persistent.log.truncate_from(j);
                        self.clamp_commit_and_applied()?;
                        self.state.persistent.log.append(LogRecord::new(
                            entry.term,
                            entry.command_type,
                            entry.payload.clone(),
                        ));
                    }
                }
                None => {
                    self.state.persistent.log.append(LogRecord::new(
                        entry.term,
                        entry.command_type,
                        entry.payload.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Clamp `commitIndex`/`lastApplied` after a truncation; a
    /// `lastApplied` decrease is a correctness violation and is surfaced.
    fn clamp_commit_and_applied(&mut self) -> Result<()> {
        let last_index = self.state.persistent.log.last_index();
        if self.state.volatile.commit_index.0 > last_index.0 {
            self.state.volatile.commit_index = last_index;
        }
        let before = self.state.volatile.last_applied;
        if self.state.volatile.last_applied.0 > self.state.volatile.commit_index.0 {
            self.state.volatile.last_applied = self.state.volatile.commit_index;
        }
        if self.state.volatile.last_applied.0 < before.0 {
            tracing::error!(
                before = %before,
                after = %self.state.volatile.last_applied,
                "lastApplied decreased during log truncation"
            );
            return Err(RaftlineError::ConsensusError(format!(
                "lastApplied decreased from {before} to {}",
                self.state.volatile.last_applied
            )));
        }
        Ok(())
    }

    async fn reply_append(&self, dest: PeerId, success: bool) {
        let msg = Message::AppendEntriesResponse {
            sender_id: self.node_id,
            term: self.state.persistent.current_term,
            success,
            commit_index: self.state.volatile.commit_index,
            last_applied: self.state.volatile.last_applied,
        };
        if let Err(err) = self.transport.send(dest, msg).await {
            tracing::warn!(error = %err, peer = %dest, "append response send failed");
        }
    }

    /// RequestVote request handling. Candidates/leaders already have
    /// `votedFor = self` in the current term, so this naturally refuses
    /// competing candidates without a role check.
    async fn on_request_vote_request(
        &mut self,
        sender: PeerId,
        term: u64,
        _message_num: u64,
        last_log_index: LogIndex,
        last_log_term: u64,
    ) {
        if term < self.state.persistent.current_term {
            self.reply_vote(sender, false).await;
            return;
        }

        let can_vote = self.state.persistent.voted_for.is_none();
        let up_to_date = self.log_up_to_date(last_log_index, last_log_term);

        if can_vote && up_to_date {
            self.state.persistent.voted_for = Some(sender);
            self.arm_leader_timer();
            self.reply_vote(sender, true).await;
        } else {
            self.reply_vote(sender, false).await;
        }
    }

    /// "At least as up to date": our log is shorter than the
    /// candidate's, or our entry at the candidate's last index has a
    /// matching term. Index `-1` (an empty log) reports a virtual term-0
    /// root on both sides, so two empty logs compare equal.
    fn log_up_to_date(&self, candidate_last_index: LogIndex, candidate_last_term: u64) -> bool {
        let our_len = self.state.persistent.log.len() as i64;
        if our_len < candidate_last_index.0 + 1 {
            return true;
        }
        self.state.persistent.log.term_at(candidate_last_index) == Some(candidate_last_term)
    }

    async fn reply_vote(&self, dest: PeerId, vote_granted: bool) {
        let msg = Message::RequestVoteResponse {
            sender_id: self.node_id,
            term: self.state.persistent.current_term,
            vote_granted,
        };
        if let Err(err) = self.transport.send(dest, msg).await {
            tracing::warn!(error = %err, peer = %dest, "vote response send failed");
        }
    }

    // -- candidate / leader behavior -----------------------------------------

    async fn on_append_entries_response(&mut self, sender: PeerId, term: u64, success: bool) {
        if !self.state.is_leader() || term < self.state.persistent.current_term {
            return;
        }
        let tracked = self
            .state
            .leader
            .as_ref()
            .map(|table| table.get(sender).is_some())
            .unwrap_or(false);
        if !tracked {
            return;
        }

        if success {
            if let Some(table) = self.state.leader.as_mut() {
                if let Some(progress) = table.get_mut(sender) {
                    progress.on_append_success();
                }
            }
            self.recompute_commit_index();

            let send_more = match self.state.leader.as_ref().and_then(|table| table.get(sender)) {
                Some(progress) => self.state.persistent.log.len() as i64 > progress.next_index.0,
                None => false,
            };
            if send_more {
                self.send_append_entries_to(sender).await;
            }
            if let Err(err) = self.run_applier().await {
                tracing::error!(error = %err, "applier failed after append success");
            }
        } else {
            if let Some(table) = self.state.leader.as_mut() {
                if let Some(progress) = table.get_mut(sender) {
                    progress.on_append_failure();
                }
            }
            self.arm_heartbeat_timer(sender);
        }
    }

    fn recompute_commit_index(&mut self) {
        let match_indices = match self.state.leader.as_ref() {
            Some(table) => table.match_indices(),
            None => return,
        };
        let new_commit = compute_commit_index(
            self.state.persistent.log.last_index(),
            &match_indices,
            self.state.volatile.commit_index,
            self.state.persistent.current_term,
            |idx| self.state.persistent.log.term_at(idx),
        );
        self.state.volatile.commit_index = new_commit;
    }

    async fn send_append_entries_to(&mut self, peer: PeerId) {
        let progress = match self.state.leader.as_ref().and_then(|table| table.get(peer)) {
            Some(progress) => *progress,
            None => return,
        };

        let prev_log_index = progress.next_index.prev();
        let prev_log_term = self.state.persistent.log.term_at(prev_log_index).unwrap_or(0);
        let entries: Vec<WireLogEntry> = self
            .state
            .persistent
            .log
            .slice_from(progress.next_index)
            .iter()
            .map(|record| WireLogEntry {
                term: record.term,
                command_type: record.command_type,
                payload: record.payload.clone(),
            })
            .collect();

        let msg = Message::AppendEntriesRequest {
            sender_id: self.node_id,
            term: self.state.persistent.current_term,
            message_num: progress.message_num,
            prev_log_index,
            prev_log_term,
            entries,
            leader_commit: self.state.volatile.commit_index,
        };
        if let Err(err) = self.transport.send(peer, msg).await {
            tracing::warn!(error = %err, peer = %peer, "append entries send failed");
        }

        let last_index = self.state.persistent.log.last_index();
        if let Some(table) = self.state.leader.as_mut() {
            if let Some(progress) = table.get_mut(peer) {
                progress.last_sent = last_index;
            }
        }
        self.arm_heartbeat_timer(peer);
    }

    async fn on_request_vote_response(&mut self, _sender: PeerId, term: u64, vote_granted: bool) {
        if self.state.role != Role::Candidate || term != self.state.persistent.current_term {
            return;
        }
        if !vote_granted {
            return;
        }
        self.state.votes_gathered += 1;
        let cluster_size = self.peers.len() + 1;
        if self.state.votes_gathered as usize > cluster_size / 2 {
            self.become_leader().await;
        }
    }

    async fn become_leader(&mut self) {
        self.state.role = Role::Leader;
        self.state.current_leader_id = Some(self.node_id);

        let last_log_index = self.state.persistent.log.last_index();
        let mut table = ProgressTable::new();
        table.reinit_all(&self.peers, last_log_index);
        self.state.leader = Some(table);

        self.election_timer.cancel();

        for peer in self.peers.clone() {
            self.send_append_entries_to(peer).await;
        }
    }

    async fn start_election(&mut self) {
        self.leader_timer.cancel();
        self.state.role = Role::Candidate;
        self.state.persistent.current_term += 1;
        self.state.persistent.voted_for = Some(self.node_id);
        self.state.current_leader_id = None;
        self.state.votes_gathered = 1;
        self.state.leader = None;
        self.last_election_start = Some(Instant::now());

        let term = self.state.persistent.current_term;
        let last_log_index = self.state.persistent.log.last_index();
        let last_log_term = self.state.persistent.log.term_at(last_log_index).unwrap_or(0);

        for peer in self.peers.clone() {
            self.send_vote_request(peer, term, last_log_index, last_log_term).await;
        }

        self.arm_election_timer();
        self.arm_heartbeat_timers_all();
    }

    async fn send_vote_request(&mut self, peer: PeerId, term: u64, last_log_index: LogIndex, last_log_term: u64) {
        let message_num = {
            let counter = self.vote_message_num.entry(peer).or_insert(0);
            let n = *counter;
            *counter += 1;
            n
        };
        let msg = Message::RequestVoteRequest {
            sender_id: self.node_id,
            term,
            message_num,
            last_log_index,
            last_log_term,
        };
        if let Err(err) = self.transport.send(peer, msg).await {
            tracing::warn!(error = %err, peer = %peer, "vote request send failed");
        }
    }

    // -- timers ------------------------------------------------------------

    async fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::LeaderFired => {
                if self.state.role == Role::Follower {
                    self.start_election().await;
                }
            }
            TimerEvent::ElectionFired => {
                if self.state.role != Role::Candidate {
                    return;
                }
                let suppressed = self
                    .last_election_start
                    .map(|t| t.elapsed() < self.timing.min_election_delay)
                    .unwrap_or(false);
                if suppressed {
                    self.arm_election_timer();
                } else {
                    self.start_election().await;
                }
            }
            TimerEvent::HeartbeatFired(peer) => match self.state.role {
                Role::Leader => self.send_append_entries_to(peer).await,
                Role::Candidate => {
                    let term = self.state.persistent.current_term;
                    let last_log_index = self.state.persistent.log.last_index();
                    let last_log_term = self.state.persistent.log.term_at(last_log_index).unwrap_or(0);
                    self.send_vote_request(peer, term, last_log_index, last_log_term).await;
                    self.arm_heartbeat_timer(peer);
                }
                Role::Follower => {}
            },
        }
    }

    fn arm_leader_timer(&mut self) {
        let duration = self.timing.leader_timeout.sample();
        self.leader_timer.arm(duration, self.timer_tx.clone(), TimerEvent::LeaderFired);
    }

    fn arm_election_timer(&mut self) {
        let duration = self.timing.election_timeout.sample();
        self.election_timer
            .arm(duration, self.timer_tx.clone(), TimerEvent::ElectionFired);
    }

    fn arm_heartbeat_timer(&mut self, peer: PeerId) {
        let duration = self.timing.heartbeat_interval;
        self.heartbeat_timers
            .arm_one(peer, duration, self.timer_tx.clone(), TimerEvent::HeartbeatFired(peer));
    }

    fn arm_heartbeat_timers_all(&mut self) {
        for peer in self.peers.clone() {
            self.arm_heartbeat_timer(peer);
        }
    }

    // -- applier -----------------------------------------------------------

    async fn run_applier(&mut self) -> Result<()> {
        applier::run(&mut self.state, &self.state_machine, &self.router).await
    }

    // -- submission entry point ---------------------------------------------

    async fn handle_submit(
        &mut self,
        command: Command,
        respond_to: oneshot::Sender<Result<(LogIndex, oneshot::Receiver<CompletionResult>)>>,
    ) {
        if !self.state.is_leader() {
            let hint = self.state.current_leader_id.map(|p| p.as_u64());
            let _ = respond_to.send(Err(RaftlineError::NotLeader(hint)));
            return;
        }

        let (tx, rx) = oneshot::channel();
        let mut record = LogRecord::new(
            self.state.persistent.current_term,
            command.command_type,
            command.payload,
        );
        record.completion_handle = Some(tx);
        self.state.persistent.log.append(record);
        let index = self.state.persistent.log.last_index();
        let _ = respond_to.send(Ok((index, rx)));

        for peer in self.peers.clone() {
            let ready = match self.state.leader.as_ref().and_then(|table| table.get(peer)) {
                Some(progress) => self.state.persistent.log.len() as i64 > progress.next_index.0,
                None => false,
            };
            if ready {
                self.send_append_entries_to(peer).await;
            }
        }
    }

    async fn handle_actor_event(&mut self, event: ActorEvent) {
        match event {
            ActorEvent::Submit { command, respond_to } => self.handle_submit(command, respond_to).await,
            ActorEvent::IsLeader(tx) => {
                let _ = tx.send(self.state.is_leader());
            }
            ActorEvent::LeaderId(tx) => {
                let _ = tx.send(self.state.current_leader_id);
            }
            ActorEvent::Status(tx) => {
                let _ = tx.send(NodeStatus {
                    role: self.state.role,
                    current_term: self.state.persistent.current_term,
                    current_leader_id: self.state.current_leader_id,
                    commit_index: self.state.volatile.commit_index,
                    last_applied: self.state.volatile.last_applied,
                    last_log_index: self.state.persistent.log.last_index(),
                });
            }
            ActorEvent::Stop => {}
        }
    }
}
