use std::collections::HashMap;
use std::time::Duration;

use raftline_core::PeerId;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// A single cancellable, re-armable timer.
///
/// Firing delivers one value of `T` into the owner's event queue rather
/// than invoking a callback directly, matching the single-writer actor
/// shape in `raft.rs`: the timer itself never touches node state.
pub struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Cancel any in-flight firing. A no-op if already fired or never
    /// armed.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Arm the timer, cancelling any previous instance first so there is
    /// never more than one in flight.
    pub fn arm<T: Send + 'static>(&mut self, duration: Duration, sender: UnboundedSender<T>, event: T) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = sender.send(event);
        }));
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Randomized interval configuration, shared by the leader and election
/// timers.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutRange {
    pub min: Duration,
    pub max: Duration,
}

impl TimeoutRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }
}

/// The per-peer heartbeat timer table: "resetting a heartbeat
/// timer for peer p cancels and re-arms only p's timer; resetting with no
/// peer resets all peers."
#[derive(Default)]
pub struct HeartbeatTimers {
    timers: HashMap<PeerId, Timer>,
}

impl HeartbeatTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_one<T: Send + 'static>(
        &mut self,
        peer: PeerId,
        duration: Duration,
        sender: UnboundedSender<T>,
        event: T,
    ) {
        self.timers.entry(peer).or_insert_with(Timer::new).arm(duration, sender, event);
    }

    pub fn cancel_one(&mut self, peer: PeerId) {
        if let Some(timer) = self.timers.get_mut(&peer) {
            timer.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for timer in self.timers.values_mut() {
            timer.cancel();
        }
    }
}
