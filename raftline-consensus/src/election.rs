use std::time::Duration;

use crate::timer::TimeoutRange;

/// Timing knobs for one node.
///
/// `min_election_delay` suppresses election timer fires that land too
/// soon after the previous election started.
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    pub leader_timeout: TimeoutRange,
    pub election_timeout: TimeoutRange,
    pub heartbeat_interval: Duration,
    pub min_election_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            leader_timeout: TimeoutRange::new(Duration::from_millis(150), Duration::from_millis(300)),
            election_timeout: TimeoutRange::new(Duration::from_millis(150), Duration::from_millis(300)),
            heartbeat_interval: Duration::from_millis(50),
            min_election_delay: Duration::from_millis(100),
        }
    }
}
