use std::time::Duration;

use tokio::time::{sleep, Instant};

/// What the orchestrator just did to a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomAction {
    Join,
    Ping,
}

#[derive(Clone, Copy, Debug)]
pub struct PaceConfig {
    /// Minimum spacing after a join before the next room call.
    pub join_interval: Duration,
    /// Minimum spacing after a ping before the next room call.
    pub ping_interval: Duration,
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self {
            join_interval: Duration::from_secs(4),
            ping_interval: Duration::from_secs(2),
        }
    }
}

/// Spaces room calls so the remote service is not hammered.
///
/// Each completed action reserves a quiet period; `wait()` sleeps only for
/// whatever part of that period has not already elapsed.
#[derive(Debug)]
pub struct Pacer {
    cfg: PaceConfig,
    next: Instant,
}

impl Pacer {
    pub fn new(cfg: PaceConfig) -> Self {
        Self {
            cfg,
            next: Instant::now(),
        }
    }

    /// Record that `action` just completed.
    pub fn record(&mut self, action: RoomAction) {
        let interval = match action {
            RoomAction::Join => self.cfg.join_interval,
            RoomAction::Ping => self.cfg.ping_interval,
        };
        self.next = Instant::now() + interval;
    }

    /// Remaining quiet time before the next call may go out.
    pub fn remaining(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    pub async fn wait(&self) {
        let wait = self.remaining();
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}
