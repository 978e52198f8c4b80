use std::time::{Duration, Instant};

/// Single shared cooldown for every actuation or notification decision
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    window: Duration,
    last_actuation: Option<Instant>,
}

impl CooldownPolicy {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_actuation: None,
        }
    }

    /// True when nothing has fired yet or the window has elapsed
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_actuation {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.window,
        }
    }

    /// Claim the cooldown if ready, restarting the window at `now`
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_ready(now) {
            self.last_actuation = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_actuation(&self) -> Option<Instant> {
        self.last_actuation
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
