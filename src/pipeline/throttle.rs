use std::time::{Duration, Instant};

/// Admits at most one frame per interval, measured from the last admitted
/// frame. A frame arriving exactly one interval later is still inside the
/// window. Rejected frames do not move the window.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Whether a frame at `now` would be admitted. Does not move the window.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => true,
        }
    }

    /// Start a new window at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    pub fn try_accept(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.mark(now);
        true
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
