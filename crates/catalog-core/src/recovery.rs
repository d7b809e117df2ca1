//! Rate-limited GPU context recovery.

use crate::constants::CONTEXT_RELOAD_DELAY_MS;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecoveryDecision {
    /// Rebuild after `delay_ms`.
    Schedule { delay_ms: i32 },
    /// A rebuild ran too recently; stay suspended.
    Suppressed,
    /// This loss was already handled.
    AlreadyHandled,
}

#[derive(Clone, Debug)]
pub struct ContextRecovery {
    min_interval_sec: f64,
    last_attempt: Option<f64>,
    lost: bool,
}

impl ContextRecovery {
    pub fn new(min_interval_sec: f64) -> Self {
        Self {
            min_interval_sec,
            last_attempt: None,
            lost: false,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Register a context loss at `now` seconds.
    pub fn on_lost(&mut self, now: f64) -> RecoveryDecision {
        if self.lost {
            return RecoveryDecision::AlreadyHandled;
        }
        self.lost = true;
        let allowed = self
            .last_attempt
            .map_or(true, |t| now - t > self.min_interval_sec);
        if !allowed {
            log::warn!("[gpu] context lost again within {}s; not rebuilding", self.min_interval_sec);
            return RecoveryDecision::Suppressed;
        }
        self.last_attempt = Some(now);
        RecoveryDecision::Schedule {
            delay_ms: CONTEXT_RELOAD_DELAY_MS,
        }
    }

    /// A scheduled rebuild failed. Stay lost and retry once the rate-limit
    /// window since the last attempt has passed.
    pub fn on_rebuild_failed(&mut self, now: f64) -> RecoveryDecision {
        self.lost = true;
        let since = self.last_attempt.map_or(self.min_interval_sec, |t| now - t);
        let wait_sec = (self.min_interval_sec - since).max(0.0);
        let delay_ms = (wait_sec * 1000.0).ceil() as i32 + CONTEXT_RELOAD_DELAY_MS;
        self.last_attempt = Some(now + delay_ms as f64 / 1000.0);
        RecoveryDecision::Schedule { delay_ms }
    }

    pub fn on_restored(&mut self) {
        self.lost = false;
    }
}
