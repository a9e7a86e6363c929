//! Throttled single-slot dispatcher
//!
//! Holds at most one pending command. Newer commands replace older unsent
//! ones (last write wins), and a tick sends the pending command only once
//! the throttle window since the previous attempt has passed. A fader sweep
//! therefore produces one request per window carrying the latest value.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::drivers::ServiceDriver;
use crate::interpreter::Command;

/// Result of a dispatcher tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending
    Idle,
    /// A command is pending but the throttle window has not elapsed
    Throttled,
    /// The pending command was sent successfully
    Sent,
    /// The pending command was attempted and failed; it is discarded
    Failed,
}

pub struct Dispatcher {
    driver: Arc<dyn ServiceDriver>,
    pending: Option<Command>,
    /// Time of the last send attempt (microseconds), None before the first
    last_sent_at_us: Option<i64>,
    /// Minimum gap between two attempts; zero or negative disables throttling
    min_interval_us: i64,
}

impl Dispatcher {
    pub fn new(driver: Arc<dyn ServiceDriver>, min_interval_us: i64) -> Self {
        Self {
            driver,
            pending: None,
            last_sent_at_us: None,
            min_interval_us,
        }
    }

    /// Replace the pending command
    pub fn submit(&mut self, command: Command) {
        if let Some(replaced) = self.pending.replace(command) {
            debug!("Coalesced unsent command: {}", replaced);
        }
    }

    pub fn pending(&self) -> Option<&Command> {
        self.pending.as_ref()
    }

    pub fn last_sent_at_us(&self) -> Option<i64> {
        self.last_sent_at_us
    }

    pub fn min_interval_us(&self) -> i64 {
        self.min_interval_us
    }

    fn window_elapsed(&self, now_us: i64) -> bool {
        if self.min_interval_us <= 0 {
            return true;
        }
        match self.last_sent_at_us {
            None => true,
            Some(last) => {
                let elapsed = now_us.saturating_sub(last);
                // A clock that stepped backwards must not hold the window shut
                elapsed < 0 || elapsed > self.min_interval_us
            }
        }
    }

    /// Send the pending command if the throttle window has elapsed
    ///
    /// The clock advances on every attempt, successful or not, and a failed
    /// command is dropped rather than retried.
    pub async fn tick(&mut self, now_us: i64) -> TickOutcome {
        if self.pending.is_some() && !self.window_elapsed(now_us) {
            return TickOutcome::Throttled;
        }
        let Some(command) = self.pending.take() else {
            return TickOutcome::Idle;
        };

        self.last_sent_at_us = Some(now_us);
        debug!("➡️  {} via {}", command, self.driver.name());

        match self
            .driver
            .call_service(&command.endpoint, &command.body)
            .await
        {
            Ok(()) => TickOutcome::Sent,
            Err(e) => {
                warn!("Service call {} failed: {}", command.endpoint, e);
                TickOutcome::Failed
            }
        }
    }
}
