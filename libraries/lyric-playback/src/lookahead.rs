//! Lookahead prefetcher state
//!
//! Tracks the "next" slot through
//! `Unavailable -> Preparing -> Available`, or `Preparing -> Failed` once the
//! initial attempt and [`MAX_PREPARE_RETRIES`] retries all failed.
//!
//! Every preparation carries a generation number. Anything that invalidates
//! the prepared track bumps the generation, so a creation that resolves later
//! is recognised as stale and discarded on arrival instead of being aborted
//! mid-flight.

use crate::types::{NodeStatus, LOOKAHEAD_WINDOW, MAX_PREPARE_RETRIES, PREPARE_RETRY_DELAY};
use std::time::Duration;
use tokio::task::JoinHandle;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Attempt belonged to a superseded preparation
    Ignore,

    /// Schedule retry number `attempt` after `delay`
    Retry {
        /// 1-based retry number
        attempt: u32,
        /// Delay before the retry
        delay: Duration,
    },

    /// Out of retries; status is now `Failed`
    GiveUp,
}

/// Prefetch state for the next slot
#[derive(Debug, Default)]
pub struct Lookahead {
    status: NodeStatus,
    generation: u64,
    failures: u32,
    retry: Option<JoinHandle<()>>,
}

impl Lookahead {
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a tick with `remaining` on the current node should start a preparation
    pub fn should_prepare(&self, remaining: Duration) -> bool {
        self.status == NodeStatus::Unavailable && remaining < LOOKAHEAD_WINDOW
    }

    /// Start a new preparation, superseding any earlier one
    pub fn begin(&mut self) -> u64 {
        self.cancel_retry();
        self.generation += 1;
        self.failures = 0;
        self.status = NodeStatus::Preparing;
        self.generation
    }

    /// Whether `generation` is the live preparation
    pub fn is_current(&self, generation: u64) -> bool {
        self.status == NodeStatus::Preparing && self.generation == generation
    }

    /// Mark the preparation available; false if `generation` is stale
    pub fn complete(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.retry = None;
        self.status = NodeStatus::Available;
        true
    }

    /// Record a failed attempt for `generation`
    pub fn record_failure(&mut self, generation: u64) -> FailureAction {
        if !self.is_current(generation) {
            return FailureAction::Ignore;
        }

        self.failures += 1;
        if self.failures > MAX_PREPARE_RETRIES {
            self.retry = None;
            self.status = NodeStatus::Failed;
            return FailureAction::GiveUp;
        }

        FailureAction::Retry {
            attempt: self.failures,
            delay: PREPARE_RETRY_DELAY,
        }
    }

    /// Keep the pending retry so it can be cancelled
    pub fn set_retry(&mut self, handle: JoinHandle<()>) {
        self.cancel_retry();
        self.retry = Some(handle);
    }

    /// Drop any preparation; stale results will be discarded
    pub fn reset(&mut self) {
        self.cancel_retry();
        self.generation += 1;
        self.failures = 0;
        self.status = NodeStatus::Unavailable;
    }

    fn cancel_retry(&mut self) {
        if let Some(handle) = self.retry.take() {
            handle.abort();
        }
    }
}
