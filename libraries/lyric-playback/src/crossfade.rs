//! Crossfade state machine
//!
//! Automates node gains across the overlap of an outgoing and an incoming
//! track. Gains follow a quadratic ease-in-out:
//!
//! ```text
//! f(x) = 2x²           for x < 0.5
//! f(x) = -2x² + 4x - 1 otherwise
//!
//! incoming = f(x), outgoing = 1 - f(x), x = incoming position / overlap
//! ```
//!
//! The overlap is the remaining time of the outgoing track at the moment the
//! crossfade starts, so it is never longer than the configured length. The
//! crossfade ends once the incoming track reaches the configured length.

use crate::types::{NodeStatus, CROSSFADE_MIN_REMAINING};
use std::time::Duration;

/// Quadratic ease-in-out on `[0, 1]`, clamped
#[inline]
pub fn ease_in_out(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    if x < 0.5 {
        2.0 * x * x
    } else {
        -2.0 * x * x + 4.0 * x - 1.0
    }
}

/// Gains for both sides of an overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeGains {
    /// Gain of the incoming (new current) node
    pub incoming: f64,
    /// Gain of the outgoing (previous) node
    pub outgoing: f64,
}

/// Gains when the incoming node is at `incoming_position` within `overlap`
pub fn gains_at(incoming_position: Duration, overlap: Duration) -> FadeGains {
    let x = if overlap.is_zero() {
        1.0
    } else {
        incoming_position.as_secs_f64() / overlap.as_secs_f64()
    };
    let incoming = ease_in_out(x);

    FadeGains {
        incoming,
        outgoing: 1.0 - incoming,
    }
}

/// Everything the entry decision looks at, sampled on one tick
#[derive(Debug, Clone, Copy)]
pub struct EntryCheck {
    /// Crossfading enabled in settings
    pub enabled: bool,
    /// Configured crossfade length
    pub length: Duration,
    /// Status of the next slot
    pub next_status: NodeStatus,
    /// Current node is long enough
    pub current_eligible: bool,
    /// Next node is long enough
    pub next_eligible: bool,
    /// User sought close to the end of the current node
    pub interrupted: bool,
    /// Time left on the current node
    pub remaining: Duration,
}

impl EntryCheck {
    /// Whether a crossfade should start now
    pub fn should_enter(&self) -> bool {
        self.enabled
            && self.next_status == NodeStatus::Available
            && self.current_eligible
            && self.next_eligible
            && !self.interrupted
            && self.remaining <= self.length
            && self.remaining > CROSSFADE_MIN_REMAINING
    }
}

/// Crossfade state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeState {
    /// Normal playback
    #[default]
    Idle,

    /// Overlap in progress
    Crossfading {
        /// Actual overlap, snapshotted on entry
        overlap: Duration,
        /// Configured length, snapshotted on entry
        length: Duration,
    },
}

/// Outcome of a gain tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// Nothing to do
    Idle,
    /// Apply these gains and keep going
    Continue(FadeGains),
    /// Overlap done; incoming to full gain, stop the outgoing node
    Finish,
}

/// Crossfade state machine
#[derive(Debug, Default)]
pub struct CrossfadeMachine {
    state: CrossfadeState,
}

impl CrossfadeMachine {
    pub fn is_active(&self) -> bool {
        matches!(self.state, CrossfadeState::Crossfading { .. })
    }

    /// Start an overlap of `overlap`, ending when the incoming node reaches `length`
    pub fn enter(&mut self, overlap: Duration, length: Duration) {
        self.state = CrossfadeState::Crossfading {
            overlap: overlap.min(length),
            length,
        };
    }

    /// Gains for the incoming node at `incoming_position`
    pub fn step(&self, incoming_position: Duration) -> FadeStep {
        match self.state {
            CrossfadeState::Idle => FadeStep::Idle,
            CrossfadeState::Crossfading { length, .. } if incoming_position >= length => {
                FadeStep::Finish
            }
            CrossfadeState::Crossfading { overlap, .. } => {
                FadeStep::Continue(gains_at(incoming_position, overlap))
            }
        }
    }

    /// Back to idle; returns whether an overlap was in progress
    pub fn leave(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = CrossfadeState::Idle;
        was_active
    }
}
