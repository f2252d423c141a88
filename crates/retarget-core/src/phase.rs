// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Approaching / stance / walking lifecycle
//!
//! Pure state machine: callers pass the current time in and apply the
//! returned [`PhaseAction`] to every enabled channel. Transition table:
//!
//! | current     | requested   | action              | new phase   |
//! |-------------|-------------|---------------------|-------------|
//! | any         | Approaching | `RetuneApproaching` | Approaching |
//! | Approaching | Stance      | `RetuneWalking`     | Stance      |
//! | Approaching | Walking     | `RetuneWalking`     | Walking     |
//! | other       | X           | none                | X           |
//!
//! A step while approaching with `now - start > duration` retunes to walking
//! and forces Stance. The approach timer runs only after an explicit
//! `start_approaching` (or an Approaching request).

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Approaching,
    Stance,
    Walking,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Approaching => write!(f, "approaching"),
            Phase::Stance => write!(f, "stance"),
            Phase::Walking => write!(f, "walking"),
        }
    }
}

/// Smoother retune to apply on every enabled channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    RetuneApproaching,
    RetuneWalking,
}

#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    phase: Phase,
    approach_started_at: Option<f64>,
    approach_duration: f64,
    enabled: bool,
}

impl PhaseStateMachine {
    /// Machine for a client with smoothed channels; starts in Approaching
    pub fn new(approach_duration: f64) -> Self {
        Self {
            phase: Phase::Approaching,
            approach_started_at: None,
            approach_duration,
            enabled: true,
        }
    }

    /// Machine for a client without smoothed channels
    ///
    /// Starts in Stance and never enters Approaching.
    pub fn disabled() -> Self {
        Self {
            phase: Phase::Stance,
            approach_started_at: None,
            approach_duration: 0.0,
            enabled: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_approaching(&self) -> bool {
        self.phase == Phase::Approaching
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn approach_duration(&self) -> f64 {
        self.approach_duration
    }

    pub fn approach_started_at(&self) -> Option<f64> {
        self.approach_started_at
    }

    /// (Re)start the approach timer; the phase value is not changed
    pub fn start_approaching(&mut self, now: f64) -> Option<PhaseAction> {
        if !self.enabled {
            return None;
        }
        self.approach_started_at = Some(now);
        Some(PhaseAction::RetuneApproaching)
    }

    /// Apply an external phase request
    pub fn request(&mut self, requested: Phase, now: f64) -> Option<PhaseAction> {
        if !self.enabled {
            if requested != Phase::Approaching {
                self.phase = requested;
            }
            return None;
        }

        let action = match (self.phase, requested) {
            (_, Phase::Approaching) => self.start_approaching(now),
            (Phase::Approaching, _) => Some(PhaseAction::RetuneWalking),
            _ => None,
        };
        self.phase = requested;
        action
    }

    /// Per-tick expiry check
    pub fn step(&mut self, now: f64) -> Option<PhaseAction> {
        if self.phase != Phase::Approaching {
            return None;
        }
        let started = self.approach_started_at?;
        if now - started > self.approach_duration {
            self.phase = Phase::Stance;
            return Some(PhaseAction::RetuneWalking);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let machine = PhaseStateMachine::new(4.0);
        assert_eq!(machine.phase(), Phase::Approaching);
        assert!(machine.is_approaching());
        assert_eq!(machine.approach_started_at(), None);
    }

    #[test]
    fn test_no_expiry_before_timer_starts() {
        let mut machine = PhaseStateMachine::new(1.0);
        assert_eq!(machine.step(100.0), None);
        assert_eq!(machine.phase(), Phase::Approaching);
    }

    #[test]
    fn test_expiry_is_strictly_after_duration() {
        let mut machine = PhaseStateMachine::new(2.0);
        assert_eq!(
            machine.start_approaching(10.0),
            Some(PhaseAction::RetuneApproaching)
        );

        assert_eq!(machine.step(12.0), None);
        assert!(machine.is_approaching());

        assert_eq!(machine.step(12.01), Some(PhaseAction::RetuneWalking));
        assert_eq!(machine.phase(), Phase::Stance);

        // Expiry fires once
        assert_eq!(machine.step(20.0), None);
    }

    #[test]
    fn test_walking_request_from_approaching_retunes_once() {
        let mut machine = PhaseStateMachine::new(2.0);
        machine.start_approaching(0.0);

        assert_eq!(
            machine.request(Phase::Walking, 0.5),
            Some(PhaseAction::RetuneWalking)
        );
        assert_eq!(machine.phase(), Phase::Walking);
        assert_eq!(machine.step(5.0), None);
    }

    #[test]
    fn test_stance_request_from_approaching() {
        let mut machine = PhaseStateMachine::new(2.0);
        assert_eq!(
            machine.request(Phase::Stance, 0.0),
            Some(PhaseAction::RetuneWalking)
        );
        assert_eq!(machine.phase(), Phase::Stance);
    }

    #[test]
    fn test_other_requests_only_set_phase() {
        let mut machine = PhaseStateMachine::new(2.0);
        machine.request(Phase::Stance, 0.0);

        assert_eq!(machine.request(Phase::Walking, 1.0), None);
        assert_eq!(machine.phase(), Phase::Walking);
        assert_eq!(machine.request(Phase::Stance, 2.0), None);
        assert_eq!(machine.phase(), Phase::Stance);
    }

    #[test]
    fn test_repeated_approaching_request_restarts_timer() {
        let mut machine = PhaseStateMachine::new(2.0);
        assert_eq!(
            machine.request(Phase::Approaching, 0.0),
            Some(PhaseAction::RetuneApproaching)
        );
        assert_eq!(
            machine.request(Phase::Approaching, 1.5),
            Some(PhaseAction::RetuneApproaching)
        );
        assert_eq!(machine.approach_started_at(), Some(1.5));

        // 2.5s after the first request but only 1.0s after the restart
        assert_eq!(machine.step(2.5), None);
        assert_eq!(machine.step(3.6), Some(PhaseAction::RetuneWalking));
    }

    #[test]
    fn test_start_approaching_keeps_phase() {
        let mut machine = PhaseStateMachine::new(2.0);
        machine.request(Phase::Walking, 0.0);

        assert_eq!(
            machine.start_approaching(1.0),
            Some(PhaseAction::RetuneApproaching)
        );
        assert_eq!(machine.phase(), Phase::Walking);
    }

    #[test]
    fn test_disabled_machine_never_approaches() {
        let mut machine = PhaseStateMachine::disabled();
        assert_eq!(machine.phase(), Phase::Stance);

        assert_eq!(machine.start_approaching(0.0), None);
        assert_eq!(machine.request(Phase::Approaching, 0.0), None);
        assert_eq!(machine.phase(), Phase::Stance);

        assert_eq!(machine.request(Phase::Walking, 1.0), None);
        assert_eq!(machine.phase(), Phase::Walking);
        assert_eq!(machine.step(100.0), None);
    }
}
