// THEORY:
// The per-frame "something changed" signal flickers at the frame rate. A UI that showed
// it directly would strobe. The `MotionStateTracker` smooths it into a two-state
// indicator with a sliding-window debounce:
//
// - Any frame that reports a change puts the tracker in `Moving` at once and pushes a
//   single pending deadline out to `now + debounce`. Later changes keep pushing the same
//   deadline out. They replace it and never stack a second one.
// - Only the deadline elapsing brings the tracker back to `NotMoving`. A quiet frame
//   on its own does nothing.
//
// The tracker never sleeps or spawns anything. The owner asks for `deadline()`, waits
// for it on whatever clock it runs, and calls `poll(now)`. That keeps the state machine
// testable with plain instants.

use std::time::Duration;
use tokio::time::Instant;

/// The UI-visible motion indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    Moving,
    #[default]
    NotMoving,
}

impl MotionState {
    /// The class-like marker a presentation layer toggles between.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Moving => "moving",
            Self::NotMoving => "not-moving",
        }
    }
}

/// A change of `MotionState`, reported once per actual transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionTransition {
    pub from: MotionState,
    pub to: MotionState,
}

/// Debounced moving / not-moving state machine with one owned timer handle.
#[derive(Debug, Clone)]
pub struct MotionStateTracker {
    state: MotionState,
    debounce: Duration,
    /// The single pending transition back to `NotMoving`, if any.
    deadline: Option<Instant>,
}

impl MotionStateTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: MotionState::NotMoving,
            debounce,
            deadline: None,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// When the pending transition to `NotMoving` is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Feeds one frame's change signal. A change (re)starts the debounce window.
    pub fn on_frame(&mut self, changed: bool, now: Instant) -> Option<MotionTransition> {
        if !changed {
            return None;
        }
        self.deadline = Some(now + self.debounce);
        self.enter(MotionState::Moving)
    }

    /// Fires the pending transition if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<MotionTransition> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.enter(MotionState::NotMoving)
            }
            _ => None,
        }
    }

    /// Drops the pending deadline without transitioning.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    fn enter(&mut self, next: MotionState) -> Option<MotionTransition> {
        if self.state == next {
            return None;
        }
        let transition = MotionTransition {
            from: self.state,
            to: next,
        };
        self.state = next;
        Some(transition)
    }
}
