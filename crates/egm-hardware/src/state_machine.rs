//! Logical device state machine.
//!
//! Every adapter owns one [`StateMachine`]. Its state changes only through
//! [`StateMachine::fire`]; a trigger that the current state does not permit
//! is rejected, logged, and leaves the state untouched.
//!
//! # States
//!
//! - `Uninitialized`: constructed, inspection not started (or failed)
//! - `Inspecting`: implementation is probing the hardware
//! - `Initializing`: device-specific setup (e.g. region/template definition)
//! - `Idle`: enabled, ready to accept an operation
//! - `Busy`: an operation (e.g. a print) is outstanding
//! - `Disabled`: initialized but unavailable
//! - `Disconnected`: communication with the hardware lost
//!
//! # Valid Transitions
//!
//! - Uninitialized → Inspecting → Initializing → Idle/Disabled
//! - Inspecting/Initializing → Uninitialized (inspection failed)
//! - Idle ⇄ Busy, Idle/Busy → Disabled → Idle
//! - any state → Disconnected → Inspecting
//!
//! `Initialized` is dynamic: the target is `Idle` when the adapter reports
//! itself enabled at the moment of firing, `Disabled` otherwise. `Enable` and
//! `Disable` are re-entrant while `Inspecting`/`Initializing`: the state does
//! not change but the transition is accepted so its side effects run.
//!
//! # Examples
//!
//! ```
//! use egm_hardware::state_machine::{LogicalState, StateMachine, TransitionContext, Trigger};
//!
//! let mut machine = StateMachine::new();
//! let enabled = TransitionContext { enabled: true };
//!
//! assert!(machine.fire(Trigger::Inspecting, enabled).is_some());
//! assert!(machine.fire(Trigger::Initializing, enabled).is_some());
//! assert!(machine.fire(Trigger::Initialized, enabled).is_some());
//! assert_eq!(machine.current_state(), LogicalState::Idle);
//!
//! // Not permitted while Idle: rejected, state unchanged
//! assert!(machine.fire(Trigger::OperationComplete, enabled).is_none());
//! assert_eq!(machine.current_state(), LogicalState::Idle);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use egm_core::constants::MAX_TRANSITION_HISTORY;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Externally observable lifecycle stage of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalState {
    Uninitialized,
    Inspecting,
    Initializing,
    Idle,
    /// An operation such as a print is outstanding.
    Busy,
    Disabled,
    Disconnected,
}

impl LogicalState {
    pub const ALL: [LogicalState; 7] = [
        LogicalState::Uninitialized,
        LogicalState::Inspecting,
        LogicalState::Initializing,
        LogicalState::Idle,
        LogicalState::Busy,
        LogicalState::Disabled,
        LogicalState::Disconnected,
    ];

    /// Target state for `trigger`, or `None` if this state does not permit it.
    ///
    /// `ctx` is only consulted by dynamic transitions.
    pub fn target(self, trigger: Trigger, ctx: TransitionContext) -> Option<LogicalState> {
        use LogicalState as S;
        use Trigger as T;

        // Disconnected always wins, including over itself
        if trigger == T::Disconnected {
            return Some(S::Disconnected);
        }

        match self {
            S::Uninitialized => match trigger {
                T::Inspecting => Some(S::Inspecting),
                _ => None,
            },
            S::Inspecting => match trigger {
                T::Initializing => Some(S::Initializing),
                T::InspectionFailed => Some(S::Uninitialized),
                T::Enable | T::Disable => Some(S::Inspecting),
                _ => None,
            },
            S::Initializing => match trigger {
                T::Initialized if ctx.enabled => Some(S::Idle),
                T::Initialized => Some(S::Disabled),
                T::InspectionFailed => Some(S::Uninitialized),
                T::Enable | T::Disable => Some(S::Initializing),
                _ => None,
            },
            S::Idle => match trigger {
                T::BeginOperation => Some(S::Busy),
                T::Disable => Some(S::Disabled),
                _ => None,
            },
            S::Busy => match trigger {
                T::OperationComplete => Some(S::Idle),
                T::Disable => Some(S::Disabled),
                _ => None,
            },
            S::Disabled => match trigger {
                T::Enable => Some(S::Idle),
                _ => None,
            },
            S::Disconnected => match trigger {
                T::Connected => Some(S::Inspecting),
                _ => None,
            },
        }
    }

    /// Whether this state permits `trigger` for some context.
    pub fn permits(self, trigger: Trigger) -> bool {
        self.target(trigger, TransitionContext { enabled: true })
            .or_else(|| self.target(trigger, TransitionContext { enabled: false }))
            .is_some()
    }
}

impl fmt::Display for LogicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            LogicalState::Uninitialized => "Uninitialized",
            LogicalState::Inspecting => "Inspecting",
            LogicalState::Initializing => "Initializing",
            LogicalState::Idle => "Idle",
            LogicalState::Busy => "Busy",
            LogicalState::Disabled => "Disabled",
            LogicalState::Disconnected => "Disconnected",
        };
        write!(f, "{}", state_str)
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Inspecting,
    Initializing,
    Initialized,
    InspectionFailed,
    Enable,
    Disable,
    BeginOperation,
    OperationComplete,
    Connected,
    Disconnected,
}

impl Trigger {
    pub const ALL: [Trigger; 10] = [
        Trigger::Inspecting,
        Trigger::Initializing,
        Trigger::Initialized,
        Trigger::InspectionFailed,
        Trigger::Enable,
        Trigger::Disable,
        Trigger::BeginOperation,
        Trigger::OperationComplete,
        Trigger::Connected,
        Trigger::Disconnected,
    ];
}

/// Adapter-held data read at the moment a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionContext {
    /// No disable reason is set and the implementation reports enabled.
    pub enabled: bool,
}

/// Represents a single accepted transition with timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from: LogicalState,

    /// The state transitioned to.
    pub to: LogicalState,

    /// The trigger that caused the transition.
    pub trigger: Trigger,

    /// When the transition occurred.
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: LogicalState, to: LogicalState, trigger: Trigger) -> Self {
        Self {
            from,
            to,
            trigger,
            timestamp: Instant::now(),
        }
    }

    /// Accepted without changing state.
    pub fn is_reentry(&self) -> bool {
        self.from == self.to
    }

    /// Get the duration since this transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// State machine over [`LogicalState`].
///
/// Not synchronized: the owning adapter is its single writer.
#[derive(Debug)]
pub struct StateMachine {
    /// Current state.
    current_state: LogicalState,

    /// When the current state was entered.
    state_entered_at: Instant,

    /// Accepted transitions, oldest first, bounded by `MAX_TRANSITION_HISTORY`.
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the `Uninitialized` state.
    pub fn new() -> Self {
        Self::with_initial_state(LogicalState::Uninitialized)
    }

    /// Create a machine starting in `state`. Used to restore or test.
    pub fn with_initial_state(state: LogicalState) -> Self {
        Self {
            current_state: state,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_TRANSITION_HISTORY),
        }
    }

    pub fn current_state(&self) -> LogicalState {
        self.current_state
    }

    /// Get the time elapsed in the current state.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Whether the current state permits `trigger`. Pure query.
    pub fn can_fire(&self, trigger: Trigger) -> bool {
        self.current_state.permits(trigger)
    }

    /// Attempt a transition.
    ///
    /// Returns the accepted transition, or `None` (with a warning logged) if
    /// the trigger is not permitted in the current state. A rejected trigger
    /// never changes state.
    pub fn fire(&mut self, trigger: Trigger, ctx: TransitionContext) -> Option<StateTransition> {
        let Some(target) = self.current_state.target(trigger, ctx) else {
            warn!(
                "Trigger {:?} not permitted in state {}",
                trigger, self.current_state
            );
            return None;
        };

        let transition = StateTransition::new(self.current_state, target, trigger);
        if transition.is_reentry() {
            debug!("Re-entered {} on {:?}", target, trigger);
        } else {
            debug!("{} -> {} on {:?}", transition.from, transition.to, trigger);
            self.current_state = target;
            self.state_entered_at = transition.timestamp;
        }

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_TRANSITION_HISTORY {
            self.history.pop_front();
        }

        Some(transition)
    }

    /// Accepted transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last N accepted transitions.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
