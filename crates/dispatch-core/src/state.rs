//! Request lifecycle state machine
//!
//! `Received → Classified → Resolved → Executing → {Completed | Failed}`.
//! `Failed` is reachable from every non-terminal state; both terminal states
//! have no successors, so there is no retry edge.

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    /// Text accepted
    Received,
    /// Operation and fields known
    Classified,
    /// Paths sandboxed
    Resolved,
    /// Handler running
    Executing,
    /// Handler succeeded
    Completed,
    /// Any failure
    Failed,
}

impl RequestState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Legal successors of a state
#[must_use]
pub fn allowed_transitions(from: RequestState) -> &'static [RequestState] {
    use RequestState::{Classified, Completed, Executing, Failed, Received, Resolved};
    match from {
        Received => &[Classified, Failed],
        Classified => &[Resolved, Failed],
        Resolved => &[Executing, Failed],
        Executing => &[Completed, Failed],
        Completed | Failed => &[],
    }
}

/// Validate a single transition
///
/// # Errors
/// Returns `Execution` for an illegal edge.
pub fn validate_transition(from: RequestState, to: RequestState) -> Result<(), TaskError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TaskError::Execution(format!(
            "illegal request transition {from:?} -> {to:?}"
        )))
    }
}

/// Tracks one request through its lifecycle
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    id: Uuid,
    state: RequestState,
}

impl RequestLifecycle {
    /// Start in `Received`
    #[inline]
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: RequestState::Received,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Move to `to` if the edge is legal
    ///
    /// # Errors
    /// Returns `Execution` for an illegal edge; the state is unchanged.
    pub fn advance(&mut self, to: RequestState) -> Result<(), TaskError> {
        validate_transition(self.state, to)?;
        tracing::debug!(request = %self.id, from = ?self.state, ?to, "request state");
        self.state = to;
        Ok(())
    }

    /// Move `Executing` to `Completed`; any other state is left as is
    pub fn complete(&mut self) {
        if self.state == RequestState::Executing {
            tracing::debug!(request = %self.id, "request completed");
            self.state = RequestState::Completed;
        }
    }

    /// Move to `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(request = %self.id, from = ?self.state, "request failed");
            self.state = RequestState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestState::*;

    #[test]
    fn happy_path_is_legal() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        for next in [Classified, Resolved, Executing, Completed] {
            lifecycle.advance(next).unwrap();
        }
        assert_eq!(lifecycle.state(), Completed);
    }

    #[test]
    fn failed_reachable_from_every_live_state() {
        for from in [Received, Classified, Resolved, Executing] {
            assert!(validate_transition(from, Failed).is_ok(), "{from:?}");
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for from in [Completed, Failed] {
            assert!(allowed_transitions(from).is_empty());
            assert!(validate_transition(from, Received).is_err());
        }
    }

    #[test]
    fn skipping_states_is_illegal() {
        assert!(validate_transition(Received, Executing).is_err());
        assert!(validate_transition(Classified, Completed).is_err());
    }

    #[test]
    fn illegal_advance_keeps_state() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        assert!(lifecycle.advance(Completed).is_err());
        assert_eq!(lifecycle.state(), Received);
    }

    #[test]
    fn complete_only_from_executing() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        lifecycle.complete();
        assert_eq!(lifecycle.state(), Received);

        for next in [Classified, Resolved, Executing] {
            lifecycle.advance(next).unwrap();
        }
        lifecycle.complete();
        assert_eq!(lifecycle.state(), Completed);

        lifecycle.fail();
        assert_eq!(lifecycle.state(), Completed);
    }

    #[test]
    fn fail_is_idempotent_on_terminal() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        lifecycle.fail();
        lifecycle.fail();
        assert_eq!(lifecycle.state(), Failed);
    }
}
