//! Resource lifecycle state machine.
//!
//! ```text
//! Planned -> Validating -> Failed
//!                       -> Creating -> Created
//! Created -> Reading -> Created | Planned (grant gone)
//! Created -> Updating -> Created
//! Created -> Destroying -> Destroyed
//! ```
//!
//! `Validating` always precedes the first controller call of an apply.

use juju_access_core::error::{AccessError, AccessResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planned,
    Validating,
    Creating,
    Created,
    Reading,
    Updating,
    Destroying,
    Destroyed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Destroyed | Phase::Failed)
    }

    fn can_move_to(&self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Planned, Validating)
                | (Validating, Failed)
                | (Validating, Creating)
                | (Validating, Reading)
                | (Validating, Created)
                | (Validating, Updating)
                | (Validating, Destroying)
                | (Creating, Created)
                | (Creating, Failed)
                | (Created, Validating)
                | (Created, Reading)
                | (Created, Updating)
                | (Created, Destroying)
                | (Reading, Created)
                | (Reading, Planned)
                | (Reading, Failed)
                | (Updating, Created)
                | (Updating, Failed)
                | (Destroying, Destroyed)
                | (Destroying, Failed)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current phase plus the path taken to reach it.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: Phase,
    history: Vec<Phase>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::starting_at(Phase::Planned)
    }

    /// A lifecycle for a resource loaded from persisted state.
    pub fn created() -> Self {
        Self::starting_at(Phase::Created)
    }

    fn starting_at(phase: Phase) -> Self {
        Self {
            phase,
            history: vec![phase],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn advance(&mut self, next: Phase) -> AccessResult<()> {
        if !self.phase.can_move_to(next) {
            return Err(AccessError::Internal(format!(
                "illegal lifecycle transition {} -> {}",
                self.phase, next
            )));
        }
        tracing::trace!(from = %self.phase, to = %next, "lifecycle");
        self.phase = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
