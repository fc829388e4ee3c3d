use serde::{Deserialize, Serialize};

/// Lifecycle of an operator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorState {
    /// Engine handle created, nothing connected yet
    Constructed,
    /// At least one pin bound since the last evaluation
    Connecting,
    /// Outputs computed for the current set of inputs
    Evaluated,
}

impl OperatorState {
    /// Nothing returns to `Constructed`; every other move is allowed, a new
    /// edge on an evaluated instance sending it back to `Connecting`
    pub fn can_transition_to(&self, target: &OperatorState) -> bool {
        *target != OperatorState::Constructed
    }

    /// Move to `target` when the transition is valid; returns whether it moved
    pub fn advance(&mut self, target: OperatorState) -> bool {
        if self.can_transition_to(&target) {
            *self = target;
            true
        } else {
            false
        }
    }

    /// Lowercase name of the state
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Connecting => "connecting",
            Self::Evaluated => "evaluated",
        }
    }
}

impl std::fmt::Display for OperatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for OperatorState {
    fn default() -> Self {
        Self::Constructed
    }
}
