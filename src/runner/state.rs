//! Runner lifecycle states.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Milestones a map runner passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunnerState {
    Start,
    PopulateConfigComplete,
    CheckEnabledComplete,
    AssignTestLoopComplete,
    RaiseReadyComplete,
    TestLoopStart,
    TestLoopComplete,
}

impl RunnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::Start => "start",
            RunnerState::PopulateConfigComplete => "populateConfigComplete",
            RunnerState::CheckEnabledComplete => "checkEnabledComplete",
            RunnerState::AssignTestLoopComplete => "assignTestLoopComplete",
            RunnerState::RaiseReadyComplete => "raiseReadyComplete",
            RunnerState::TestLoopStart => "testLoopStart",
            RunnerState::TestLoopComplete => "testLoopComplete",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state and when it was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub state: RunnerState,
    pub at: DateTime<Utc>,
}

/// Append-only record of the states a runner reached.
#[derive(Debug, Default)]
pub struct StateList {
    transitions: Mutex<Vec<StateTransition>>,
}

impl StateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, state: RunnerState) {
        let mut transitions = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        transitions.push(StateTransition { state, at: Utc::now() });
    }

    pub fn latest(&self) -> Option<RunnerState> {
        let transitions = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        transitions.last().map(|t| t.state)
    }

    pub fn states(&self) -> Vec<RunnerState> {
        let transitions = self.transitions.lock().unwrap_or_else(|e| e.into_inner());
        transitions.iter().map(|t| t.state).collect()
    }

    pub fn transitions(&self) -> Vec<StateTransition> {
        self.transitions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
