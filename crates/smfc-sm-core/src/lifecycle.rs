use serde::{Deserialize, Serialize};
use smfc_core::{Result, SmfcError};

/// Session core lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Paths not yet open
    Initializing,

    /// Both paths open, events are dispatched
    Operational,

    /// Paths closed; terminal
    ShuttingDown,
}

pub struct Lifecycle {
    current_state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            current_state: LifecycleState::Initializing,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.current_state
    }

    /// Transition to Operational once both paths are open
    pub fn enter_operational(&mut self) -> Result<()> {
        match self.current_state {
            LifecycleState::Initializing => {
                self.current_state = LifecycleState::Operational;
                Ok(())
            }
            _ => Err(SmfcError::InvalidStateTransition(format!(
                "Cannot enter Operational from state {:?}",
                self.current_state
            ))),
        }
    }

    /// Transition to ShuttingDown. Also taken from Initializing when
    /// startup fails.
    pub fn shut_down(&mut self) -> Result<()> {
        match self.current_state {
            LifecycleState::Initializing | LifecycleState::Operational => {
                self.current_state = LifecycleState::ShuttingDown;
                Ok(())
            }
            LifecycleState::ShuttingDown => Err(SmfcError::InvalidStateTransition(
                "Already shutting down".to_string(),
            )),
        }
    }

    pub fn is_operational(&self) -> bool {
        self.current_state == LifecycleState::Operational
    }
}
