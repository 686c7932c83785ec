//! Agent lifecycle state machine.
//!
//! installing -> installed -> activating -> active. Each transition is
//! driven by one handler completing (shell install, generation activation,
//! client claim); the worker awaits the handler before advancing, so a
//! state is never observed ahead of the work that justifies it.

use gatehouse_core::Error;

/// Lifecycle state of the interception agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Writing the shell manifest into a fresh, not-yet-live generation.
    Installing,
    /// Shell install completed; the new generation is populated but not live.
    Installed,
    /// Deleting superseded generations and claiming open page sessions.
    Activating,
    /// Serving intercepted requests from the live generation.
    Active,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Installing => "installing",
            AgentState::Installed => "installed",
            AgentState::Activating => "activating",
            AgentState::Active => "active",
        }
    }

    /// Advance to the next state, rejecting out-of-order transitions.
    pub fn advance(self, next: AgentState) -> Result<AgentState, Error> {
        let valid = matches!(
            (self, next),
            (AgentState::Installing, AgentState::Installed)
                | (AgentState::Installed, AgentState::Activating)
                | (AgentState::Activating, AgentState::Active)
        );

        if valid {
            tracing::debug!(from = self.as_str(), to = next.as_str(), "agent lifecycle transition");
            Ok(next)
        } else {
            Err(Error::Lifecycle { from: self.as_str(), to: next.as_str() })
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
