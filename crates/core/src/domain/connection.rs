// Connection lifecycle model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Pool-local connection identifier (monotonic per pool)
pub type ConnectionId = u64;

/// Connection state machine
///
/// `Created -> Idle <-> Active -> (Idle | Destroyed)`; `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Created,
    Idle,
    Active,
    Destroyed,
}

impl ConnectionState {
    pub fn can_transition_to(&self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            // A freshly created connection is either parked or handed straight out
            (Created, Idle) | (Created, Active) | (Created, Destroyed)
                | (Idle, Active) | (Idle, Destroyed)
                | (Active, Idle) | (Active, Destroyed)
        )
    }

    pub fn transition(self, to: ConnectionState) -> Result<ConnectionState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Created => write!(f, "CREATED"),
            ConnectionState::Idle => write!(f, "IDLE"),
            ConnectionState::Active => write!(f, "ACTIVE"),
            ConnectionState::Destroyed => write!(f, "DESTROYED"),
        }
    }
}
