use thiserror::Error;

use crate::modules::space::Position;
use crate::modules::time::AgentId;

/// Errors surfaced by the grid, scheduler, model and parameter registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("position ({}, {}) is outside a {width}x{height} grid", .position.x, .position.y)]
    OutOfBounds {
        position: Position,
        width: usize,
        height: usize,
    },

    #[error("agent {0} not found")]
    NotFound(AgentId),

    #[error("agent {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("value out of range: {0}")]
    Range(String),

    /// An agent failed during a tick; the rest of that tick was skipped.
    #[error("agent {agent_id} failed at tick {tick}: {reason}")]
    AgentFailure {
        agent_id: AgentId,
        tick: u64,
        reason: String,
    },

    #[error("unknown parameter {0}")]
    UnknownParam(String),
}

impl SimError {
    pub fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
