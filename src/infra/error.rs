use crate::infra::InvalidActionError;

/// Errors surfaced by the simulation and its collaborators.
///
/// Collisions, bounds violations and battery exhaustion are not errors: they
/// are part of the reward/done contract of a step.
#[derive(Debug, thiserror::Error)]
pub enum GridWorldError {
    /// An agent was given an action index outside the action set
    #[error("agent {agent}: {source}")]
    InvalidAction {
        agent: usize,
        #[source]
        source: InvalidActionError,
    },

    /// Wind noise distribution is malformed
    #[error("invalid wind configuration: {0}")]
    InvalidWind(String),

    /// Reset asked to keep starts/goals that were never generated
    #[error("starts and goals must be generated before they can be kept across resets")]
    MissingStartsGoals,

    /// A generator collaborator could not satisfy its placement constraints
    #[error("failed to generate {what} after {attempts} attempts")]
    GenerationExhausted { what: &'static str, attempts: usize },

    /// Conflict resolution did not reach a fixed point within its bound
    #[error("conflict resolution did not converge after {passes} passes")]
    ConflictUnresolved { passes: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("replay decode error: {0}")]
    Replay(#[from] prost::DecodeError),
}

pub type Result<T> = core::result::Result<T, GridWorldError>;
