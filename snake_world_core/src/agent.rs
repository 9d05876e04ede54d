use crate::{
    environment::Outcome, perception::SystemState, qtable::PersistError, snake::Heading,
};

/// Failure reported by an agent's shutdown hook.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to persist learned state")]
    Persist(#[from] PersistError),
}

/// Trait defining the behavior of a snake controller.
///
/// The host calls [`Agent::take_action`] before each step and
/// [`Agent::observe_outcome`] right after it, both with a freshly built
/// [`SystemState`].
pub trait Agent {
    /// Display name of the controller.
    fn name(&self) -> String;

    /// How this agent sees `state`, for debug displays.
    fn describe_state(&self, state: &SystemState) -> String;

    /// Picks the absolute heading for the coming step.
    fn take_action(&mut self, state: &SystemState) -> Heading;

    /// Receives the state after the step together with its outcome.
    fn observe_outcome(&mut self, state: &SystemState, outcome: Outcome);

    /// Called once when the host shuts down in an orderly way.
    fn on_terminate(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}
