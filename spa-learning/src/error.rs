use thiserror::Error;

/// Errors that can occur while refining a hypothesis of a system of procedural automata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearningError {
    /// The word does not refine the hypothesis, either because it is already classified
    /// correctly or because it contradicts what has been learned so far.
    #[error("`{0}` is not a counterexample for the current hypothesis")]
    NotACounterexample(String),
    /// The word invokes a procedure for which no procedural learner exists.
    #[error("no procedural learner is responsible for procedure `{0}`")]
    UnresolvableProcedure(String),
    /// The hypothesis still misclassifies the word after the configured number of refinements.
    #[error("refinement threshold of {0} rounds exceeded")]
    ThresholdExceeded(usize),
    /// A malformed word, an unknown symbol or a structural problem of the target.
    #[error(transparent)]
    Core(#[from] spa_core::Error),
}
