//! Active learning of systems of procedural automata. Every procedure is learned by its own
//! learner for regular languages, the [`SpaLearner`] takes care of discovering procedures,
//! decomposing global counterexamples into local ones and keeping the sequences that embed
//! local queries into global ones up to date.
#![deny(missing_docs)]

mod error;
pub use error::LearningError;

/// Membership and equivalence oracles, including the one that answers queries local to a
/// single procedure.
pub mod oracle;

mod lstar;
pub use lstar::LStar;

mod learner;
pub use learner::{LearnerConfig, ProceduralLearner, SpaLearner};

/// Everything that is needed for learning, including the prelude of [`spa_core`].
pub mod prelude {
    pub use super::{
        oracle::{
            EquivalenceOracle, MembershipOracle, ProceduralOracle, SimulatorOracle,
            SpaEquivalenceOracle,
        },
        LStar, LearnerConfig, LearningError, ProceduralLearner, SpaLearner,
    };
    pub use spa_core::prelude::*;
}
