//! Systems of procedural automata: a collection of deterministic automata (procedures) that invoke
//! each other through call symbols and terminate through a single shared return symbol. This crate
//! provides their semantics together with the word arithmetic and the bookkeeping of access,
//! terminating and return sequences that learning them requires.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Partitioning of symbols into internal, call and return symbols.
pub mod alphabet;

/// Defines the collections that are used throughout, which iterate deterministically.
pub mod math;

mod show;
pub use show::{show_duration, show_word, Show};

mod error;
pub use error::Error;

/// Balanced call/return arithmetic on words. The operations are implemented directly on
/// [`SpaAlphabet`] as they need to classify symbols.
mod word;

/// Procedures are deterministic finite automata over internal and call symbols.
pub mod dfa;

/// The stack based semantics of a system of procedural automata.
pub mod spa;

/// Access, terminating and return sequences and the strategies that maintain them.
pub mod atr;

/// Composition of procedure local differences into global counterexamples.
pub mod compose;

/// Generation of random systems, mostly for testing.
#[cfg(feature = "random")]
pub mod random;

pub use alphabet::{SpaAlphabet, Symbol, SymbolType};

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use spa_core::prelude::*;` should be enough to use the package.
pub mod prelude {
    #[cfg(feature = "random")]
    pub use super::random::{random_dfa, random_spa};
    pub use super::{
        alphabet::{SpaAlphabet, Symbol, SymbolType},
        atr::{
            AccessSequenceTransformer, Atr, AtrProvider, DefaultAtrProvider,
            OptimizingAtrProvider, PartialAtr,
        },
        compose::Composer,
        dfa::{separating_word, Dfa, DfaBuilder, ProceduralDfa},
        math,
        spa::{CallStack, Configuration, Spa},
        show_word, Error, Show,
    };
}
