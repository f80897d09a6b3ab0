use thiserror::Error;

use crate::alphabet::SymbolType;

/// Errors raised by the procedural automata core. Symbols and words are rendered through
/// [`crate::Show`] so that the error type does not depend on the symbol type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A symbol occurs in more than one block of an [`crate::SpaAlphabet`].
    #[error("the {kind:?} symbol `{symbol}` is not disjoint with the other blocks of the alphabet")]
    NonDisjointAlphabet {
        /// The block that the symbol was supposed to be added to.
        kind: SymbolType,
        /// The offending symbol.
        symbol: String,
    },
    /// A symbol that is neither internal, call nor return symbol.
    #[error("symbol `{0}` is not contained in the alphabet")]
    UnknownSymbol(String),
    /// The designated initial procedure is not a known procedure.
    #[error("initial procedure `{0}` is not a call symbol with a procedure")]
    UnknownInitialProcedure(String),
    /// A procedure is registered for a symbol that is not a call symbol.
    #[error("procedure `{0}` is registered for a symbol that is not a call symbol")]
    NotACallSymbol(String),
    /// A call symbol has no matching return in a region that was assumed to be well-matched.
    #[error("call at position {position} of `{word}` has no matching return")]
    UnmatchedCall {
        /// The malformed word.
        word: String,
        /// Position of the call symbol.
        position: usize,
    },
    /// A return symbol occurs without a pending call.
    #[error("return at position {position} of `{word}` has no matching call")]
    UnmatchedReturn {
        /// The malformed word.
        word: String,
        /// Position of the return symbol.
        position: usize,
    },
    /// A word that should consist of a single top-level invocation does not.
    #[error("`{0}` is not a single well-matched invocation of a procedure")]
    NotRooted(String),
    /// A call could not be expanded because no terminating sequence is known for it.
    #[error("no terminating sequence is known for procedure `{0}`")]
    MissingTerminatingSequence(String),
    /// A procedure can not be embedded into a global word because its access or return sequence
    /// is unknown.
    #[error("no access and return sequence is known for procedure `{0}`")]
    MissingAccessSequence(String),
    /// Some procedures cannot reach an accepting state.
    #[error("there are non-terminating procedures: {0}")]
    NonTerminatingProcedures(String),
    /// Some procedures cannot be reached from the initial procedure.
    #[error("there are non-accessible procedures: {0}")]
    UnreachableProcedures(String),
}

impl Error {
    /// Returns true if the error describes a malformed word, i.e. unbalanced calls and returns.
    pub fn is_malformed_word(&self) -> bool {
        matches!(
            self,
            Error::UnmatchedCall { .. } | Error::UnmatchedReturn { .. } | Error::NotRooted(_)
        )
    }

    /// Returns true if the error is a structural inconsistency of a procedure set, which can
    /// happen transiently for partially learned hypotheses.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::NonTerminatingProcedures(_) | Error::UnreachableProcedures(_)
        )
    }
}
