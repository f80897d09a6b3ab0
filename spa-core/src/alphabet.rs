use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::{math, Error, Show};

/// A symbol of an alphabet, which is also the type of the symbols in a word. Any small value type
/// that can be compared, hashed and displayed qualifies, typically `char`s or integers in tests and
/// dedicated enums in applications.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show {}
impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show> Symbol for S {}

/// The role a symbol plays in a system of procedural automata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolType {
    /// Regular actions executed inside of a procedure.
    Internal,
    /// Invokes the procedure named by the symbol.
    Call,
    /// Terminates the currently executing procedure.
    Return,
}

/// An alphabet for systems of procedural automata. It partitions the symbols into internal
/// symbols, call symbols (one per procedure) and a single return symbol. The restriction to a
/// single return symbol is what distinguishes these alphabets from general visibly pushdown
/// alphabets.
///
/// Symbols are numbered densely, first the internal block, then the call block and finally
/// the return symbol.
///
/// # Example
/// ```
/// use spa_core::prelude::*;
/// let alphabet = SpaAlphabet::new(['a', 'b'], ['F'], 'R').unwrap();
/// assert_eq!(alphabet.classify('F'), Ok(SymbolType::Call));
/// assert_eq!(alphabet.symbol_index('R'), Some(3));
/// assert!(SpaAlphabet::new(['a'], ['a'], 'R').is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SpaAlphabet<S: Symbol> {
    internals: math::Set<S>,
    calls: math::Set<S>,
    return_symbol: S,
}

impl<S: Symbol> SpaAlphabet<S> {
    /// Creates a new alphabet from the given blocks, fails with [`Error::NonDisjointAlphabet`]
    /// if the blocks are not pairwise disjoint.
    pub fn new<I, C>(internals: I, calls: C, return_symbol: S) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
    {
        let internals: math::Set<S> = internals.into_iter().collect();
        let calls: math::Set<S> = calls.into_iter().collect();

        if let Some(symbol) = internals
            .iter()
            .find(|sym| calls.contains(*sym) || **sym == return_symbol)
        {
            return Err(Error::NonDisjointAlphabet {
                kind: SymbolType::Internal,
                symbol: symbol.show(),
            });
        }
        if calls.contains(&return_symbol) {
            return Err(Error::NonDisjointAlphabet {
                kind: SymbolType::Call,
                symbol: return_symbol.show(),
            });
        }

        Ok(Self {
            internals,
            calls,
            return_symbol,
        })
    }

    /// Adds a new call symbol, which is the only modification that is permitted after construction.
    /// Returns `true` if the symbol was not yet a call symbol.
    pub fn add_call_symbol(&mut self, symbol: S) -> Result<bool, Error> {
        if self.internals.contains(&symbol) || symbol == self.return_symbol {
            return Err(Error::NonDisjointAlphabet {
                kind: SymbolType::Call,
                symbol: symbol.show(),
            });
        }
        Ok(self.calls.insert(symbol))
    }

    /// The alphabet with the same internal and return symbols but without call symbols, which
    /// is where a hypothesis starts before any procedure is known.
    pub fn without_calls(&self) -> Self {
        Self {
            internals: self.internals.clone(),
            calls: math::Set::default(),
            return_symbol: self.return_symbol,
        }
    }

    /// Returns true if `symbol` is an internal symbol.
    pub fn is_internal(&self, symbol: S) -> bool {
        self.internals.contains(&symbol)
    }

    /// Returns true if `symbol` is a call symbol.
    pub fn is_call(&self, symbol: S) -> bool {
        self.calls.contains(&symbol)
    }

    /// Returns true if `symbol` is the return symbol.
    pub fn is_return(&self, symbol: S) -> bool {
        self.return_symbol == symbol
    }

    /// Determines the [`SymbolType`] of the given symbol.
    pub fn classify(&self, symbol: S) -> Result<SymbolType, Error> {
        if self.is_internal(symbol) {
            Ok(SymbolType::Internal)
        } else if self.is_call(symbol) {
            Ok(SymbolType::Call)
        } else if self.is_return(symbol) {
            Ok(SymbolType::Return)
        } else {
            Err(Error::UnknownSymbol(symbol.show()))
        }
    }

    /// Returns true if the symbol belongs to any of the three blocks.
    pub fn contains(&self, symbol: S) -> bool {
        self.classify(symbol).is_ok()
    }

    /// Verifies that every symbol of `word` is contained in the alphabet.
    pub fn validate(&self, word: &[S]) -> Result<(), Error> {
        match word.iter().find(|sym| !self.contains(**sym)) {
            Some(unknown) => Err(Error::UnknownSymbol(unknown.show())),
            None => Ok(()),
        }
    }

    /// Iterates over the internal symbols.
    pub fn internals(&self) -> impl Iterator<Item = S> + '_ {
        self.internals.iter().copied()
    }

    /// Iterates over the call symbols.
    pub fn calls(&self) -> impl Iterator<Item = S> + '_ {
        self.calls.iter().copied()
    }

    /// Returns the single return symbol.
    pub fn return_symbol(&self) -> S {
        self.return_symbol
    }

    /// Number of internal symbols.
    pub fn num_internals(&self) -> usize {
        self.internals.len()
    }

    /// Number of call symbols, i.e. the number of procedures.
    pub fn num_calls(&self) -> usize {
        self.calls.len()
    }

    /// The procedural alphabet, which is the vocabulary of a single procedure: all internal
    /// symbols followed by all call symbols.
    pub fn procedural_symbols(&self) -> Vec<S> {
        self.internals().chain(self.calls()).collect()
    }

    /// Iterates over all symbols in the order of their dense index.
    pub fn universe(&self) -> impl Iterator<Item = S> + '_ {
        self.internals()
            .chain(self.calls())
            .chain(std::iter::once(self.return_symbol))
    }

    /// Total number of symbols.
    pub fn size(&self) -> usize {
        self.internals.len() + self.calls.len() + 1
    }

    /// Returns the dense index of `symbol`, if it belongs to the alphabet.
    pub fn symbol_index(&self, symbol: S) -> Option<usize> {
        if let Some(idx) = self.internals.get_index_of(&symbol) {
            Some(idx)
        } else if let Some(idx) = self.calls.get_index_of(&symbol) {
            Some(self.internals.len() + idx)
        } else if self.is_return(symbol) {
            Some(self.internals.len() + self.calls.len())
        } else {
            None
        }
    }

    /// Inverse of [`Self::symbol_index`].
    pub fn symbol_at(&self, index: usize) -> Option<S> {
        let mut local = index;
        if local < self.internals.len() {
            return self.internals.get_index(local).copied();
        }
        local -= self.internals.len();
        if local < self.calls.len() {
            return self.calls.get_index(local).copied();
        }
        (local == self.calls.len()).then_some(self.return_symbol)
    }
}

impl<S: Symbol> Show for SpaAlphabet<S> {
    fn show(&self) -> String {
        format!(
            "internal {{{}}}, call {{{}}}, return {}",
            self.internals().map(|s| s.show()).join(", "),
            self.calls().map(|s| s.show()).join(", "),
            self.return_symbol.show()
        )
    }
}
