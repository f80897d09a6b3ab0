use std::cell::Cell;

use spa_core::prelude::*;
use tracing::{trace, warn};

/// Answers membership queries, i.e. whether a word belongs to the language that is learned.
pub trait MembershipOracle<S: Symbol> {
    /// Returns true if `word` is accepted.
    fn output(&self, word: &[S]) -> bool;

    /// Answers all of `words`, the answers are given in the order of the queries.
    fn output_batch(&self, words: &[Vec<S>]) -> Vec<bool> {
        words.iter().map(|word| self.output(word)).collect()
    }
}

impl<S: Symbol, O: MembershipOracle<S> + ?Sized> MembershipOracle<S> for &O {
    fn output(&self, word: &[S]) -> bool {
        O::output(self, word)
    }

    fn output_batch(&self, words: &[Vec<S>]) -> Vec<bool> {
        O::output_batch(self, words)
    }
}

/// Decides whether a hypothesis is correct. If it is not, a word on which it errs is returned
/// together with the correct output for that word.
pub trait EquivalenceOracle<S: Symbol> {
    /// Returns a counterexample for `hypothesis` or `None` if none could be found.
    fn find_counterexample<D: ProceduralDfa<S>>(
        &self,
        hypothesis: &Spa<S, D>,
    ) -> Option<(Vec<S>, bool)>;
}

/// Answers membership queries by running them through a known system. It keeps track of the
/// number of queries that were posed.
#[derive(Clone, Debug)]
pub struct SimulatorOracle<S: Symbol, D> {
    spa: Spa<S, D>,
    queries: Cell<usize>,
}

impl<S: Symbol, D: ProceduralDfa<S>> SimulatorOracle<S, D> {
    /// Creates an oracle for the given system.
    pub fn new(spa: Spa<S, D>) -> Self {
        Self {
            spa,
            queries: Cell::new(0),
        }
    }

    /// The number of membership queries answered so far.
    pub fn queries(&self) -> usize {
        self.queries.get()
    }

    /// The system that is simulated.
    pub fn target(&self) -> &Spa<S, D> {
        &self.spa
    }
}

impl<S: Symbol, D: ProceduralDfa<S>> MembershipOracle<S> for SimulatorOracle<S, D> {
    fn output(&self, word: &[S]) -> bool {
        self.queries.set(self.queries.get() + 1);
        self.spa.accepts(word)
    }
}

/// Answers queries about the local language of a single procedure by embedding the local word
/// into a global one, using the sequences that are currently known, and forwarding it to a
/// global oracle.
pub struct ProceduralOracle<'a, S: Symbol, O: ?Sized> {
    alphabet: &'a SpaAlphabet<S>,
    procedure: S,
    tables: &'a Atr<S>,
    oracle: &'a O,
}

impl<'a, S: Symbol, O: MembershipOracle<S> + ?Sized> ProceduralOracle<'a, S, O> {
    /// Creates an oracle for `procedure` which embeds words using `tables`.
    pub fn new(
        alphabet: &'a SpaAlphabet<S>,
        procedure: S,
        tables: &'a Atr<S>,
        oracle: &'a O,
    ) -> Self {
        Self {
            alphabet,
            procedure,
            tables,
            oracle,
        }
    }

    /// The procedure whose local language is queried.
    pub fn procedure(&self) -> S {
        self.procedure
    }

    /// Maps the local word `u` to `AS · p · expand(u) · R · RS`.
    pub fn embed(&self, local: &[S]) -> Result<Vec<S>, Error> {
        self.tables.embed(self.alphabet, self.procedure, local)
    }
}

impl<'a, S: Symbol, O: MembershipOracle<S> + ?Sized> MembershipOracle<S>
    for ProceduralOracle<'a, S, O>
{
    fn output(&self, word: &[S]) -> bool {
        match self.embed(word) {
            Ok(global) => {
                trace!(
                    "querying {} for {} in {}",
                    global.show(),
                    word.show(),
                    self.procedure.show()
                );
                self.oracle.output(&global)
            }
            Err(err) => {
                warn!("could not embed {}: {err}", word.show());
                false
            }
        }
    }

    fn output_batch(&self, words: &[Vec<S>]) -> Vec<bool> {
        let embedded: Vec<_> = words.iter().map(|word| self.embed(word)).collect();
        let globals: Vec<Vec<S>> = embedded
            .iter()
            .filter_map(|global| global.as_ref().ok().cloned())
            .collect();
        let mut answers = self.oracle.output_batch(&globals).into_iter();

        embedded
            .iter()
            .zip(words)
            .map(|(global, word)| match global {
                Ok(_) => answers.next().unwrap_or(false),
                Err(err) => {
                    warn!("could not embed {}: {err}", word.show());
                    false
                }
            })
            .collect()
    }
}

/// An equivalence oracle that knows the target system and finds counterexamples by comparing
/// procedures one by one, see [`Composer`].
#[derive(Clone, Debug)]
pub struct SpaEquivalenceOracle<S: Symbol, D> {
    composer: Composer<S, D>,
}

impl<S: Symbol, D: ProceduralDfa<S>> SpaEquivalenceOracle<S, D> {
    /// Fails if the target has procedures that can not terminate or can not be reached.
    pub fn new(target: Spa<S, D>) -> Result<Self, Error> {
        Ok(Self {
            composer: Composer::new(target)?,
        })
    }

    /// The underlying composer.
    pub fn composer(&self) -> &Composer<S, D> {
        &self.composer
    }
}

impl<S: Symbol, D: ProceduralDfa<S>> EquivalenceOracle<S> for SpaEquivalenceOracle<S, D> {
    fn find_counterexample<H: ProceduralDfa<S>>(
        &self,
        hypothesis: &Spa<S, H>,
    ) -> Option<(Vec<S>, bool)> {
        self.composer.find_counterexample(hypothesis)
    }
}
