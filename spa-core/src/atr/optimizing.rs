use itertools::Itertools;
use tracing::{debug, info, trace};

use super::{AccessSequenceTransformer, Atr, AtrProvider};
use crate::{alphabet::Symbol, dfa::ProceduralDfa, math, Error, Show, SpaAlphabet};

/// Keeps the sequences as short as possible. Every positive word is searched for shorter
/// terminating sequences and for shorter combinations of access and return sequence, and the
/// hypotheses of refined procedures are searched for shorter terminating sequences. Whenever a
/// terminating sequence shrinks, all stored sequences are rewritten with it. No stored sequence
/// ever grows.
#[derive(Clone, Debug)]
pub struct OptimizingAtrProvider<S: Symbol> {
    alphabet: SpaAlphabet<S>,
    tables: Atr<S>,
}

impl<S: Symbol> OptimizingAtrProvider<S> {
    /// Creates a provider without any known sequences.
    pub fn new(alphabet: SpaAlphabet<S>) -> Self {
        Self {
            alphabet,
            tables: Atr::default(),
        }
    }

    fn minify(&self, word: &[S]) -> Vec<S> {
        self.alphabet
            .minify_well_matched(word, |p| self.tables.terminating_sequence(p))
    }

    /// Expects a well-matched word.
    fn extract_terminating_sequences(&mut self, word: &[S], discovered: &mut math::Set<S>) {
        for (i, sym) in word.iter().enumerate() {
            if !self.alphabet.is_call(*sym) {
                continue;
            }
            let Some(return_idx) = self.alphabet.find_return_index(word, i + 1) else {
                continue;
            };
            let candidate = &word[i + 1..return_idx];

            match self.tables.terminating_sequence(*sym).map(<[S]>::len) {
                None => {
                    discovered.insert(*sym);
                    self.tables.set_terminating(*sym, candidate.to_vec());
                }
                Some(current) if candidate.len() < current => {
                    debug!(
                        "shorter terminating sequence {} for {}",
                        candidate.show(),
                        sym.show()
                    );
                    self.tables.set_terminating(*sym, candidate.to_vec());
                }
                Some(_) => {}
            }
        }
    }

    /// Every invocation in `word` splits it into a prefix and a suffix, which after rewriting
    /// closed invocations with the terminating sequences are candidates for the access and return
    /// sequence of the invoked procedure.
    fn extract_access_and_return_sequences(&mut self, word: &[S]) {
        for (i, sym) in word.iter().enumerate() {
            if !self.alphabet.is_call(*sym) {
                continue;
            }
            let Some(return_idx) = self.alphabet.find_return_index(word, i + 1) else {
                continue;
            };

            let access = self.minify(&word[..i]);
            let returns = self.minify(&word[return_idx + 1..]);
            let current = self
                .tables
                .access_sequence(*sym)
                .zip(self.tables.return_sequence(*sym))
                .map(|(a, r)| a.len() + r.len());

            if current.map_or(true, |len| access.len() + returns.len() < len) {
                trace!(
                    "access {} and return {} for {}",
                    access.show(),
                    returns.show(),
                    sym.show()
                );
                self.tables.set_access_and_return(*sym, access, returns);
            }
        }
    }

    /// The shortest expanded access sequence of an accepting state of `hypothesis`.
    fn shortest_hypothesis_terminating_sequence<D, T>(
        &self,
        hypothesis: &D,
        transformer: &T,
        inputs: &[S],
    ) -> Option<Vec<S>>
    where
        D: ProceduralDfa<S>,
        T: AccessSequenceTransformer<S>,
    {
        hypothesis
            .state_cover(inputs)
            .into_iter()
            .filter(|trace| hypothesis.accepts(trace))
            .map(|trace| transformer.transform_access_sequence(&trace))
            .filter_map(|access| {
                self.alphabet
                    .expand(&access, |p| self.tables.terminating_sequence(p))
                    .ok()
            })
            .min_by_key(Vec::len)
    }

    /// Replaces terminating sequences by shorter ones read off the hypotheses until nothing
    /// changes anymore. Returns the number of passes, including the last one which changed
    /// nothing. Every pass that changes something settles at least one procedure for good, so
    /// there is at most one pass more than there are procedures.
    fn shorten_terminating_sequences<D, T>(
        &mut self,
        procedures: &math::Map<S, D>,
        transformers: &math::Map<S, T>,
        inputs: &[S],
    ) -> usize
    where
        D: ProceduralDfa<S>,
        T: AccessSequenceTransformer<S>,
    {
        let mut stable = false;
        let mut passes = 0;

        while !stable {
            stable = true;
            passes += 1;

            for (procedure, hypothesis) in procedures {
                let Some(transformer) = transformers.get(procedure) else {
                    continue;
                };
                let Some(candidate) =
                    self.shortest_hypothesis_terminating_sequence(hypothesis, transformer, inputs)
                else {
                    continue;
                };
                let shorter = self
                    .tables
                    .terminating_sequence(*procedure)
                    .map_or(true, |current| candidate.len() < current.len());
                if shorter {
                    debug!(
                        "hypothesis of {} yields terminating sequence {}",
                        procedure.show(),
                        candidate.show()
                    );
                    self.tables.set_terminating(*procedure, candidate);
                    stable = false;
                }
            }
        }
        passes
    }

    fn optimize_sequences(&mut self) {
        let rewrite = |table: &math::Map<S, Vec<S>>| {
            table
                .iter()
                .filter_map(|(p, seq)| {
                    let minimized = self.minify(seq);
                    (minimized.len() < seq.len()).then_some((*p, minimized))
                })
                .collect_vec()
        };
        let access = rewrite(&self.tables.access);
        let terminating = rewrite(&self.tables.terminating);
        let returns = rewrite(&self.tables.returns);

        for (p, seq) in access {
            self.tables.access.insert(p, seq);
        }
        for (p, seq) in terminating {
            self.tables.terminating.insert(p, seq);
        }
        for (p, seq) in returns {
            self.tables.returns.insert(p, seq);
        }
    }
}

impl<S: Symbol> AtrProvider<S> for OptimizingAtrProvider<S> {
    fn tables(&self) -> &Atr<S> {
        &self.tables
    }

    fn scan_positive_counterexample(&mut self, word: &[S]) -> Result<math::Set<S>, Error> {
        self.alphabet.check_well_matched(word)?;
        let mut discovered = math::Set::default();
        self.extract_terminating_sequences(word, &mut discovered);
        self.extract_access_and_return_sequences(word);

        if !discovered.is_empty() {
            info!(
                "discovered procedures {}",
                S::show_collection(discovered.iter())
            );
        }
        Ok(discovered)
    }

    fn scan_refined_procedures<D, T>(
        &mut self,
        procedures: &math::Map<S, D>,
        transformers: &math::Map<S, T>,
        inputs: &[S],
    ) -> bool
    where
        D: ProceduralDfa<S>,
        T: AccessSequenceTransformer<S>,
    {
        let passes = self.shorten_terminating_sequences(procedures, transformers, inputs);
        trace!("refined procedures scanned in {passes} passes");

        let improved = passes > 1;
        if improved {
            self.optimize_sequences();
        }
        improved
    }
}
