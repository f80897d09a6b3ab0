use tracing::{debug, info};

use super::{AccessSequenceTransformer, Atr, AtrProvider};
use crate::{alphabet::Symbol, dfa::ProceduralDfa, math, Error, Show, SpaAlphabet};

/// Records the sequences of a procedure from the first positive word in which it is invoked and
/// never changes them afterwards.
#[derive(Clone, Debug)]
pub struct DefaultAtrProvider<S: Symbol> {
    alphabet: SpaAlphabet<S>,
    tables: Atr<S>,
}

impl<S: Symbol> DefaultAtrProvider<S> {
    /// Creates a provider without any known sequences.
    pub fn new(alphabet: SpaAlphabet<S>) -> Self {
        Self {
            alphabet,
            tables: Atr::default(),
        }
    }
}

impl<S: Symbol> AtrProvider<S> for DefaultAtrProvider<S> {
    fn tables(&self) -> &Atr<S> {
        &self.tables
    }

    fn scan_positive_counterexample(&mut self, word: &[S]) -> Result<math::Set<S>, Error> {
        self.alphabet.check_well_matched(word)?;
        let mut discovered = math::Set::default();

        for (i, sym) in word.iter().enumerate() {
            if !self.alphabet.is_call(*sym) || self.tables.access.contains_key(sym) {
                continue;
            }
            let Some(return_idx) = self.alphabet.find_return_index(word, i + 1) else {
                continue;
            };

            let access = word[..i].to_vec();
            let terminating = word[i + 1..return_idx].to_vec();
            let returns = word[return_idx + 1..].to_vec();
            debug!(
                "recorded procedure {} with access {}, terminating {} and return {}",
                sym.show(),
                access.show(),
                terminating.show(),
                returns.show()
            );

            self.tables.set_access_and_return(*sym, access, returns);
            self.tables.set_terminating(*sym, terminating);
            discovered.insert(*sym);
        }

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
        _procedures: &math::Map<S, D>,
        _transformers: &math::Map<S, T>,
        _inputs: &[S],
    ) -> bool
    where
        D: ProceduralDfa<S>,
        T: AccessSequenceTransformer<S>,
    {
        false
    }
}
