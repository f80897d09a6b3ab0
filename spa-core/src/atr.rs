//! Access, terminating and return sequences. These are what allows to embed a word that is local to
//! a single procedure into a global word of the system: the access sequence leads from the initial
//! configuration to the point right before the procedure is invoked, the terminating sequence is
//! used to complete nested invocations and the return sequence leads from the return of the
//! procedure to acceptance.

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    alphabet::Symbol, dfa::ProceduralDfa, math, spa::Spa, Error, Show, SpaAlphabet,
};

mod default;
pub use default::DefaultAtrProvider;

mod optimizing;
pub use optimizing::OptimizingAtrProvider;

/// Maps any word to a canonical access sequence, i.e. a representative of the state that the word
/// reaches in the current hypothesis of a procedure.
pub trait AccessSequenceTransformer<S: Symbol> {
    /// Returns the canonical access sequence of the state that is reached by `word`.
    fn transform_access_sequence(&self, word: &[S]) -> Vec<S>;

    /// Returns true if `word` is the canonical access sequence of the state it reaches.
    fn is_access_sequence(&self, word: &[S]) -> bool {
        self.transform_access_sequence(word) == word
    }
}

impl<S: Symbol, T: AccessSequenceTransformer<S> + ?Sized> AccessSequenceTransformer<S> for &T {
    fn transform_access_sequence(&self, word: &[S]) -> Vec<S> {
        T::transform_access_sequence(self, word)
    }

    fn is_access_sequence(&self, word: &[S]) -> bool {
        T::is_access_sequence(self, word)
    }
}

/// A strategy for maintaining the access, terminating and return sequences of the procedures
/// that have been discovered so far.
pub trait AtrProvider<S: Symbol> {
    /// The sequences that are currently known.
    fn tables(&self) -> &Atr<S>;

    /// The access sequence of `procedure`.
    fn access_sequence(&self, procedure: S) -> Option<&[S]> {
        self.tables().access_sequence(procedure)
    }

    /// The terminating sequence of `procedure`.
    fn terminating_sequence(&self, procedure: S) -> Option<&[S]> {
        self.tables().terminating_sequence(procedure)
    }

    /// The return sequence of `procedure`.
    fn return_sequence(&self, procedure: S) -> Option<&[S]> {
        self.tables().return_sequence(procedure)
    }

    /// Extracts sequences from `word`, which must be accepted by the target system. Returns the
    /// procedures for which no sequences were known before, in the order of their first
    /// invocation in `word`.
    fn scan_positive_counterexample(&mut self, word: &[S]) -> Result<math::Set<S>, Error>;

    /// Gives the provider the chance to derive better sequences from refined hypotheses of the
    /// procedures. `transformers` provides the canonical access sequences for each of the
    /// `procedures` and `inputs` is the procedural alphabet the hypotheses are defined over.
    /// Returns true if some terminating sequence changed.
    fn scan_refined_procedures<D, T>(
        &mut self,
        procedures: &math::Map<S, D>,
        transformers: &math::Map<S, T>,
        inputs: &[S],
    ) -> bool
    where
        D: ProceduralDfa<S>,
        T: AccessSequenceTransformer<S>;
}

/// The three sequence tables, keyed by the call symbol of the procedure they belong to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Atr<S: Symbol> {
    pub(crate) access: math::Map<S, Vec<S>>,
    pub(crate) terminating: math::Map<S, Vec<S>>,
    pub(crate) returns: math::Map<S, Vec<S>>,
}

impl<S: Symbol> Default for Atr<S> {
    fn default() -> Self {
        Self {
            access: math::Map::default(),
            terminating: math::Map::default(),
            returns: math::Map::default(),
        }
    }
}

impl<S: Symbol> Atr<S> {
    /// The access sequence of `procedure`.
    pub fn access_sequence(&self, procedure: S) -> Option<&[S]> {
        self.access.get(&procedure).map(Vec::as_slice)
    }

    /// The terminating sequence of `procedure`.
    pub fn terminating_sequence(&self, procedure: S) -> Option<&[S]> {
        self.terminating.get(&procedure).map(Vec::as_slice)
    }

    /// The return sequence of `procedure`.
    pub fn return_sequence(&self, procedure: S) -> Option<&[S]> {
        self.returns.get(&procedure).map(Vec::as_slice)
    }

    /// Procedures for which a terminating sequence is known.
    pub fn terminating_procedures(&self) -> impl Iterator<Item = S> + '_ {
        self.terminating.keys().copied()
    }

    /// Procedures for which access and return sequences are known.
    pub fn accessible_procedures(&self) -> impl Iterator<Item = S> + '_ {
        self.access.keys().copied()
    }

    /// Sum of the lengths of all stored sequences.
    pub fn total_length(&self) -> usize {
        [&self.access, &self.terminating, &self.returns]
            .into_iter()
            .flat_map(|table| table.values())
            .map(Vec::len)
            .sum()
    }

    /// Sets the access and return sequence of `procedure` at once.
    pub fn set_access_and_return(&mut self, procedure: S, access: Vec<S>, returns: Vec<S>) {
        self.access.insert(procedure, access);
        self.returns.insert(procedure, returns);
    }

    /// Sets the terminating sequence of `procedure` and returns the previous one.
    pub fn set_terminating(&mut self, procedure: S, terminating: Vec<S>) -> Option<Vec<S>> {
        self.terminating.insert(procedure, terminating)
    }

    /// Embeds the `local` word of `procedure` into a global word. Nested invocations in `local`
    /// are completed with their terminating sequences and the result is framed by the access and
    /// return sequence of `procedure`.
    pub fn embed(
        &self,
        alphabet: &SpaAlphabet<S>,
        procedure: S,
        local: &[S],
    ) -> Result<Vec<S>, Error> {
        let (Some(access), Some(returns)) = (
            self.access_sequence(procedure),
            self.return_sequence(procedure),
        ) else {
            return Err(Error::MissingAccessSequence(procedure.show()));
        };
        let expanded = alphabet.expand(local, |p| self.terminating_sequence(p))?;

        let mut out = Vec::with_capacity(access.len() + expanded.len() + returns.len() + 2);
        out.extend_from_slice(access);
        out.push(procedure);
        out.extend(expanded);
        out.push(alphabet.return_symbol());
        out.extend_from_slice(returns);
        Ok(out)
    }

    /// The shortest known global word that invokes `procedure` and lets it terminate, i.e.
    /// `AS · p · TS · R · RS`. The terminating sequence is already global, so unlike
    /// [`Self::embed`] nothing is expanded.
    pub fn embed_terminating(
        &self,
        alphabet: &SpaAlphabet<S>,
        procedure: S,
    ) -> Result<Vec<S>, Error> {
        let (Some(access), Some(returns)) = (
            self.access_sequence(procedure),
            self.return_sequence(procedure),
        ) else {
            return Err(Error::MissingAccessSequence(procedure.show()));
        };
        let terminating = self
            .terminating_sequence(procedure)
            .ok_or_else(|| Error::MissingTerminatingSequence(procedure.show()))?;

        Ok(access
            .iter()
            .copied()
            .chain([procedure])
            .chain(terminating.iter().copied())
            .chain([alphabet.return_symbol()])
            .chain(returns.iter().copied())
            .collect())
    }

    /// Computes sequences for all procedures of the fixed system `spa` and fails if some
    /// procedure can not terminate or can not be reached from the initial procedure.
    pub fn derive<D: ProceduralDfa<S>>(spa: &Spa<S, D>) -> Result<Self, Error> {
        let partial = Self::derive_partial(spa);
        if !partial.non_terminating.is_empty() {
            return Err(Error::NonTerminatingProcedures(S::show_collection(
                &partial.non_terminating,
            )));
        }
        if !partial.unreachable.is_empty() {
            return Err(Error::UnreachableProcedures(S::show_collection(
                &partial.unreachable,
            )));
        }
        Ok(partial.atr)
    }

    /// Like [`Self::derive`], but procedures that can not terminate or can not be reached are
    /// reported instead of causing a failure. This is how partially learned hypotheses are
    /// handled, where such procedures are simply not yet reachable.
    pub fn derive_partial<D: ProceduralDfa<S>>(spa: &Spa<S, D>) -> PartialAtr<S> {
        let mut atr = Self::default();
        let non_terminating = atr.derive_terminating_sequences(spa);
        let unreachable = atr.derive_access_and_return_sequences(spa);

        trace!(
            "derived sequences, non-terminating {}, unreachable {}",
            S::show_collection(&non_terminating),
            S::show_collection(&unreachable)
        );

        PartialAtr {
            atr,
            non_terminating,
            unreachable,
        }
    }

    /// Fixed point over the state covers of the procedures, where the set of usable inputs grows
    /// by every procedure for which a terminating sequence is found. Returns the procedures that
    /// remain without terminating sequence.
    fn derive_terminating_sequences<D: ProceduralDfa<S>>(&mut self, spa: &Spa<S, D>) -> Vec<S> {
        let alphabet = spa.alphabet();
        let internals = alphabet.internals().collect_vec();

        for (procedure, dfa) in spa.procedures() {
            let found = if dfa.accepts(&[]) {
                Some(vec![])
            } else {
                dfa.state_cover(&internals)
                    .into_iter()
                    .find(|trace| dfa.accepts(trace))
            };
            if let Some(ts) = found {
                self.terminating.insert(*procedure, ts);
            }
        }

        let mut remaining: math::Set<S> = spa
            .procedures()
            .keys()
            .copied()
            .chain(spa.initial_procedure())
            .filter(|p| !self.terminating.contains_key(p))
            .collect();
        let mut eligible = internals;
        eligible.extend(self.terminating_procedures());

        let mut stable = false;
        while !stable {
            stable = true;

            for procedure in remaining.clone() {
                let Some(dfa) = spa.procedure(procedure) else {
                    continue;
                };
                let found = dfa
                    .state_cover(&eligible)
                    .into_iter()
                    .filter(|trace| dfa.accepts(trace))
                    .find_map(|trace| {
                        alphabet
                            .expand(&trace, |p| self.terminating_sequence(p))
                            .ok()
                    });
                if let Some(ts) = found {
                    self.terminating.insert(procedure, ts);
                    remaining.shift_remove(&procedure);
                    eligible.push(procedure);
                    stable = false;
                }
            }
        }

        remaining.into_iter().collect()
    }

    /// Fixed point over the transition covers of the procedures that are already accessible.
    /// An accepted trace of an accessible procedure `p` that invokes a procedure `q` which is not
    /// accessible yet yields the sequences of `q` from the sequences of `p`. Returns the
    /// procedures that remain inaccessible.
    fn derive_access_and_return_sequences<D: ProceduralDfa<S>>(
        &mut self,
        spa: &Spa<S, D>,
    ) -> Vec<S> {
        let alphabet = spa.alphabet();
        let inputs = alphabet.procedural_symbols();

        let Some(initial) = spa.initial_procedure() else {
            return spa.procedures().keys().copied().collect();
        };
        self.set_access_and_return(initial, vec![], vec![]);
        let mut finished = math::Set::from_iter([initial]);

        let mut stable = false;
        while !stable && finished.len() < spa.procedures().len() {
            stable = true;

            for procedure in finished.clone() {
                let Some(dfa) = spa.procedure(procedure) else {
                    continue;
                };
                for trace in dfa.transition_cover(&inputs) {
                    if !dfa.accepts(&trace) {
                        continue;
                    }
                    let Some(pos) = trace.iter().position(|sym| {
                        spa.procedure(*sym).is_some() && !finished.contains(sym)
                    }) else {
                        continue;
                    };
                    let callee = trace[pos];
                    let terminating = |p| self.terminating_sequence(p);
                    let (Ok(prefix), Ok(suffix)) = (
                        alphabet.expand(&trace[..pos], terminating),
                        alphabet.expand(&trace[pos + 1..], terminating),
                    ) else {
                        continue;
                    };

                    let mut access = self.access[&procedure].clone();
                    access.push(procedure);
                    access.extend(prefix);
                    let mut returns = suffix;
                    returns.push(alphabet.return_symbol());
                    returns.extend_from_slice(&self.returns[&procedure]);

                    debug!(
                        "procedure {} is accessible via {} with return {}",
                        callee.show(),
                        access.show(),
                        returns.show()
                    );
                    self.set_access_and_return(callee, access, returns);
                    finished.insert(callee);
                    stable = false;
                }
            }
        }

        spa.procedures()
            .keys()
            .copied()
            .filter(|p| !finished.contains(p))
            .collect()
    }
}

/// Result of [`Atr::derive_partial`].
#[derive(Clone, Debug)]
pub struct PartialAtr<S: Symbol> {
    /// The sequences that could be derived.
    pub atr: Atr<S>,
    /// Procedures that have no terminating sequence.
    pub non_terminating: Vec<S>,
    /// Procedures that have no access and return sequence.
    pub unreachable: Vec<S>,
}

impl<S: Symbol> PartialAtr<S> {
    /// Returns true if `procedure` can be embedded into a global word with all nested
    /// invocations completed.
    pub fn is_realizable(&self, procedure: S) -> bool {
        !self.unreachable.contains(&procedure) && !self.non_terminating.contains(&procedure)
    }
}

impl<S: Symbol> Show for Atr<S> {
    fn show(&self) -> String {
        self.terminating
            .keys()
            .chain(self.access.keys())
            .unique()
            .map(|p| {
                let show = |seq: Option<&[S]>| seq.map_or("-".to_string(), |s| s.show());
                format!(
                    "{}: access {}, terminating {}, return {}",
                    p.show(),
                    show(self.access_sequence(*p)),
                    show(self.terminating_sequence(*p)),
                    show(self.return_sequence(*p)),
                )
            })
            .join("\n")
    }
}
