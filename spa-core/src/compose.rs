use tracing::{debug, warn};

use crate::{
    alphabet::Symbol,
    atr::{Atr, PartialAtr},
    dfa::{separating_word, Dfa, ProceduralDfa},
    spa::Spa,
    Error, Show,
};

/// Turns a difference between a procedure of a target system and the corresponding procedure of
/// a hypothesis into a global counterexample. Positive witnesses are embedded with the sequences
/// of the target, negative witnesses with sequences derived from the hypothesis, so that the
/// resulting word exercises the hypothesis only in the procedure that is at fault.
#[derive(Clone, Debug)]
pub struct Composer<S: Symbol, D> {
    target: Spa<S, D>,
    atr: Atr<S>,
}

impl<S: Symbol, D: ProceduralDfa<S>> Composer<S, D> {
    /// Fails if `target` has procedures that can not terminate or are not reachable.
    pub fn new(target: Spa<S, D>) -> Result<Self, Error> {
        let atr = Atr::derive(&target)?;
        Ok(Self { target, atr })
    }

    /// The system that counterexamples are composed for.
    pub fn target(&self) -> &Spa<S, D> {
        &self.target
    }

    /// The sequences of the target.
    pub fn tables(&self) -> &Atr<S> {
        &self.atr
    }

    /// Searches a word on which `hypothesis` and the target disagree and returns it together with
    /// the output of the target. Returns `None` if all procedures agree over the procedural
    /// alphabet of the target.
    pub fn find_counterexample<H: ProceduralDfa<S>>(
        &self,
        hypothesis: &Spa<S, H>,
    ) -> Option<(Vec<S>, bool)> {
        let mut partial = None;

        if hypothesis.initial_procedure() != self.target.initial_procedure() {
            debug!("initial procedures differ");
            if let Some(counterexample) = self.initial_counterexample(hypothesis, &mut partial) {
                return Some(counterexample);
            }
        }

        let rejecting = Dfa::rejecting();
        for call in self.target.alphabet().calls() {
            let counterexample = match (self.target.procedure(call), hypothesis.procedure(call)) {
                (Some(target), Some(hyp)) => {
                    self.compare(call, target, hyp, hypothesis, &mut partial)
                }
                (Some(target), None) => {
                    self.compare(call, target, &rejecting, hypothesis, &mut partial)
                }
                (None, Some(hyp)) => {
                    self.compare(call, &rejecting, hyp, hypothesis, &mut partial)
                }
                (None, None) => None,
            };
            if counterexample.is_some() {
                return counterexample;
            }
        }

        None
    }

    /// The shortest accepted word of whichever of the two systems has an initial procedure that
    /// the other one does not share.
    fn initial_counterexample<H: ProceduralDfa<S>>(
        &self,
        hypothesis: &Spa<S, H>,
        partial: &mut Option<PartialAtr<S>>,
    ) -> Option<(Vec<S>, bool)> {
        let alphabet = self.target.alphabet();
        if let Some(initial) = self.target.initial_procedure() {
            if let Ok(word) = self.atr.embed_terminating(alphabet, initial) {
                return Some((word, true));
            }
        }
        let initial = hypothesis.initial_procedure()?;
        let partial = partial.get_or_insert_with(|| Atr::derive_partial(hypothesis));
        let word = partial.atr.embed_terminating(alphabet, initial).ok()?;
        Some((word, false))
    }

    fn compare<T, H, HD>(
        &self,
        call: S,
        target: &T,
        hyp: &H,
        hypothesis: &Spa<S, HD>,
        partial: &mut Option<PartialAtr<S>>,
    ) -> Option<(Vec<S>, bool)>
    where
        T: ProceduralDfa<S>,
        H: ProceduralDfa<S>,
        HD: ProceduralDfa<S>,
    {
        let alphabet = self.target.alphabet();
        let inputs = alphabet.procedural_symbols();
        let separating = separating_word(target, hyp, &inputs)?;
        debug!(
            "procedure {} is separated by {}",
            call.show(),
            separating.show()
        );

        if target.accepts(&separating) {
            return match self.atr.embed(alphabet, call, &separating) {
                Ok(word) => Some((word, true)),
                Err(err) => {
                    warn!("could not embed positive witness: {err}");
                    None
                }
            };
        }

        let partial = partial.get_or_insert_with(|| Atr::derive_partial(hypothesis));
        if !partial.is_realizable(call) {
            warn!(
                "hypothesis wrongly accepts {} in {}, which it can not reach",
                separating.show(),
                call.show()
            );
            return None;
        }
        if let Ok(word) = partial.atr.embed(alphabet, call, &separating) {
            return Some((word, false));
        }

        // the witness invokes procedures that do not terminate in the hypothesis, so we search
        // again using only the ones that do
        let realizable = alphabet
            .internals()
            .chain(partial.atr.terminating_procedures())
            .collect::<Vec<_>>();
        let Some(separating) = separating_word(target, hyp, &realizable) else {
            warn!(
                "no realizable witness for {} in the hypothesis",
                call.show()
            );
            return None;
        };
        let (tables, output) = if target.accepts(&separating) {
            (&self.atr, true)
        } else {
            (&partial.atr, false)
        };
        match tables.embed(alphabet, call, &separating) {
            Ok(word) => Some((word, output)),
            Err(err) => {
                warn!("could not embed witness {}: {err}", separating.show());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Composer;
    use crate::{
        dfa::Dfa,
        spa::{
            tests::{palindrome_spa, word},
            Spa,
        },
        SpaAlphabet,
    };

    #[test]
    fn equal_systems_have_no_counterexample() {
        let target = palindrome_spa();
        let composer = Composer::new(target.clone()).unwrap();
        assert_eq!(composer.find_counterexample(&target), None);
    }

    #[test]
    fn missing_initial_procedure() {
        let target = palindrome_spa();
        let composer = Composer::new(target.clone()).unwrap();
        let empty = Spa::<char, Dfa<char>>::new(target.alphabet().clone(), None, []).unwrap();
        assert_eq!(
            composer.find_counterexample(&empty),
            Some((word("FR"), true))
        );
    }

    /// F terminates only by invoking G, which accepts `a`.
    fn nested_spa() -> Spa<char, Dfa<char>> {
        let alphabet = SpaAlphabet::new(['a'], ['F', 'G'], 'R').unwrap();
        let f = Dfa::builder()
            .with_state_colors([false, true])
            .with_edges([(0, 'G', 1)])
            .into_dfa(0);
        let g = Dfa::builder()
            .with_state_colors([false, true])
            .with_edges([(0, 'a', 1)])
            .into_dfa(0);
        Spa::new(alphabet, Some('F'), [('F', f), ('G', g)]).unwrap()
    }

    #[test]
    fn initial_counterexample_through_nested_call() {
        let target = nested_spa();
        let composer = Composer::new(target.clone()).unwrap();
        let empty = Spa::<char, Dfa<char>>::new(target.alphabet().clone(), None, []).unwrap();

        let (counterexample, output) = composer.find_counterexample(&empty).unwrap();
        assert_eq!(counterexample, word("FGaRR"));
        assert!(output);
        assert!(target.accepts(&counterexample));

        // the other way around the hypothesis has the initial procedure the target lacks
        let composer = Composer::new(empty.clone()).unwrap();
        let (counterexample, output) = composer.find_counterexample(&target).unwrap();
        assert_eq!(counterexample, word("FGaRR"));
        assert!(!output);
        assert!(!empty.accepts(&counterexample));
    }

    #[test]
    fn negative_counterexample_uses_hypothesis_sequences() {
        let target = palindrome_spa();
        let composer = Composer::new(target.clone()).unwrap();
        let inputs = target.alphabet().procedural_symbols();

        let mut accept_all = Dfa::new(true);
        for sym in &inputs {
            accept_all.add_edge(0, *sym, 0);
        }
        let hypothesis = Spa::new(
            target.alphabet().clone(),
            Some('F'),
            [('F', accept_all), ('G', target.procedure('G').unwrap().clone())],
        )
        .unwrap();

        let (counterexample, output) = composer.find_counterexample(&hypothesis).unwrap();
        assert_eq!(counterexample, word("FcR"));
        assert!(!output);
        assert!(hypothesis.accepts(&counterexample));
        assert!(!target.accepts(&counterexample));
    }

    #[test]
    fn positive_counterexample_uses_target_sequences() {
        let target = palindrome_spa();
        let composer = Composer::new(target.clone()).unwrap();
        let hypothesis = Spa::new(
            target.alphabet().clone(),
            Some('F'),
            [('F', target.procedure('F').unwrap().clone())],
        )
        .unwrap();

        let (counterexample, output) = composer.find_counterexample(&hypothesis).unwrap();
        assert_eq!(counterexample, word("FGcRR"));
        assert!(output);
        assert!(target.accepts(&counterexample));
        assert!(!hypothesis.accepts(&counterexample));
    }

    #[test_log::test]
    fn unrealizable_witnesses_are_skipped() {
        let alphabet = SpaAlphabet::new(['a'], ['F', 'G'], 'R').unwrap();
        let accepts_a = Dfa::builder()
            .with_state_colors([false, true])
            .with_edges([(0, 'a', 1)])
            .into_dfa(0);
        let target_f = Dfa::builder()
            .with_state_colors([false, true])
            .with_edges([(0, 'a', 1), (0, 'G', 1)])
            .into_dfa(0);
        let target = Spa::new(
            alphabet.clone(),
            Some('F'),
            [('F', target_f), ('G', accepts_a)],
        )
        .unwrap();

        // F wrongly accepts `G a`, but G can not terminate in the hypothesis
        let hyp_f = Dfa::builder()
            .with_state_colors([false, true, true])
            .with_edges([(0, 'a', 1), (0, 'G', 2), (2, 'a', 1)])
            .into_dfa(0);
        let hypothesis = Spa::new(
            alphabet,
            Some('F'),
            [('F', hyp_f), ('G', Dfa::rejecting())],
        )
        .unwrap();

        let composer = Composer::new(target.clone()).unwrap();
        assert_eq!(
            composer.find_counterexample(&hypothesis),
            Some((word("FGaRR"), true))
        );
    }
}
