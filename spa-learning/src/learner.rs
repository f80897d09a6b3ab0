use spa_core::{prelude::*, show_duration};
use tracing::{debug, info, trace, warn};

use crate::{
    error::LearningError,
    lstar::LStar,
    oracle::{EquivalenceOracle, MembershipOracle, ProceduralOracle},
};

const REFINEMENT_THRESHOLD: usize = if cfg!(debug_assertions) { 1000 } else { 200000 };

/// A learner for the local language of a single procedure. Besides answering with a hypothesis
/// it has to provide canonical access sequences for the states of that hypothesis.
pub trait ProceduralLearner<S: Symbol>: AccessSequenceTransformer<S> {
    /// Builds the initial hypothesis.
    fn start_learning<O: MembershipOracle<S> + ?Sized>(&mut self, oracle: &O);

    /// Refines the hypothesis with the local counterexample `word`, whose correct output is
    /// `output`. Returns true if the hypothesis changed.
    fn refine_hypothesis<O: MembershipOracle<S> + ?Sized>(
        &mut self,
        word: &[S],
        output: bool,
        oracle: &O,
    ) -> bool;

    /// Extends the inputs of the hypothesis by `symbol`, which is used once a new procedure
    /// has been discovered.
    fn add_alphabet_symbol<O: MembershipOracle<S> + ?Sized>(&mut self, symbol: S, oracle: &O);

    /// The current hypothesis.
    fn hypothesis(&self) -> &Dfa<S>;
}

/// Settings of a [`SpaLearner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LearnerConfig {
    /// The maximal number of local refinements that a single counterexample may trigger, which
    /// is also the maximal number of equivalence queries in [`SpaLearner::infer`].
    pub max_refinements: usize,
}

impl LearnerConfig {
    /// Reads the threshold from the `SPA_MAX_REFINEMENTS` environment variable and falls back
    /// to the default if it is missing or not a number.
    pub fn from_env() -> Self {
        let max_refinements = std::env::var("SPA_MAX_REFINEMENTS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(REFINEMENT_THRESHOLD);
        Self { max_refinements }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Learns a system of procedural automata by learning every procedure separately.
///
/// Positive counterexamples reveal procedures together with sequences that allow to embed
/// local words of the procedure into global words, which are maintained by an [`AtrProvider`].
/// A counterexample is decomposed into the local traces of the procedure invocations it
/// contains and the first trace on which a procedure hypothesis is wrong is used to refine the
/// learner of that procedure.
pub struct SpaLearner<S: Symbol, O, P, L, F = fn(&[S]) -> L> {
    alphabet: SpaAlphabet<S>,
    hypothesis_alphabet: SpaAlphabet<S>,
    oracle: O,
    atr: P,
    learners: math::Map<S, L>,
    active_inputs: Vec<S>,
    initial: Option<S>,
    factory: F,
    config: LearnerConfig,
}

impl<S: Symbol, O: MembershipOracle<S>> SpaLearner<S, O, DefaultAtrProvider<S>, LStar<S>> {
    /// Uses L* for the procedures and keeps the first sequences that are found.
    pub fn with_default_atr(alphabet: SpaAlphabet<S>, oracle: O) -> Self {
        let atr = DefaultAtrProvider::new(alphabet.clone());
        Self::new(alphabet, oracle, atr, LStar::new)
    }
}

impl<S: Symbol, O: MembershipOracle<S>> SpaLearner<S, O, OptimizingAtrProvider<S>, LStar<S>> {
    /// Uses L* for the procedures and keeps the sequences as short as possible.
    pub fn with_optimizing_atr(alphabet: SpaAlphabet<S>, oracle: O) -> Self {
        let atr = OptimizingAtrProvider::new(alphabet.clone());
        Self::new(alphabet, oracle, atr, LStar::new)
    }
}

impl<S, O, P, L, F> SpaLearner<S, O, P, L, F>
where
    S: Symbol,
    O: MembershipOracle<S>,
    P: AtrProvider<S>,
    L: ProceduralLearner<S>,
    F: Fn(&[S]) -> L,
{
    /// Creates a learner over `alphabet`. The `factory` creates the learner of a newly
    /// discovered procedure from the procedural inputs that are active at that point.
    pub fn new(alphabet: SpaAlphabet<S>, oracle: O, atr: P, factory: F) -> Self {
        Self {
            hypothesis_alphabet: alphabet.without_calls(),
            oracle,
            atr,
            learners: math::Map::default(),
            active_inputs: alphabet.internals().collect(),
            initial: None,
            factory,
            config: LearnerConfig::default(),
            alphabet,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: LearnerConfig) -> Self {
        self.config = config;
        self
    }

    /// The alphabet of the target.
    pub fn alphabet(&self) -> &SpaAlphabet<S> {
        &self.alphabet
    }

    /// The alphabet of the hypothesis, containing only the call symbols discovered so far.
    pub fn hypothesis_alphabet(&self) -> &SpaAlphabet<S> {
        &self.hypothesis_alphabet
    }

    /// The sequence bookkeeping.
    pub fn atr(&self) -> &P {
        &self.atr
    }

    /// The membership oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The learner of `procedure`, if it has been discovered.
    pub fn procedural_learner(&self, procedure: S) -> Option<&L> {
        self.learners.get(&procedure)
    }

    /// Starts with the empty hypothesis, which accepts nothing. Procedures are only
    /// discovered through positive counterexamples.
    pub fn start_learning(&mut self) {
        debug!(
            "starting with empty hypothesis over {}",
            self.alphabet.show()
        );
    }

    /// Starts with a hypothesis that accepts the positive `trace`.
    pub fn start_learning_with(&mut self, trace: &[S]) -> Result<bool, LearningError> {
        self.start_learning();
        if !self.oracle.output(trace) {
            return Err(LearningError::NotACounterexample(trace.show()));
        }
        self.refine_hypothesis(trace, true)
    }

    /// The current hypothesis. It borrows the hypotheses of the procedural learners.
    pub fn hypothesis_model(&self) -> Spa<S, &Dfa<S>> {
        let procedures = self
            .learners
            .iter()
            .map(|(p, learner)| (*p, learner.hypothesis()))
            .collect();
        Spa::new_unchecked(self.hypothesis_alphabet.clone(), self.initial, procedures)
    }

    fn procedural_oracle(&self, procedure: S) -> ProceduralOracle<'_, S, O> {
        ProceduralOracle::new(&self.alphabet, procedure, self.atr.tables(), &self.oracle)
    }

    fn hypothesis_accepts(&self, word: &[S]) -> bool {
        self.hypothesis_model().accepts(word)
    }

    /// Refines the hypothesis with `word`, whose correct output is `output`. The word is
    /// processed until the hypothesis classifies it correctly. Returns true if the hypothesis or
    /// the stored sequences changed. A word that is classified correctly from the start and
    /// yields no better sequences is reported as [`LearningError::NotACounterexample`], and so is
    /// a misclassified word that none of the procedural learners can make progress on. A word
    /// that invokes a procedure which was never seen in a positive word is reported as
    /// [`LearningError::UnresolvableProcedure`].
    pub fn refine_hypothesis(&mut self, word: &[S], output: bool) -> Result<bool, LearningError> {
        self.alphabet.validate(word)?;
        trace!("refining with {} ({})", word.show(), output.show());

        let mut changed = false;
        if output {
            changed |= self.discover_procedures(word)?;
        }
        if let Some(unknown) = word
            .iter()
            .find(|sym| self.alphabet.is_call(**sym) && !self.learners.contains_key(*sym))
        {
            return Err(LearningError::UnresolvableProcedure(unknown.show()));
        }

        let mut rounds = 0;
        while self.hypothesis_accepts(word) != output {
            if rounds >= self.config.max_refinements {
                return Err(LearningError::ThresholdExceeded(rounds));
            }
            rounds += 1;

            if !self.refine_once(word, output)? {
                warn!(
                    "procedural learners made no progress on {}",
                    word.show()
                );
                return Err(LearningError::NotACounterexample(word.show()));
            }
            changed = true;
        }

        if !changed {
            return Err(LearningError::NotACounterexample(word.show()));
        }
        debug!("processed {} in {rounds} rounds", word.show());
        Ok(true)
    }

    /// Fixes the initial procedure and creates learners for every procedure that `word`
    /// invokes for the first time. Returns true if anything changed, including shorter
    /// sequences for procedures that were known already.
    fn discover_procedures(&mut self, word: &[S]) -> Result<bool, LearningError> {
        self.alphabet.check_rooted(word)?;
        let root = word[0];

        let mut changed = false;
        match self.initial {
            None => {
                info!("initial procedure is {}", root.show());
                self.initial = Some(root);
                changed = true;
            }
            Some(initial) if initial != root => {
                return Err(LearningError::NotACounterexample(word.show()));
            }
            Some(_) => {}
        }

        let before = self.atr.tables().clone();
        let discovered = self.atr.scan_positive_counterexample(word)?;
        for procedure in discovered {
            if self.learners.contains_key(&procedure) {
                continue;
            }
            info!("discovered procedure {}", procedure.show());
            self.hypothesis_alphabet.add_call_symbol(procedure)?;

            let mut learner = (self.factory)(&self.active_inputs);
            let oracle =
                ProceduralOracle::new(&self.alphabet, procedure, self.atr.tables(), &self.oracle);
            learner.start_learning(&oracle);

            {
                let hypotheses = math::Map::from([(procedure, learner.hypothesis())]);
                let transformers = math::Map::from([(procedure, &learner)]);
                self.atr
                    .scan_refined_procedures(&hypotheses, &transformers, &self.active_inputs);
            }

            self.active_inputs.push(procedure);
            self.learners.insert(procedure, learner);
            for (p, learner) in self.learners.iter_mut() {
                let oracle =
                    ProceduralOracle::new(&self.alphabet, *p, self.atr.tables(), &self.oracle);
                learner.add_alphabet_symbol(procedure, &oracle);
            }
            changed = true;
        }

        if *self.atr.tables() != before {
            debug!("sequences changed to\n{}", self.atr.tables().show());
            changed = true;
        }
        Ok(changed)
    }

    /// Finds the first invocation in `word` whose local trace the hypothesis of the invoked
    /// procedure misclassifies and returns the procedure together with the trace. Invocations
    /// are considered outermost first.
    fn find_local_counterexample(
        &self,
        word: &[S],
        output: bool,
    ) -> Result<Option<(S, Vec<S>)>, LearningError> {
        for (i, sym) in word.iter().enumerate() {
            if !self.alphabet.is_call(*sym) {
                continue;
            }
            let Some(return_idx) = self.alphabet.find_return_index(word, i + 1) else {
                continue;
            };
            let local = self.alphabet.normalize(&word[i + 1..return_idx], 0)?;
            let learner = self
                .learners
                .get(sym)
                .ok_or_else(|| LearningError::UnresolvableProcedure(sym.show()))?;

            let faulty = if output {
                !learner.hypothesis().accepts(&local)
            } else {
                learner.hypothesis().accepts(&local) && !self.procedural_oracle(*sym).output(&local)
            };
            if faulty {
                debug!(
                    "local counterexample {} for {} at position {i}",
                    local.show(),
                    sym.show()
                );
                return Ok(Some((*sym, local)));
            }
        }
        Ok(None)
    }

    /// Performs a single refinement of one procedure, returns whether its learner changed.
    fn refine_once(&mut self, word: &[S], output: bool) -> Result<bool, LearningError> {
        let Some((procedure, local)) = self.find_local_counterexample(word, output)? else {
            warn!("no invocation in {} is classified wrongly", word.show());
            return Ok(false);
        };
        let learner = self
            .learners
            .get_mut(&procedure)
            .ok_or_else(|| LearningError::UnresolvableProcedure(procedure.show()))?;
        let oracle =
            ProceduralOracle::new(&self.alphabet, procedure, self.atr.tables(), &self.oracle);

        let mut progress = false;
        while learner.refine_hypothesis(&local, output, &oracle) {
            progress = true;
        }

        if progress {
            let hypotheses: math::Map<S, &Dfa<S>> = self
                .learners
                .iter()
                .map(|(p, learner)| (*p, learner.hypothesis()))
                .collect();
            if self
                .atr
                .scan_refined_procedures(&hypotheses, &self.learners, &self.active_inputs)
            {
                debug!("sequences changed to\n{}", self.atr.tables().show());
            }
        }
        Ok(progress)
    }

    /// Runs the learning loop against `equivalence` until no counterexample is found and
    /// returns the final hypothesis.
    pub fn infer<E: EquivalenceOracle<S>>(
        &mut self,
        equivalence: &E,
    ) -> Result<Spa<S, Dfa<S>>, LearningError> {
        let start = std::time::Instant::now();
        self.start_learning();

        let mut iteration = 0;
        loop {
            let counterexample = {
                let hypothesis = self.hypothesis_model();
                equivalence.find_counterexample(&hypothesis)
            };
            let Some((counterexample, output)) = counterexample else {
                break;
            };
            iteration += 1;
            if iteration > self.config.max_refinements {
                return Err(LearningError::ThresholdExceeded(self.config.max_refinements));
            }
            debug!(
                "counterexample {} ({}) in iteration {iteration}",
                counterexample.show(),
                output.show()
            );
            self.refine_hypothesis(&counterexample, output)?;
        }

        info!(
            "learning took {} and {iteration} equivalence queries",
            show_duration(start.elapsed())
        );
        let model = self.hypothesis_model();
        let procedures = model
            .procedures()
            .iter()
            .map(|(p, dfa)| (*p, (*dfa).clone()))
            .collect();
        Ok(Spa::new_unchecked(
            model.alphabet().clone(),
            model.initial_procedure(),
            procedures,
        ))
    }
}

#[cfg(test)]
mod tests {
    use spa_core::prelude::*;

    use super::{LearnerConfig, SpaLearner};
    use crate::{
        error::LearningError,
        oracle::SimulatorOracle,
        tests::{double_a_spa, palindrome_spa, word},
    };

    #[test_log::test]
    fn positive_trace_discovers_procedure() {
        let spa = double_a_spa();
        let oracle = SimulatorOracle::new(spa.clone());
        let mut learner = SpaLearner::with_default_atr(spa.alphabet().clone(), oracle);
        assert!(!learner.hypothesis_model().accepts(&word("FaaR")));

        assert_eq!(learner.start_learning_with(&word("FaaR")), Ok(true));
        let hypothesis = learner.hypothesis_model();
        assert_eq!(hypothesis.initial_procedure(), Some('F'));
        assert!(hypothesis.accepts(&word("FaaR")));
        assert!(hypothesis.alphabet().is_call('F'));
        assert!(spa.equivalent_procedures(&hypothesis));
    }

    #[test]
    fn rejected_seed() {
        let spa = double_a_spa();
        let oracle = SimulatorOracle::new(spa.clone());
        let mut learner = SpaLearner::with_default_atr(spa.alphabet().clone(), oracle);
        assert_eq!(
            learner.start_learning_with(&word("FaR")),
            Err(LearningError::NotACounterexample("FaR".into()))
        );
    }

    #[test]
    fn malformed_words() {
        let spa = palindrome_spa();
        let mut learner = SpaLearner::with_optimizing_atr(
            spa.alphabet().clone(),
            SimulatorOracle::new(spa.clone()),
        );
        assert_eq!(
            learner.refine_hypothesis(&word("FxR"), true),
            Err(LearningError::Core(Error::UnknownSymbol("x".into())))
        );
        assert!(matches!(
            learner.refine_hypothesis(&word("FaRFR"), true),
            Err(LearningError::Core(Error::NotRooted(_)))
        ));
        assert_eq!(
            learner.refine_hypothesis(&word("aa"), false),
            Err(LearningError::NotACounterexample("aa".into()))
        );
    }

    #[test]
    fn procedures_only_seen_in_negative_words() {
        let spa = palindrome_spa();
        let oracle = SimulatorOracle::new(spa.clone());
        let mut learner = SpaLearner::with_default_atr(spa.alphabet().clone(), oracle);
        assert_eq!(
            learner.refine_hypothesis(&word("FaaR"), false),
            Err(LearningError::UnresolvableProcedure("F".into()))
        );

        learner.start_learning_with(&word("FR")).unwrap();
        assert_eq!(
            learner.refine_hypothesis(&word("FGccRR"), false),
            Err(LearningError::UnresolvableProcedure("G".into()))
        );
        assert_eq!(learner.hypothesis_alphabet().num_calls(), 1);

        // once G shows up in a positive word the same negative word can be processed
        let positive = word("FGcRR");
        if !learner.hypothesis_model().accepts(&positive) {
            learner.refine_hypothesis(&positive, true).unwrap();
        }
        assert_ne!(
            learner.refine_hypothesis(&word("FGccRR"), false),
            Err(LearningError::UnresolvableProcedure("G".into()))
        );
    }

    #[test_log::test]
    fn shorter_sequences_count_as_progress() {
        let spa = palindrome_spa();
        let mut learner = SpaLearner::with_optimizing_atr(
            spa.alphabet().clone(),
            SimulatorOracle::new(spa.clone()),
        );
        assert_eq!(learner.start_learning_with(&word("FaFGcRRaR")), Ok(true));
        assert_eq!(learner.atr().access_sequence('G'), Some(&word("FaF")[..]));

        let w = word("FGcRR");
        assert_eq!(learner.refine_hypothesis(&w, true), Ok(true));
        assert_eq!(learner.atr().access_sequence('G'), Some(&word("F")[..]));
        assert_eq!(learner.atr().return_sequence('G'), Some(&word("R")[..]));
        assert!(learner.hypothesis_model().accepts(&w));

        // nothing left to learn from the same word
        assert_eq!(
            learner.refine_hypothesis(&w, true),
            Err(LearningError::NotACounterexample("FGcRR".into()))
        );
    }

    #[test_log::test]
    fn counterexamples_are_resolved() {
        let spa = palindrome_spa();
        let mut learner = SpaLearner::with_optimizing_atr(
            spa.alphabet().clone(),
            SimulatorOracle::new(spa.clone()),
        );
        learner.start_learning_with(&word("FR")).unwrap();
        assert_eq!(learner.hypothesis_alphabet().num_calls(), 1);

        for (w, output) in [("FaFRaR", true), ("FGcRR", true), ("FabR", false)] {
            let w = word(w);
            if learner.hypothesis_model().accepts(&w) != output {
                assert_eq!(learner.refine_hypothesis(&w, output), Ok(true));
            }
            assert_eq!(learner.hypothesis_model().accepts(&w), output);
        }
        assert_eq!(learner.hypothesis_alphabet().num_calls(), 2);
        assert_eq!(learner.active_inputs, vec!['a', 'b', 'c', 'F', 'G']);

        // every procedure is embedded with sequences that the target accepts
        for p in ['F', 'G'] {
            let global = learner
                .atr()
                .tables()
                .embed_terminating(spa.alphabet(), p)
                .unwrap();
            assert!(spa.accepts(&global));
        }
    }

    #[test]
    fn wrong_initial_procedure() {
        let spa = palindrome_spa();
        let oracle = SimulatorOracle::new(spa.clone());
        let mut learner = SpaLearner::with_default_atr(spa.alphabet().clone(), oracle);
        learner.start_learning_with(&word("FR")).unwrap();
        assert_eq!(
            learner.refine_hypothesis(&word("GcR"), true),
            Err(LearningError::NotACounterexample("GcR".into()))
        );
    }

    #[test]
    fn threshold() {
        let spa = palindrome_spa();
        let oracle = SimulatorOracle::new(spa.clone());
        let mut learner = SpaLearner::with_default_atr(spa.alphabet().clone(), oracle)
            .with_config(LearnerConfig { max_refinements: 0 });
        // discovering F already accepts `FR`, everything else needs refinement rounds
        assert_eq!(learner.refine_hypothesis(&word("FR"), true), Ok(true));
        assert_eq!(
            learner.refine_hypothesis(&word("FaFRaR"), true),
            Err(LearningError::ThresholdExceeded(0))
        );
    }
}
