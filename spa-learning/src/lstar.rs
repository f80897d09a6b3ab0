use std::fmt::Debug;

use bimap::BiMap;
use fixedbitset::FixedBitSet;
use itertools::Itertools;
use spa_core::{prelude::*, show_duration};
use tracing::{debug, trace};

use crate::{learner::ProceduralLearner, oracle::MembershipOracle};

type Word<S> = Vec<S>;

/// An implementation of the L* algorithm for the local language of a single procedure.
///
/// The observation table consists of a prefix-closed set of base words, each of which
/// represents one state of the hypothesis, and a suffix-closed list of experiments that always
/// starts with the empty word. Every row of the table is stored as a bitset whose `i`-th bit is
/// the output for the concatenation of the row word with the `i`-th experiment. Counterexamples
/// are processed by adding all of their suffixes as experiments, which keeps distinct base
/// words distinguishable, so the table only ever needs to be closed.
#[derive(Clone)]
pub struct LStar<S: Symbol> {
    // the inputs the hypothesis is defined over, may grow
    inputs: Vec<S>,
    // the minimal access words forming the base states
    base: Vec<Word<S>>,
    // all known experiments, the empty word comes first
    experiments: Vec<Word<S>>,
    // mapping from base words and their one letter extensions to the observed outputs
    table: math::Map<Word<S>, FixedBitSet>,
    // all queries that have been posed so far, together with their output
    queries: math::Map<Word<S>, bool>,
    hypothesis: Dfa<S>,
    // maps each state of the hypothesis to the base word it was constructed from
    access: BiMap<usize, Word<S>>,
}

impl<S: Symbol> LStar<S> {
    /// Creates a learner over the given inputs. Before the hypothesis is meaningful,
    /// [`ProceduralLearner::start_learning`] has to be called.
    pub fn new(inputs: &[S]) -> Self {
        let mut access = BiMap::new();
        access.insert(0, vec![]);
        Self {
            inputs: inputs.to_vec(),
            base: vec![vec![]],
            experiments: vec![vec![]],
            table: math::Map::default(),
            queries: math::Map::default(),
            hypothesis: Dfa::rejecting(),
            access,
        }
    }

    /// The inputs the hypothesis is currently defined over.
    pub fn inputs(&self) -> &[S] {
        &self.inputs
    }

    /// The experiments, i.e. the columns of the observation table.
    pub fn experiments(&self) -> &[Word<S>] {
        &self.experiments
    }

    /// The number of distinct membership queries that were posed.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    fn one_letter_extensions(&self) -> Vec<Word<S>> {
        self.base
            .iter()
            .flat_map(|w| {
                std::iter::once(w.clone()).chain(self.inputs.iter().map(move |a| {
                    let mut x = w.clone();
                    x.push(*a);
                    x
                }))
            })
            .unique()
            .collect()
    }

    /// Fills all missing cells of the table, posing the queries that are not yet cached as one
    /// batch.
    fn update_table<O: MembershipOracle<S> + ?Sized>(&mut self, oracle: &O) {
        let rows = self.one_letter_extensions();
        let experiment_count = self.experiments.len();

        let mut missing: math::Set<Word<S>> = math::Set::default();
        for mr in &rows {
            let stored = self.table.get(mr).map_or(0, FixedBitSet::len);
            for experiment in &self.experiments[stored..] {
                let concat = mr.iter().chain(experiment).copied().collect_vec();
                if !self.queries.contains_key(&concat) {
                    missing.insert(concat);
                }
            }
        }

        if !missing.is_empty() {
            let missing = missing.into_iter().collect_vec();
            trace!("posing {} membership queries", missing.len());
            let answers = oracle.output_batch(&missing);
            debug_assert_eq!(answers.len(), missing.len());
            self.queries.extend(missing.into_iter().zip(answers));
        }

        for mr in rows {
            let row = self.table.entry(mr.clone()).or_default();
            for i in row.len()..experiment_count {
                let concat = mr.iter().chain(&self.experiments[i]).copied().collect_vec();
                let output = self.queries.get(&concat).copied().unwrap_or(false);
                row.grow(i + 1);
                row.set(i, output);
            }
        }
    }

    /// The one letter extensions whose rows are not present among the base rows. Of every new
    /// row only the first word exhibiting it is returned.
    fn rows_to_promote(&self) -> Vec<Word<S>> {
        let known: math::Set<&FixedBitSet> = self
            .base
            .iter()
            .filter_map(|b| self.table.get(b))
            .collect();
        let mut seen = math::Set::default();

        self.one_letter_extensions()
            .into_iter()
            .filter(|word| {
                let row = &self.table[word];
                !known.contains(row) && seen.insert(row.clone())
            })
            .collect()
    }

    fn close_table<O: MembershipOracle<S> + ?Sized>(&mut self, oracle: &O) {
        loop {
            self.update_table(oracle);
            let todo = self.rows_to_promote();
            if todo.is_empty() {
                break;
            }
            trace!(
                "promoting rows {}",
                todo.iter().map(|w| w.show()).join(", ")
            );
            self.base.extend(todo);
        }
        trace!("closed table\n{:?}", self);
    }

    fn build_hypothesis(&mut self) {
        let start = std::time::Instant::now();

        let mut observations = math::Map::default();
        let mut dfa = Dfa::new(false);
        let mut access = BiMap::new();

        for (i, mr) in self.base.iter().enumerate() {
            let row = &self.table[mr];
            let state = if i == 0 { 0 } else { dfa.add_state(false) };
            dfa.set_accepting(state, row.contains(0));
            observations.insert(row, state);
            access.insert(state, mr.clone());
        }

        for (i, mr) in self.base.iter().enumerate() {
            for a in &self.inputs {
                let mut extended = mr.clone();
                extended.push(*a);
                if let Some(target) = self
                    .table
                    .get(&extended)
                    .and_then(|row| observations.get(row))
                {
                    dfa.add_edge(i, *a, *target);
                }
            }
        }

        debug!(
            "building hypothesis with {} states took {}",
            dfa.size(),
            show_duration(start.elapsed())
        );
        self.hypothesis = dfa;
        self.access = access;
    }
}

impl<S: Symbol> AccessSequenceTransformer<S> for LStar<S> {
    fn transform_access_sequence(&self, word: &[S]) -> Vec<S> {
        self.hypothesis
            .reached(word)
            .and_then(|state| self.access.get_by_left(&state))
            .cloned()
            .unwrap_or_else(|| word.to_vec())
    }

    fn is_access_sequence(&self, word: &[S]) -> bool {
        self.access.contains_right(word)
    }
}

impl<S: Symbol> ProceduralLearner<S> for LStar<S> {
    fn start_learning<O: MembershipOracle<S> + ?Sized>(&mut self, oracle: &O) {
        self.close_table(oracle);
        self.build_hypothesis();
    }

    fn refine_hypothesis<O: MembershipOracle<S> + ?Sized>(
        &mut self,
        word: &[S],
        output: bool,
        oracle: &O,
    ) -> bool {
        if self.hypothesis.accepts(word) == output {
            return false;
        }
        let size = self.hypothesis.size();

        for i in 0..word.len() {
            let suffix = word[i..].to_vec();
            if !self.experiments.contains(&suffix) {
                trace!("adding experiment {}", suffix.show());
                self.experiments.push(suffix);
            }
        }
        self.close_table(oracle);
        self.build_hypothesis();

        self.hypothesis.size() > size
    }

    fn add_alphabet_symbol<O: MembershipOracle<S> + ?Sized>(&mut self, symbol: S, oracle: &O) {
        if self.inputs.contains(&symbol) {
            return;
        }
        self.inputs.push(symbol);
        self.close_table(oracle);
        self.build_hypothesis();
    }

    fn hypothesis(&self) -> &Dfa<S> {
        &self.hypothesis
    }
}

impl<S: Symbol> Debug for LStar<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        let mut header = vec!["MR".to_string()];

        for e in &self.experiments {
            header.push(e.show());
        }
        builder.push_record(header);

        for mr in &self.base {
            let mut row = vec![mr.show()];
            match self.table.get(mr) {
                Some(outputs) => {
                    row.extend((0..outputs.len()).map(|i| (outputs[i] as u8).to_string()))
                }
                None => row.push("?".into()),
            }
            builder.push_record(row);
        }

        write!(f, "{}", builder.build())
    }
}

#[cfg(test)]
mod tests {
    use spa_core::prelude::*;

    use super::LStar;
    use crate::{learner::ProceduralLearner, oracle::MembershipOracle};

    struct DfaOracle(Dfa<char>);

    impl MembershipOracle<char> for DfaOracle {
        fn output(&self, word: &[char]) -> bool {
            self.0.accepts(word)
        }
    }

    fn even_as() -> Dfa<char> {
        Dfa::builder()
            .with_state_colors([true, false])
            .with_edges([(0, 'a', 1), (1, 'a', 0), (0, 'b', 0), (1, 'b', 1)])
            .into_dfa(0)
    }

    #[test]
    fn learns_parity() {
        let oracle = DfaOracle(even_as());
        let mut lstar = LStar::new(&['a', 'b']);
        lstar.start_learning(&oracle);
        assert_eq!(lstar.hypothesis().size(), 2);
        assert!(separating_word(lstar.hypothesis(), &oracle.0, &['a', 'b']).is_none());
        assert!(!lstar.refine_hypothesis(&['a', 'a'], true, &oracle));
    }

    #[test_log::test]
    fn counterexamples_add_states() {
        // accepts exactly `aa`, which needs a rejecting sink
        let target = Dfa::builder()
            .with_state_colors([false, false, true, false])
            .with_edges([
                (0, 'a', 1),
                (1, 'a', 2),
                (2, 'a', 3),
                (3, 'a', 3),
            ])
            .into_dfa(0);
        let oracle = DfaOracle(target);
        let mut lstar = LStar::new(&['a']);
        lstar.start_learning(&oracle);
        assert_eq!(lstar.hypothesis().size(), 1);
        assert!(!lstar.hypothesis().accepts(&['a', 'a']));

        assert!(lstar.refine_hypothesis(&['a', 'a'], true, &oracle));
        assert!(lstar.hypothesis().accepts(&['a', 'a']));
        assert!(!lstar.refine_hypothesis(&['a', 'a'], true, &oracle));
        assert_eq!(lstar.hypothesis().size(), 4);
        assert!(separating_word(lstar.hypothesis(), &oracle.0, &['a']).is_none());
        assert!(lstar.experiments().contains(&vec!['a', 'a']));
    }

    #[test]
    fn growing_inputs() {
        let oracle = DfaOracle(even_as());
        let mut lstar = LStar::new(&['a']);
        lstar.start_learning(&oracle);
        assert!(!lstar.hypothesis().accepts(&['b']));

        lstar.add_alphabet_symbol('b', &oracle);
        assert_eq!(lstar.inputs(), &['a', 'b']);
        assert!(lstar.hypothesis().is_complete(&['a', 'b']));
        assert!(separating_word(lstar.hypothesis(), &oracle.0, &['a', 'b']).is_none());
    }

    #[test]
    fn canonical_access_sequences() {
        let oracle = DfaOracle(even_as());
        let mut lstar = LStar::new(&['a', 'b']);
        lstar.start_learning(&oracle);

        assert_eq!(lstar.transform_access_sequence(&['b', 'a', 'b']), vec!['a']);
        assert_eq!(lstar.transform_access_sequence(&['a', 'a']), vec![]);
        assert!(lstar.is_access_sequence(&['a']));
        assert!(!lstar.is_access_sequence(&['b']));
    }

    #[test]
    fn queries_are_cached() {
        let oracle = DfaOracle(even_as());
        let mut lstar = LStar::new(&['a', 'b']);
        lstar.start_learning(&oracle);
        let posed = lstar.query_count();
        lstar.start_learning(&oracle);
        assert_eq!(lstar.query_count(), posed);
        assert!(format!("{lstar:?}").contains("MR"));
    }
}
