use std::{collections::VecDeque, fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::{alphabet::Symbol, math, Show};

/// Read-only view of a deterministic finite acceptor over the procedural alphabet of a
/// system of procedural automata. Undefined transitions lead to an implicit rejecting sink, so
/// implementors only need to provide the transitions they actually have.
pub trait ProceduralDfa<S: Symbol> {
    /// The type of the states, which are handed out by value.
    type State: Copy + Eq + Hash + Debug;

    /// Returns the initial state.
    fn initial(&self) -> Self::State;

    /// Returns the successor of `state` on `symbol`, or `None` if the transition is undefined.
    fn successor(&self, state: Self::State, symbol: S) -> Option<Self::State>;

    /// Returns true if `state` is accepting.
    fn is_accepting(&self, state: Self::State) -> bool;

    /// The number of states.
    fn size(&self) -> usize;

    /// All states, the initial state need not come first.
    fn states(&self) -> Vec<Self::State>;

    /// Runs `word` from the initial state and returns the reached state. Gives back `None` as
    /// soon as an undefined transition is taken.
    fn reached(&self, word: &[S]) -> Option<Self::State> {
        word.iter()
            .try_fold(self.initial(), |state, sym| self.successor(state, *sym))
    }

    /// Returns true if `word` leads to an accepting state.
    fn accepts(&self, word: &[S]) -> bool {
        self.reached(word).is_some_and(|q| self.is_accepting(q))
    }

    /// Computes the length-lexicographically minimal access word of every state that is reachable
    /// via `inputs`, where the order of symbols is the order in which they appear in `inputs`.
    /// Words are returned in length-lexicographic order and the first word is always `ε`.
    fn state_cover(&self, inputs: &[S]) -> Vec<Vec<S>> {
        minimal_representatives(self, inputs)
            .into_iter()
            .map(|(word, _)| word)
            .collect()
    }

    /// Extends every word of the state cover by every symbol of `inputs` for which the
    /// transition from the respective state is defined.
    fn transition_cover(&self, inputs: &[S]) -> Vec<Vec<S>> {
        minimal_representatives(self, inputs)
            .into_iter()
            .flat_map(|(word, state)| {
                inputs
                    .iter()
                    .filter(move |sym| self.successor(state, **sym).is_some())
                    .map(move |sym| {
                        let mut extended = word.clone();
                        extended.push(*sym);
                        extended
                    })
            })
            .collect()
    }
}

impl<S: Symbol, D: ProceduralDfa<S>> ProceduralDfa<S> for &D {
    type State = D::State;

    fn initial(&self) -> Self::State {
        D::initial(self)
    }

    fn successor(&self, state: Self::State, symbol: S) -> Option<Self::State> {
        D::successor(self, state, symbol)
    }

    fn is_accepting(&self, state: Self::State) -> bool {
        D::is_accepting(self, state)
    }

    fn size(&self) -> usize {
        D::size(self)
    }

    fn states(&self) -> Vec<Self::State> {
        D::states(self)
    }
}

/// Breadth first exploration from the initial state, which yields the length-lexicographically
/// minimal representative of every reachable state.
fn minimal_representatives<S, D>(dfa: &D, inputs: &[S]) -> Vec<(Vec<S>, D::State)>
where
    S: Symbol,
    D: ProceduralDfa<S> + ?Sized,
{
    let initial = dfa.initial();
    let mut seen = math::Set::from_iter([initial]);
    let mut queue = VecDeque::from([(vec![], initial)]);
    let mut out = Vec::with_capacity(dfa.size());

    while let Some((access, state)) = queue.pop_front() {
        for sym in inputs {
            if let Some(successor) = dfa.successor(state, *sym) {
                if seen.insert(successor) {
                    let mut extended: Vec<S> = access.clone();
                    extended.push(*sym);
                    queue.push_back((extended, successor));
                }
            }
        }
        out.push((access, state));
    }

    out
}

/// Searches for a shortest word over `inputs` on which `left` and `right` disagree. Both automata
/// are explored synchronously, undefined transitions move into a rejecting sink. Returns `None`
/// if the two automata accept the same language over `inputs`.
pub fn separating_word<S, L, R>(left: &L, right: &R, inputs: &[S]) -> Option<Vec<S>>
where
    S: Symbol,
    L: ProceduralDfa<S> + ?Sized,
    R: ProceduralDfa<S> + ?Sized,
{
    let accepting_left = |q: Option<L::State>| q.is_some_and(|q| left.is_accepting(q));
    let accepting_right = |q: Option<R::State>| q.is_some_and(|q| right.is_accepting(q));

    let origin = (Some(left.initial()), Some(right.initial()));
    let mut seen = math::Set::from_iter([origin]);
    let mut queue = VecDeque::from([(vec![], origin)]);

    while let Some((word, (l, r))) = queue.pop_front() {
        if accepting_left(l) != accepting_right(r) {
            return Some(word);
        }
        for sym in inputs {
            let successor = (
                l.and_then(|q| left.successor(q, *sym)),
                r.and_then(|q| right.successor(q, *sym)),
            );
            if successor == (None, None) {
                continue;
            }
            if seen.insert(successor) {
                let mut extended: Vec<S> = word.clone();
                extended.push(*sym);
                queue.push_back((extended, successor));
            }
        }
    }

    None
}

/// A deterministic finite automaton whose states are densely numbered from `0`. Transitions are
/// partial, a missing transition rejects.
///
/// # Example
/// ```
/// use spa_core::prelude::*;
///
/// let dfa = Dfa::builder()
///     .with_state_colors([false, false, true])
///     .with_edges([(0, 'a', 1), (1, 'a', 2)])
///     .into_dfa(0);
/// assert!(dfa.accepts(&['a', 'a']));
/// assert!(!dfa.accepts(&['a']));
/// assert!(!dfa.accepts(&['a', 'a', 'a']));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dfa<S: Symbol> {
    initial: usize,
    accepting: Vec<bool>,
    transitions: Vec<math::Map<S, usize>>,
}

impl<S: Symbol> Dfa<S> {
    /// Creates an automaton with a single initial state, which has no outgoing transitions.
    pub fn new(initial_accepting: bool) -> Self {
        Self {
            initial: 0,
            accepting: vec![initial_accepting],
            transitions: vec![math::Map::default()],
        }
    }

    /// The automaton that rejects every word.
    pub fn rejecting() -> Self {
        Self::new(false)
    }

    /// Returns a [`DfaBuilder`] for concise construction.
    pub fn builder() -> DfaBuilder<S> {
        DfaBuilder::default()
    }

    /// Adds a new state and returns its index.
    pub fn add_state(&mut self, accepting: bool) -> usize {
        self.accepting.push(accepting);
        self.transitions.push(math::Map::default());
        self.accepting.len() - 1
    }

    /// Sets the transition from `source` on `symbol` to `target` and returns the previous target,
    /// if there was one.
    ///
    /// # Panics
    /// If `source` or `target` is not a state of the automaton.
    pub fn add_edge(&mut self, source: usize, symbol: S, target: usize) -> Option<usize> {
        assert!(target < self.accepting.len(), "target state does not exist");
        self.transitions[source].insert(symbol, target)
    }

    /// Changes whether `state` is accepting.
    pub fn set_accepting(&mut self, state: usize, accepting: bool) {
        self.accepting[state] = accepting;
    }

    /// Changes the initial state.
    pub fn set_initial(&mut self, state: usize) {
        assert!(state < self.accepting.len(), "initial state does not exist");
        self.initial = state;
    }

    /// Iterates over the outgoing transitions of `state` as pairs of symbol and target.
    pub fn edges_from(&self, state: usize) -> impl Iterator<Item = (S, usize)> + '_ {
        self.transitions
            .get(state)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(sym, target)| (*sym, *target)))
    }

    /// Returns true if every state has a transition on every symbol of `inputs`.
    pub fn is_complete(&self, inputs: &[S]) -> bool {
        self.transitions
            .iter()
            .all(|edges| inputs.iter().all(|sym| edges.contains_key(sym)))
    }
}

impl<S: Symbol> ProceduralDfa<S> for Dfa<S> {
    type State = usize;

    fn initial(&self) -> usize {
        self.initial
    }

    fn successor(&self, state: usize, symbol: S) -> Option<usize> {
        self.transitions.get(state)?.get(&symbol).copied()
    }

    fn is_accepting(&self, state: usize) -> bool {
        self.accepting.get(state).copied().unwrap_or(false)
    }

    fn size(&self) -> usize {
        self.accepting.len()
    }

    fn states(&self) -> Vec<usize> {
        (0..self.accepting.len()).collect()
    }
}

impl<S: Symbol> Show for Dfa<S> {
    fn show(&self) -> String {
        (0..self.size())
            .map(|q| {
                format!(
                    "{}{}{} [{}]",
                    if q == self.initial { "->" } else { "  " },
                    if self.accepting[q] { "*" } else { " " },
                    q,
                    self.edges_from(q)
                        .map(|(sym, p)| format!("{} -> {}", sym.show(), p))
                        .join(", ")
                )
            })
            .join("\n")
    }
}

/// Helper for building a [`Dfa`] from a list of state colors and a list of edges. States are
/// identified by their index; a state that is mentioned by an edge but has no color is rejecting.
/// If two edges leave the same state on the same symbol, the one given last is kept.
#[derive(Clone, Debug)]
pub struct DfaBuilder<S> {
    colors: Vec<bool>,
    edges: Vec<(usize, S, usize)>,
}

impl<S> Default for DfaBuilder<S> {
    fn default() -> Self {
        Self {
            colors: vec![],
            edges: vec![],
        }
    }
}

impl<S: Symbol> DfaBuilder<S> {
    /// Assigns acceptance to the states in the order in which they are given.
    pub fn with_state_colors<I: IntoIterator<Item = bool>>(mut self, iter: I) -> Self {
        self.colors.extend(iter);
        self
    }

    /// Adds a list of edges given as `(source, symbol, target)` triples.
    pub fn with_edges<I: IntoIterator<Item = (usize, S, usize)>>(mut self, iter: I) -> Self {
        self.edges.extend(iter);
        self
    }

    /// Builds the automaton with `initial` as its initial state.
    pub fn into_dfa(self, initial: usize) -> Dfa<S> {
        let size = self
            .edges
            .iter()
            .flat_map(|(p, _, q)| [*p + 1, *q + 1])
            .chain([self.colors.len(), initial + 1])
            .max()
            .unwrap_or(1);

        let mut transitions = vec![math::Map::default(); size];
        for (source, sym, target) in self.edges {
            transitions[source].insert(sym, target);
        }
        let accepting = (0..size)
            .map(|q| self.colors.get(q).copied().unwrap_or(false))
            .collect();

        Dfa {
            initial,
            accepting,
            transitions,
        }
    }
}
