use std::{
    fmt::Debug,
    hash::{Hash, Hasher},
    rc::Rc,
};

use itertools::Itertools;
use tracing::trace;

use crate::{
    alphabet::{Symbol, SymbolType},
    dfa::{separating_word, Dfa, ProceduralDfa},
    math, Error, Show, SpaAlphabet,
};

/// One suspended procedure invocation, the procedure and the state it continues in once the
/// callee returns.
#[derive(Debug)]
struct Frame<S, Q> {
    procedure: S,
    state: Q,
    below: CallStack<S, Q>,
}

/// A persistent stack of suspended procedure invocations. Pushing creates a new stack that shares
/// all existing frames with the stack it was created from, so configurations that have a common
/// call history never copy it. Equality and hashing are structural.
pub struct CallStack<S, Q> {
    top: Option<Rc<Frame<S, Q>>>,
    depth: usize,
}

impl<S, Q> CallStack<S, Q> {
    /// The empty stack.
    pub fn empty() -> Self {
        Self {
            top: None,
            depth: 0,
        }
    }

    /// Returns true if there are no suspended invocations.
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// The number of suspended invocations.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns a new stack with the given frame on top of `self`.
    pub fn push(&self, procedure: S, state: Q) -> Self {
        Self {
            top: Some(Rc::new(Frame {
                procedure,
                state,
                below: self.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Iterates over the frames from the top of the stack to the bottom.
    pub fn iter(&self) -> impl Iterator<Item = (&S, &Q)> + '_ {
        std::iter::successors(self.top.as_deref(), |frame| frame.below.top.as_deref())
            .map(|frame| (&frame.procedure, &frame.state))
    }
}

impl<S: Copy, Q: Copy> CallStack<S, Q> {
    /// Splits off the top frame, returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<(S, Q, CallStack<S, Q>)> {
        self.top
            .as_ref()
            .map(|frame| (frame.procedure, frame.state, frame.below.clone()))
    }
}

impl<S, Q> Clone for CallStack<S, Q> {
    fn clone(&self) -> Self {
        Self {
            top: self.top.clone(),
            depth: self.depth,
        }
    }
}

impl<S, Q> Default for CallStack<S, Q> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: PartialEq, Q: PartialEq> PartialEq for CallStack<S, Q> {
    fn eq(&self, other: &Self) -> bool {
        if self.depth != other.depth {
            return false;
        }
        let mut left = self.top.as_ref();
        let mut right = other.top.as_ref();
        loop {
            match (left, right) {
                (None, None) => return true,
                (Some(l), Some(r)) if Rc::ptr_eq(l, r) => return true,
                (Some(l), Some(r)) => {
                    if l.procedure != r.procedure || l.state != r.state {
                        return false;
                    }
                    left = l.below.top.as_ref();
                    right = r.below.top.as_ref();
                }
                _ => return false,
            }
        }
    }
}

impl<S: Eq, Q: Eq> Eq for CallStack<S, Q> {}

impl<S: Hash, Q: Hash> Hash for CallStack<S, Q> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.depth.hash(state);
        for (procedure, q) in self.iter() {
            procedure.hash(state);
            q.hash(state);
        }
    }
}

impl<S: Debug, Q: Debug> Debug for CallStack<S, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// The runtime state of a system of procedural automata. Besides the three pseudo states, a
/// configuration consists of the currently executing procedure, the state that procedure is in and
/// the stack of suspended invocations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Configuration<S, Q> {
    /// Nothing has been read yet.
    Init,
    /// Rejecting and absorbing.
    Sink,
    /// The initial procedure has returned, accepting and absorbing.
    Terminating,
    /// Some procedure is executing.
    Running {
        /// The executing procedure.
        procedure: S,
        /// The state of the executing procedure.
        state: Q,
        /// Suspended invocations, empty if `procedure` was invoked from [`Configuration::Init`].
        stack: CallStack<S, Q>,
    },
}

impl<S, Q> Configuration<S, Q> {
    /// Only [`Configuration::Terminating`] is accepting.
    pub fn is_accepting(&self) -> bool {
        matches!(self, Configuration::Terminating)
    }

    /// Returns true for [`Configuration::Sink`].
    pub fn is_sink(&self) -> bool {
        matches!(self, Configuration::Sink)
    }

    /// The current nesting depth of procedure invocations, `0` for the pseudo states.
    pub fn depth(&self) -> usize {
        match self {
            Configuration::Running { stack, .. } => stack.depth() + 1,
            _ => 0,
        }
    }
}

impl<S: Show, Q: Debug> Show for Configuration<S, Q> {
    fn show(&self) -> String {
        match self {
            Configuration::Init => "init".into(),
            Configuration::Sink => "sink".into(),
            Configuration::Terminating => "acc".into(),
            Configuration::Running {
                procedure,
                state,
                stack,
            } => format!(
                "({}, {:?}) [{}]",
                procedure.show(),
                state,
                stack
                    .iter()
                    .map(|(p, q)| format!("({}, {:?})", p.show(), q))
                    .join(", ")
            ),
        }
    }
}

/// A system of procedural automata, a collection of procedures given as automata over the
/// procedural alphabet that invoke each other through call symbols and terminate through the
/// single return symbol. If no initial procedure is set, the system accepts nothing.
#[derive(Clone, Debug)]
pub struct Spa<S: Symbol, D> {
    alphabet: SpaAlphabet<S>,
    initial: Option<S>,
    procedures: math::Map<S, D>,
}

impl<S: Symbol, D: ProceduralDfa<S>> Spa<S, D> {
    /// Creates a new system and verifies that every procedure belongs to a call symbol and that
    /// the initial procedure, if any, is one of the given procedures.
    pub fn new<I>(
        alphabet: SpaAlphabet<S>,
        initial: Option<S>,
        procedures: I,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (S, D)>,
    {
        let procedures: math::Map<S, D> = procedures.into_iter().collect();

        if let Some(sym) = procedures.keys().find(|sym| !alphabet.is_call(**sym)) {
            return Err(Error::NotACallSymbol(sym.show()));
        }
        if let Some(initial) = initial {
            if !procedures.contains_key(&initial) {
                return Err(Error::UnknownInitialProcedure(initial.show()));
            }
        }

        Ok(Self::new_unchecked(alphabet, initial, procedures))
    }

    /// Creates a new system without verifying that the procedures are consistent with the alphabet.
    pub fn new_unchecked(
        alphabet: SpaAlphabet<S>,
        initial: Option<S>,
        procedures: math::Map<S, D>,
    ) -> Self {
        Self {
            alphabet,
            initial,
            procedures,
        }
    }

    /// The configuration before any symbol has been read.
    pub fn initial_configuration(&self) -> Configuration<S, D::State> {
        Configuration::Init
    }

    /// The transition function of the system. It is total: anything that can not be continued,
    /// including symbols that are not part of the alphabet, leads into [`Configuration::Sink`].
    pub fn step(
        &self,
        configuration: &Configuration<S, D::State>,
        symbol: S,
    ) -> Configuration<S, D::State> {
        let Some(initial) = self.initial else {
            return Configuration::Sink;
        };
        if matches!(
            configuration,
            Configuration::Sink | Configuration::Terminating
        ) {
            return Configuration::Sink;
        }

        match self.alphabet.classify(symbol) {
            Ok(SymbolType::Internal) => {
                let Configuration::Running {
                    procedure,
                    state,
                    stack,
                } = configuration
                else {
                    return Configuration::Sink;
                };
                match self.procedures[procedure].successor(*state, symbol) {
                    Some(next) => Configuration::Running {
                        procedure: *procedure,
                        state: next,
                        stack: stack.clone(),
                    },
                    None => Configuration::Sink,
                }
            }
            Ok(SymbolType::Call) => {
                let Some(callee) = self.procedures.get(&symbol) else {
                    return Configuration::Sink;
                };
                let stack = match configuration {
                    Configuration::Running {
                        procedure,
                        state,
                        stack,
                    } => stack.push(*procedure, *state),
                    _ => CallStack::empty(),
                };
                Configuration::Running {
                    procedure: symbol,
                    state: callee.initial(),
                    stack,
                }
            }
            Ok(SymbolType::Return) => {
                let Configuration::Running {
                    procedure,
                    state,
                    stack,
                } = configuration
                else {
                    return Configuration::Sink;
                };
                if !self.procedures[procedure].is_accepting(*state) {
                    return Configuration::Sink;
                }
                match stack.pop() {
                    None if *procedure == initial => Configuration::Terminating,
                    None => Configuration::Sink,
                    Some((caller, caller_state, below)) => {
                        match self.procedures[&caller].successor(caller_state, *procedure) {
                            Some(next) => Configuration::Running {
                                procedure: caller,
                                state: next,
                                stack: below,
                            },
                            None => Configuration::Sink,
                        }
                    }
                }
            }
            Err(_) => Configuration::Sink,
        }
    }

    /// Folds [`Self::step`] over `word`, starting in [`Configuration::Init`].
    pub fn run(&self, word: &[S]) -> Configuration<S, D::State> {
        let reached = word
            .iter()
            .fold(self.initial_configuration(), |config, sym| {
                self.step(&config, *sym)
            });
        trace!("running {} reached {:?}", word.show(), reached);
        reached
    }

    /// Returns true if `word` is accepted by the system.
    pub fn accepts(&self, word: &[S]) -> bool {
        self.run(word).is_accepting()
    }

    /// Returns true if the concatenation of `prefix` and `suffix` is accepted.
    pub fn compute_suffix_output(&self, prefix: &[S], suffix: &[S]) -> bool {
        let after_prefix = prefix
            .iter()
            .fold(self.initial_configuration(), |config, sym| {
                self.step(&config, *sym)
            });
        suffix
            .iter()
            .fold(after_prefix, |config, sym| self.step(&config, *sym))
            .is_accepting()
    }

    /// The sum of the sizes of all procedures.
    pub fn size(&self) -> usize {
        self.procedures.values().map(|dfa| dfa.size()).sum()
    }

    /// The procedures, keyed by their call symbol.
    pub fn procedures(&self) -> &math::Map<S, D> {
        &self.procedures
    }

    /// The procedure that is invoked by `call`, if there is one.
    pub fn procedure(&self, call: S) -> Option<&D> {
        self.procedures.get(&call)
    }

    /// The designated initial procedure.
    pub fn initial_procedure(&self) -> Option<S> {
        self.initial
    }

    /// The alphabet of the system.
    pub fn alphabet(&self) -> &SpaAlphabet<S> {
        &self.alphabet
    }

    /// Decides whether every procedure of `self` accepts the same language as the corresponding
    /// procedure of `other` over the procedural alphabet of `self`. A procedure that is missing in
    /// `other` is treated as rejecting everything.
    pub fn equivalent_procedures<E: ProceduralDfa<S>>(&self, other: &Spa<S, E>) -> bool {
        let inputs = self.alphabet.procedural_symbols();
        let rejecting = Dfa::rejecting();

        self.alphabet.calls().all(|call| {
            let separated = match (self.procedure(call), other.procedure(call)) {
                (Some(ours), Some(theirs)) => separating_word(ours, theirs, &inputs),
                (Some(ours), None) => separating_word(ours, &rejecting, &inputs),
                (None, Some(theirs)) => separating_word(&rejecting, theirs, &inputs),
                (None, None) => None,
            };
            separated.is_none()
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{CallStack, Configuration, Spa};
    use crate::{dfa::Dfa, Error, SpaAlphabet};

    pub fn word(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    /// Palindromes over `a` and `b` with F, and palindromes of `c` with G nested in between.
    pub fn palindrome_spa() -> Spa<char, Dfa<char>> {
        let alphabet = SpaAlphabet::new(['a', 'b', 'c'], ['F', 'G'], 'R').unwrap();
        let f = Dfa::builder()
            .with_state_colors([true, true, true, false, false, true])
            .with_edges([
                (0, 'G', 5),
                (0, 'a', 1),
                (0, 'b', 2),
                (1, 'F', 3),
                (2, 'F', 4),
                (3, 'a', 5),
                (4, 'b', 5),
            ])
            .into_dfa(0);
        let g = Dfa::builder()
            .with_state_colors([false, true, false, true])
            .with_edges([(0, 'F', 3), (0, 'c', 1), (1, 'G', 2), (2, 'c', 3)])
            .into_dfa(0);
        Spa::new(alphabet, Some('F'), [('F', f), ('G', g)]).unwrap()
    }

    /// The system with the single procedure F that accepts exactly `aa`.
    pub fn double_a_spa() -> Spa<char, Dfa<char>> {
        let alphabet = SpaAlphabet::new(['a'], ['F'], 'R').unwrap();
        let f = Dfa::builder()
            .with_state_colors([false, false, true])
            .with_edges([(0, 'a', 1), (1, 'a', 2)])
            .into_dfa(0);
        Spa::new(alphabet, Some('F'), [('F', f)]).unwrap()
    }

    #[test]
    fn double_a_acceptance() {
        let spa = double_a_spa();
        assert!(spa.accepts(&word("FaaR")));
        assert!(!spa.accepts(&word("FaR")));
        assert!(!spa.accepts(&word("FFRR")));
        assert!(!spa.accepts(&word("R")));
        assert!(!spa.accepts(&[]));
        assert!(!spa.accepts(&word("FaaRF")));
        assert!(!spa.accepts(&word("FaaxR")));
    }

    #[test]
    fn palindrome_acceptance() {
        let spa = palindrome_spa();
        for accepted in ["FR", "FaR", "FaFRaR", "FbFGcRRbR", "FGFRRR", "FaFbFGcGcRcRRbRaR"] {
            assert!(spa.accepts(&word(accepted)), "{accepted} should be accepted");
        }
        for rejected in ["FaaR", "FaGaRaR", "", "FFF", "RF", "aba", "GcR", "FRR"] {
            assert!(!spa.accepts(&word(rejected)), "{rejected} should be rejected");
        }
        assert_eq!(spa.size(), 10);
        assert!(spa.compute_suffix_output(&word("FaF"), &word("RaR")));
    }

    #[test]
    fn configurations_are_structural() {
        let spa = palindrome_spa();
        let first = spa.run(&word("FaFbF"));
        let second = spa.run(&word("FaFbF"));
        assert_eq!(first, second);
        assert_eq!(first.depth(), 3);

        let Configuration::Running { stack, .. } = &first else {
            panic!("expected a running configuration, got {first:?}");
        };
        assert_eq!(
            stack.iter().map(|(p, q)| (*p, *q)).collect::<Vec<_>>(),
            vec![('F', 2), ('F', 1)]
        );

        let rebuilt = CallStack::empty().push('F', 1).push('F', 2);
        assert_eq!(stack, &rebuilt);
        assert_ne!(stack, &CallStack::empty().push('F', 2).push('F', 1));

        assert_eq!(spa.run(&word("FaFRaR")), Configuration::Terminating);
        assert_eq!(spa.run(&word("FaFRaRa")), Configuration::Sink);
    }

    #[test]
    fn stepping_by_hand() {
        let spa = palindrome_spa();
        let init = spa.initial_configuration();
        assert_eq!(spa.step(&init, 'a'), Configuration::Sink);
        assert_eq!(spa.step(&init, 'R'), Configuration::Sink);
        assert_eq!(spa.step(&init, 'x'), Configuration::Sink);

        let in_g = spa.step(&init, 'G');
        assert_eq!(
            in_g,
            Configuration::Running {
                procedure: 'G',
                state: 0,
                stack: CallStack::empty()
            }
        );
        // G is not the initial procedure, so returning from it to the bottom rejects
        let g_done = spa.step(&spa.step(&in_g, 'c'), 'R');
        assert_eq!(g_done, Configuration::Sink);
    }

    #[test]
    fn construction_is_validated() {
        let alphabet = SpaAlphabet::new(['a'], ['F'], 'R').unwrap();
        assert!(matches!(
            Spa::new(alphabet.clone(), Some('G'), [('F', Dfa::<char>::rejecting())]),
            Err(Error::UnknownInitialProcedure(_))
        ));
        assert!(matches!(
            Spa::new(alphabet.clone(), Some('F'), [('a', Dfa::<char>::rejecting())]),
            Err(Error::NotACallSymbol(_))
        ));
        let empty = Spa::<char, Dfa<char>>::new(alphabet, None, []).unwrap();
        assert!(!empty.accepts(&word("FR")));
    }

    #[test]
    fn procedure_equivalence() {
        let spa = palindrome_spa();
        assert!(spa.equivalent_procedures(&spa.clone()));
        let double = double_a_spa();
        assert!(!spa.equivalent_procedures(&double));
    }
}
