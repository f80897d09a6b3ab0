use rand::{rngs::StdRng, SeedableRng};
use spa_learning::prelude::*;

fn word(s: &str) -> Vec<char> {
    s.chars().collect()
}

/// Palindromes over `a` and `b` with F, and palindromes of `c` with G nested in between.
fn palindrome_spa() -> Spa<char, Dfa<char>> {
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

#[test_log::test]
fn learn_palindromes_with_default_sequences() {
    let target = palindrome_spa();
    let equivalence = SpaEquivalenceOracle::new(target.clone()).unwrap();
    let oracle = SimulatorOracle::new(target.clone());
    let mut learner = SpaLearner::with_default_atr(target.alphabet().clone(), oracle);

    let learned = learner.infer(&equivalence).unwrap();
    assert!(target.equivalent_procedures(&learned));
    assert_eq!(learned.initial_procedure(), Some('F'));
    for w in ["FaFbFGcGcRcRRbRaR", "FbFGFRRRbR"] {
        assert_eq!(learned.accepts(&word(w)), target.accepts(&word(w)), "{w}");
    }
}

#[test_log::test]
fn learn_palindromes_with_optimizing_sequences() {
    let target = palindrome_spa();
    let equivalence = SpaEquivalenceOracle::new(target.clone()).unwrap();
    let mut learner = SpaLearner::with_optimizing_atr(
        target.alphabet().clone(),
        SimulatorOracle::new(target.clone()),
    );

    let learned = learner.infer(&equivalence).unwrap();
    assert!(target.equivalent_procedures(&learned));

    // the shortest sequences of the target are found
    let shortest = Atr::derive(&target).unwrap();
    for p in ['F', 'G'] {
        assert_eq!(
            learner.atr().terminating_sequence(p).map(<[char]>::len),
            shortest.terminating_sequence(p).map(<[char]>::len)
        );
    }
}

#[test_log::test]
fn learn_initial_procedure_that_terminates_through_a_call() {
    let alphabet = SpaAlphabet::new(['a'], ['F', 'G'], 'R').unwrap();
    let f = Dfa::builder()
        .with_state_colors([false, true])
        .with_edges([(0, 'G', 1)])
        .into_dfa(0);
    let g = Dfa::builder()
        .with_state_colors([false, true])
        .with_edges([(0, 'a', 1)])
        .into_dfa(0);
    let target = Spa::new(alphabet.clone(), Some('F'), [('F', f), ('G', g)]).unwrap();
    let equivalence = SpaEquivalenceOracle::new(target.clone()).unwrap();

    let oracle = SimulatorOracle::new(target.clone());
    let learned = SpaLearner::with_default_atr(alphabet.clone(), oracle)
        .infer(&equivalence)
        .unwrap();
    assert!(target.equivalent_procedures(&learned));
    assert!(learned.accepts(&word("FGaRR")));

    let oracle = SimulatorOracle::new(target.clone());
    let learned = SpaLearner::with_optimizing_atr(alphabet, oracle)
        .infer(&equivalence)
        .unwrap();
    assert!(target.equivalent_procedures(&learned));
}

#[test]
fn seeded_learning_needs_fewer_rounds() {
    let target = palindrome_spa();
    let equivalence = SpaEquivalenceOracle::new(target.clone()).unwrap();
    let mut learner = SpaLearner::with_optimizing_atr(
        target.alphabet().clone(),
        SimulatorOracle::new(target.clone()),
    );
    assert_eq!(learner.start_learning_with(&word("FaFGcRRaR")), Ok(true));
    assert_eq!(learner.hypothesis_alphabet().num_calls(), 2);

    let learned = learner.infer(&equivalence).unwrap();
    assert!(target.equivalent_procedures(&learned));
    assert!(learner.oracle().queries() > 0);
}

/// Every local counterexample that the learner extracts has to be a genuine difference between
/// the procedure and its hypothesis, so refining with the words of the target must always end
/// in a hypothesis that classifies them correctly.
#[test]
fn decomposition_is_sound() {
    let target = palindrome_spa();
    let oracle = SimulatorOracle::new(target.clone());
    let mut learner = SpaLearner::with_default_atr(target.alphabet().clone(), oracle);
    learner.start_learning_with(&word("FR")).unwrap();

    let words = [
        "FaR", "FaFRaR", "FbFGcRRbR", "FGFRRR", "FaFbFGcGcRcRRbRaR", "FabR", "FaFRbR", "FGccRR",
        "FGcGRRR", "FcR",
    ];
    for _ in 0..3 {
        for w in words {
            let w = word(w);
            let output = target.accepts(&w);
            if learner.hypothesis_model().accepts(&w) != output {
                assert_eq!(learner.refine_hypothesis(&w, output), Ok(true));
            } else {
                assert!(learner.refine_hypothesis(&w, output).is_err());
            }
            assert_eq!(learner.hypothesis_model().accepts(&w), output);
        }
    }
}

#[test]
fn learn_random_systems() {
    let alphabet = SpaAlphabet::new(['a', 'b'], ['F', 'G', 'H'], 'R').unwrap();
    let mut rng = StdRng::seed_from_u64(1337);
    let mut learned_systems = 0;

    for _ in 0..100 {
        let target = random_spa(&mut rng, alphabet.clone(), 3);
        let Ok(equivalence) = SpaEquivalenceOracle::new(target.clone()) else {
            continue;
        };
        let oracle = SimulatorOracle::new(target.clone());
        let learned = SpaLearner::with_default_atr(alphabet.clone(), oracle)
            .infer(&equivalence)
            .unwrap();
        assert!(target.equivalent_procedures(&learned));

        let oracle = SimulatorOracle::new(target.clone());
        let learned = SpaLearner::with_optimizing_atr(alphabet.clone(), oracle)
            .infer(&equivalence)
            .unwrap();
        assert!(target.equivalent_procedures(&learned));

        learned_systems += 1;
        if learned_systems == 5 {
            break;
        }
    }
    assert!(learned_systems > 0);
}
