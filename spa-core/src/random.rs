use rand::Rng;
use tracing::debug;

use crate::{alphabet::Symbol, dfa::Dfa, math, spa::Spa, Show, SpaAlphabet};

/// Generates a random complete automaton with `size` states over `inputs`. Every state is
/// accepting with probability one half and the target of every transition is drawn uniformly.
/// Depending on the drawn transitions some states may be unreachable.
pub fn random_dfa<S: Symbol, R: Rng>(rng: &mut R, inputs: &[S], size: usize) -> Dfa<S> {
    let size = size.max(1);
    let mut dfa = Dfa::new(rng.gen_bool(0.5));
    for _ in 1..size {
        dfa.add_state(rng.gen_bool(0.5));
    }
    for q in 0..size {
        for sym in inputs {
            dfa.add_edge(q, *sym, rng.gen_range(0..size));
        }
    }
    dfa
}

/// Generates a system with one random procedure of `procedure_size` states per call symbol of
/// `alphabet` (see [`random_dfa`]) and a randomly chosen initial procedure. The procedures
/// are complete over the procedural alphabet. Nothing guarantees that every procedure terminates
/// or is reachable, use [`crate::atr::Atr::derive`] to check.
pub fn random_spa<S: Symbol, R: Rng>(
    rng: &mut R,
    alphabet: SpaAlphabet<S>,
    procedure_size: usize,
) -> Spa<S, Dfa<S>> {
    let inputs = alphabet.procedural_symbols();
    let procedures: math::Map<S, Dfa<S>> = alphabet
        .calls()
        .map(|call| (call, random_dfa(rng, &inputs, procedure_size)))
        .collect();

    let initial = match alphabet.num_calls() {
        0 => None,
        n => alphabet.calls().nth(rng.gen_range(0..n)),
    };
    debug!(
        "generated random system with {} procedures, initial {}",
        procedures.len(),
        initial.map_or("-".to_string(), |p| p.show())
    );

    Spa::new_unchecked(alphabet, initial, procedures)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::{random_dfa, random_spa};
    use crate::{atr::Atr, dfa::ProceduralDfa, SpaAlphabet};

    #[test]
    fn random_dfas_are_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        let dfa = random_dfa(&mut rng, &['a', 'b'], 5);
        assert_eq!(dfa.size(), 5);
        assert!(dfa.is_complete(&['a', 'b']));
    }

    #[test]
    fn random_systems_are_consistent() {
        let alphabet = SpaAlphabet::new(['a', 'b', 'c'], ['F', 'G', 'H'], 'R').unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut derived = 0;

        for _ in 0..20 {
            let spa = random_spa(&mut rng, alphabet.clone(), 4);
            assert_eq!(spa.procedures().len(), 3);
            assert!(spa
                .initial_procedure()
                .is_some_and(|p| spa.procedure(p).is_some()));

            if let Ok(atr) = Atr::derive(&spa) {
                derived += 1;
                for call in alphabet.calls() {
                    let global = atr.embed_terminating(&alphabet, call).unwrap();
                    assert!(spa.accepts(&global));
                }
            }
        }
        assert!(derived > 0);
    }
}
