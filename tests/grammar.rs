//! Property tests for the pattern automaton.

use iouseq::prelude::*;
use proptest::prelude::*;

fn set_from_mask(mask: u8) -> EligibilitySet {
    let symbols: Vec<i8> = (-3..=3i8)
        .filter(|s| mask & (1 << (s + 3)) != 0)
        .collect();
    EligibilitySet::from_symbols(&symbols).unwrap()
}

fn sets_strategy(max_len: usize) -> impl Strategy<Value = Vec<EligibilitySet>> {
    prop::collection::vec((1u8..128).prop_map(set_from_mask), 1..=max_len)
}

fn grammar_strategy() -> impl Strategy<Value = Grammar> {
    prop_oneof![
        Just(Grammar::classic()),
        Just(Grammar::classic().with_zero_after_start(false)),
        Just(Grammar::mirror()),
    ]
}

/// Count by brute force over the cartesian product.
fn exhaustive(grammar: &Grammar, sets: &[EligibilitySet]) -> u128 {
    let mut prefixes: Vec<Vec<i8>> = vec![Vec::new()];
    for set in sets {
        prefixes = prefixes
            .into_iter()
            .flat_map(|p| {
                set.iter().map(move |s| {
                    let mut next = p.clone();
                    next.push(s);
                    next
                })
            })
            .collect();
    }
    prefixes.iter().filter(|p| grammar.accepts(p)).count() as u128
}

proptest! {
    #[test]
    fn prop_total_is_exact(grammar in grammar_strategy(), sets in sets_strategy(5)) {
        let found = grammar.enumerate(&sets, EnumerateOptions::default());
        prop_assert_eq!(found.total, exhaustive(&grammar, &sets));
        prop_assert_eq!(found.total, found.sequences.len() as u128);
        prop_assert_eq!(grammar.count(&sets), found.total);
    }

    #[test]
    fn prop_enumerated_sequences_validate(grammar in grammar_strategy(), sets in sets_strategy(6)) {
        let found = grammar.enumerate(&sets, EnumerateOptions::default());
        for seq in &found.sequences {
            prop_assert!(grammar.validate(seq, &sets));
            prop_assert!(seq.windows(2).all(|w| w[0] != w[1]));
        }
    }

    #[test]
    fn prop_prev_never_legal(grammar in grammar_strategy(), symbols in prop::collection::vec(-3..=3i8, 1..8)) {
        let mut state = grammar.initial();
        for s in symbols {
            let Some(next) = grammar.advance(&state, s) else { break };
            state = next;
            let legal = grammar.legal_next(&state, EligibilitySet::FULL);
            prop_assert!(!legal.contains(s));
        }
    }

    #[test]
    fn prop_legal_next_agrees_with_advance(grammar in grammar_strategy(), symbols in prop::collection::vec(-3..=3i8, 0..6)) {
        let Some(state) = grammar.replay(&grammar.initial(), &symbols) else {
            return Ok(());
        };
        let legal = grammar.legal_next(&state, EligibilitySet::FULL);
        for s in -3..=3i8 {
            prop_assert_eq!(legal.contains(s), grammar.advance(&state, s).is_some());
        }
    }

    #[test]
    fn prop_caps_do_not_change_total(
        grammar in grammar_strategy(),
        sets in sets_strategy(5),
        beam in 1usize..20,
        max in 1usize..10,
    ) {
        let full = grammar.enumerate(&sets, EnumerateOptions::default());
        let capped = grammar.enumerate(&sets, EnumerateOptions::default().beam_width(beam).max_paths(max));
        prop_assert_eq!(capped.total, full.total);
        prop_assert!(capped.sequences.len() <= max);
        for seq in &capped.sequences {
            prop_assert!(full.sequences.contains(seq));
        }
    }

    #[test]
    fn prop_chain_prefix_comes_from_first_group(
        grammar in grammar_strategy(),
        first in sets_strategy(3),
        second in sets_strategy(3),
    ) {
        let a = grammar.enumerate(&first, EnumerateOptions::default()).sequences;
        let b = grammar.enumerate(&second, EnumerateOptions::default()).sequences;
        let chained = grammar.chain(&[a.clone(), b], EnumerateOptions::default());

        prop_assert_eq!(chained.total, chained.sequences.len() as u128);
        for seq in &chained.sequences {
            prop_assert!(grammar.accepts(seq));
            prop_assert!(a.iter().any(|p| seq.starts_with(p)));
        }
    }

    #[test]
    fn prop_mirror_runs_are_sorted_and_in_bounds(symbols in prop::collection::vec(-3..=3i8, 0..40)) {
        let marked = find_mirror_runs(&symbols);
        prop_assert!(marked.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(marked.iter().all(|&i| i < symbols.len()));
        prop_assert!(marked.is_empty() || marked.len() >= 11);
    }
}

#[test]
fn test_classic_ramps_are_monotone_and_single_signed() {
    let sets = vec![EligibilitySet::FULL; 4];
    let found = Grammar::classic().enumerate(&sets, EnumerateOptions::default());
    for seq in &found.sequences {
        // every maximal run of non-zero symbols keeps one sign
        for run in seq.split(|&s| s == 0).filter(|r| !r.is_empty()) {
            let sign = run[0].signum();
            assert!(run.iter().all(|s| s.signum() == sign), "{seq}");
            let steps: Vec<i8> = run.windows(2).map(|w| w[1].abs() - w[0].abs()).collect();
            assert!(
                steps.iter().all(|&d| d > 0) || steps.iter().all(|&d| d < 0),
                "{seq}"
            );
        }
    }
}

#[test]
fn test_mirror_run_highlight() {
    let seq = [0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 0];
    assert_eq!(find_mirror_runs(&seq), (1..=11).collect::<Vec<_>>());
}

#[test]
fn test_chain_of_empty_group_is_empty() {
    let grammar = Grammar::classic();
    let a = grammar
        .enumerate(&[EligibilitySet::FULL], EnumerateOptions::default())
        .sequences;
    let chained = grammar.chain(&[a, Vec::new()], EnumerateOptions::default());
    assert!(chained.is_empty());
    assert_eq!(chained.total, 0);
}
