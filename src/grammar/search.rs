//! Breadth-first enumeration, chaining and exact counting.
//!
//! The displayed sequences may be cut by `beam_width` (per generation) and
//! `max_paths` (final list). The reported `total` is always exact: it is
//! computed by merging paths that reach the same [`StateCore`], which never
//! materializes the sequences themselves.

use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;

use super::{AutomatonState, Grammar, PatternSequence, StateCore};
use crate::eligibility::EligibilitySet;

/// Output caps for enumeration and chaining
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EnumerateOptions {
    /// Max states kept per generation; truncation keeps expansion order
    pub beam_width: Option<usize>,
    /// Max sequences returned
    pub max_paths: Option<usize>,
}

impl EnumerateOptions {
    pub fn beam_width(mut self, width: usize) -> Self {
        self.beam_width = Some(width);
        self
    }

    pub fn max_paths(mut self, max: usize) -> Self {
        self.max_paths = Some(max);
        self
    }
}

/// Enumerated or chained sequences
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Enumeration {
    /// Displayed sequences, at most `max_paths`
    pub sequences: Vec<PatternSequence>,
    /// Exact number of distinct legal sequences, ignoring every cap
    pub total: u128,
    /// Whether the beam dropped states at some generation
    pub beam_pruned: bool,
}

impl Enumeration {
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

fn apply_beam(generation: &mut Vec<AutomatonState>, beam_width: Option<usize>, step: usize) -> bool {
    match beam_width {
        Some(cap) if generation.len() > cap => {
            log::debug!(
                "beam kept {cap} of {} states at position {step}",
                generation.len()
            );
            generation.truncate(cap);
            true
        }
        _ => false,
    }
}

fn sum_counts(frontier: &HashMap<StateCore, u128>) -> u128 {
    frontier.values().fold(0u128, |acc, &n| acc.saturating_add(n))
}

impl Grammar {
    /// Every sequence whose symbol at position `i` is in `sets[i]`.
    ///
    /// An empty `sets` yields an empty result.
    pub fn enumerate(&self, sets: &[EligibilitySet], options: EnumerateOptions) -> Enumeration {
        if sets.is_empty() {
            return Enumeration::default();
        }

        let mut generation = vec![self.initial()];
        let mut beam_pruned = false;

        for (step, &candidates) in sets.iter().enumerate() {
            let mut next: Vec<AutomatonState> = generation
                .par_iter()
                .flat_map_iter(|state| {
                    self.legal_next(state, candidates)
                        .iter()
                        .filter_map(move |symbol| self.advance(state, symbol))
                })
                .collect();

            beam_pruned |= apply_beam(&mut next, options.beam_width, step);
            generation = next;
            if generation.is_empty() {
                break;
            }
        }

        let mut sequences: Vec<PatternSequence> = generation
            .into_iter()
            .filter(|state| state.seq.len() == sets.len())
            .map(AutomatonState::into_sequence)
            .collect();
        if let Some(max) = options.max_paths {
            sequences.truncate(max);
        }

        Enumeration {
            sequences,
            total: self.count(sets),
            beam_pruned,
        }
    }

    /// Exact number of sequences [`Grammar::enumerate`] would reach without caps.
    pub fn count(&self, sets: &[EligibilitySet]) -> u128 {
        if sets.is_empty() {
            return 0;
        }

        let mut frontier: HashMap<StateCore, u128> = HashMap::from([(self.initial_core(), 1)]);
        for &candidates in sets {
            let mut next: HashMap<StateCore, u128> = HashMap::new();
            for (core, &paths) in &frontier {
                for symbol in (core.legal() & candidates).iter() {
                    if let Some(succ) = core.advance(symbol, self.allow_zero_after_start) {
                        let slot = next.entry(succ).or_insert(0);
                        *slot = slot.saturating_add(paths);
                    }
                }
            }
            if next.is_empty() {
                return 0;
            }
            frontier = next;
        }
        sum_counts(&frontier)
    }

    /// Compose independently computed groups into longer sequences.
    ///
    /// Each survivor of the previous group carries its state forward; a
    /// sub-sequence chains only if all its symbols are legal from that
    /// carried state. Results are de-duplicated by symbol tuple.
    pub fn chain(&self, groups: &[Vec<PatternSequence>], options: EnumerateOptions) -> Enumeration {
        if groups.is_empty() {
            return Enumeration::default();
        }

        let groups: Vec<Vec<&PatternSequence>> = groups.iter().map(|g| unique(g)).collect();
        let mut states = vec![self.initial()];
        let mut beam_pruned = false;

        for (step, group) in groups.iter().enumerate() {
            let mut next: Vec<AutomatonState> = states
                .par_iter()
                .flat_map_iter(|state| {
                    group
                        .iter()
                        .filter_map(move |sub| self.replay(state, sub.as_slice()))
                })
                .collect();

            beam_pruned |= apply_beam(&mut next, options.beam_width, step);
            states = next;
            if states.is_empty() {
                break;
            }
        }

        let mut seen: HashSet<Vec<i8>> = HashSet::with_capacity(states.len());
        let mut sequences: Vec<PatternSequence> = states
            .into_iter()
            .filter(|state| seen.insert(state.seq.clone()))
            .map(AutomatonState::into_sequence)
            .collect();

        let total = if beam_pruned {
            self.count_chain(&groups)
        } else {
            sequences.len() as u128
        };
        if let Some(max) = options.max_paths {
            sequences.truncate(max);
        }

        Enumeration {
            sequences,
            total,
            beam_pruned,
        }
    }

    // Distinct concatenations, not group choices: two splits spelling the
    // same symbols must count once. Walks the grammar in lockstep with the
    // subset construction over one trie per group.
    fn count_chain(&self, groups: &[Vec<&PatternSequence>]) -> u128 {
        let tries: Vec<Trie> = groups.iter().map(|g| Trie::build(g)).collect();
        let done = tries.len();

        let mut frontier: HashMap<(Cursor, StateCore), u128> = HashMap::new();
        frontier.insert((closure(&tries, BTreeSet::from([(0, 0)])), self.initial_core()), 1);

        let mut total = 0u128;
        while !frontier.is_empty() {
            let mut next: HashMap<(Cursor, StateCore), u128> = HashMap::new();
            for ((cursor, core), &paths) in &frontier {
                if cursor.contains(&(done, 0)) {
                    total = total.saturating_add(paths);
                }
                for symbol in core.legal().iter() {
                    let moved: Cursor = cursor
                        .iter()
                        .filter(|&&(group, _)| group < done)
                        .filter_map(|&(group, node)| tries[group].child(node, symbol).map(|c| (group, c)))
                        .collect();
                    if moved.is_empty() {
                        continue;
                    }
                    let Some(succ) = core.advance(symbol, self.allow_zero_after_start) else {
                        continue;
                    };
                    let slot = next.entry((closure(&tries, moved), succ)).or_insert(0);
                    *slot = slot.saturating_add(paths);
                }
            }
            frontier = next;
        }
        total
    }
}

/// Positions `(group, trie node)` reachable after the same symbols; group
/// `tries.len()` with node 0 marks a completed chain.
type Cursor = BTreeSet<(usize, usize)>;

/// Follow finished sub-sequences into the root of the next group.
fn closure(tries: &[Trie], mut cursor: Cursor) -> Cursor {
    let mut pending: Vec<(usize, usize)> = cursor.iter().copied().collect();
    while let Some((group, node)) = pending.pop() {
        if group < tries.len() && tries[group].terminal[node] && cursor.insert((group + 1, 0)) {
            pending.push((group + 1, 0));
        }
    }
    cursor
}

/// Prefix tree over one group's sub-sequences
struct Trie {
    children: Vec<[Option<usize>; 7]>,
    terminal: Vec<bool>,
}

impl Trie {
    fn build(group: &[&PatternSequence]) -> Self {
        let mut trie = Trie {
            children: vec![[None; 7]],
            terminal: vec![false],
        };
        'subs: for sub in group {
            let mut node = 0;
            for &symbol in sub.iter() {
                // never replayable, so never part of a chain
                let Some(slot) = symbol_slot(symbol) else {
                    continue 'subs;
                };
                node = match trie.children[node][slot] {
                    Some(child) => child,
                    None => {
                        trie.children.push([None; 7]);
                        trie.terminal.push(false);
                        let child = trie.children.len() - 1;
                        trie.children[node][slot] = Some(child);
                        child
                    }
                };
            }
            trie.terminal[node] = true;
        }
        trie
    }

    fn child(&self, node: usize, symbol: i8) -> Option<usize> {
        self.children[node][symbol_slot(symbol)?]
    }
}

fn symbol_slot(symbol: i8) -> Option<usize> {
    (-3..=3).contains(&symbol).then(|| (symbol + 3) as usize)
}

fn unique(group: &[PatternSequence]) -> Vec<&PatternSequence> {
    let mut seen = HashSet::with_capacity(group.len());
    group.iter().filter(|s| seen.insert(s.as_slice())).collect()
}
