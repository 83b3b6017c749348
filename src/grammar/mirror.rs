//! Mirror grammar
//!
//! An 11-node graph walking the canonical ramp `0, ±1, ±2, ±3, ±2, ±1, 0`.
//! Values repeat across nodes (the `1` climbing up and the `1` coming back
//! down are different nodes), so the live state is the set of nodes that
//! could have produced the sequence so far.

use crate::eligibility::EligibilitySet;

pub const NODE_COUNT: usize = 11;

/// Value emitted by each node
pub const NODE_VALUES: [i8; NODE_COUNT] = [0, 1, 2, 3, 2, 1, -1, -2, -3, -2, -1];

// Successor bitmasks, indexed like NODE_VALUES.
const SUCCESSORS: [u16; NODE_COUNT] = [
    1 << 1 | 1 << 6, // 0  -> +1 up, -1 down
    1 << 2,          // +1 up
    1 << 3,          // +2 up
    1 << 4,          // +3
    1 << 5,          // +2 back
    1 << 0,          // +1 back
    1 << 7,          // -1 down
    1 << 8,          // -2 down
    1 << 9,          // -3
    1 << 10,         // -2 back
    1 << 0,          // -1 back
];

/// Mirror automaton state, excluding the emitted sequence.
///
/// An empty phase set means nothing has been emitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirrorState {
    pub phases: u16,
    pub prev: Option<i8>,
}

fn nodes_valued(mask: u16, symbol: i8) -> u16 {
    (0..NODE_COUNT)
        .filter(|&n| mask & (1 << n) != 0 && NODE_VALUES[n] == symbol)
        .fold(0, |acc, n| acc | 1 << n)
}

impl MirrorState {
    pub const INITIAL: Self = Self {
        phases: 0,
        prev: None,
    };

    #[inline]
    pub fn is_start(&self) -> bool {
        self.phases == 0
    }

    /// Node indices currently possible
    pub fn phases(&self) -> impl Iterator<Item = usize> + '_ {
        (0..NODE_COUNT).filter(move |&n| self.phases & (1 << n) != 0)
    }

    fn successors(&self) -> u16 {
        self.phases().fold(0, |acc, n| acc | SUCCESSORS[n])
    }

    /// Legal next symbols: successor values minus the previous symbol.
    pub fn legal(&self) -> EligibilitySet {
        let allowed = if self.is_start() {
            EligibilitySet::FULL
        } else {
            let successors = self.successors();
            let mut set = EligibilitySet::EMPTY;
            for n in (0..NODE_COUNT).filter(|&n| successors & (1 << n) != 0) {
                let _ = set.insert(NODE_VALUES[n]);
            }
            set
        };
        allowed.without(self.prev)
    }

    pub fn advance(&self, symbol: i8) -> Option<Self> {
        if !self.legal().contains(symbol) {
            return None;
        }
        let pool = if self.is_start() {
            (1u16 << NODE_COUNT) - 1
        } else {
            self.successors()
        };
        let phases = nodes_valued(pool, symbol);
        (phases != 0).then_some(Self {
            phases,
            prev: Some(symbol),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(symbols: &[i8]) -> Option<MirrorState> {
        symbols
            .iter()
            .try_fold(MirrorState::INITIAL, |state, &s| state.advance(s))
    }

    #[test]
    fn test_start_seeds_all_nodes_with_value() {
        let state = run(&[1]).unwrap();
        assert_eq!(state.phases().collect::<Vec<_>>(), vec![1, 5]);
        // climbing to 2 or returning to 0
        assert_eq!(state.legal().to_vec(), vec![0, 2]);
    }

    #[test]
    fn test_full_cycle() {
        assert!(run(&[0, 1, 2, 3, 2, 1, 0, -1, -2, -3, -2, -1, 0]).is_some());
    }

    #[test]
    fn test_ambiguity_resolves() {
        let state = run(&[2]).unwrap();
        assert_eq!(state.phases().count(), 2);
        assert_eq!(state.legal().to_vec(), vec![1, 3]);

        let state = run(&[2, 1]).unwrap();
        assert_eq!(state.phases().collect::<Vec<_>>(), vec![5]);
        assert_eq!(state.legal().to_vec(), vec![0]);
    }

    #[test]
    fn test_rejects_off_ramp() {
        assert!(run(&[0, 2]).is_none());
        assert!(run(&[0, 1, 3]).is_none());
        assert!(run(&[1, 2, 3, 0]).is_none());
        assert!(run(&[0, 0]).is_none());
    }
}
