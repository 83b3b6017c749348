//! Pattern automaton over the symbols `-3..=3`
//!
//! One engine, parameterized by [`Grammar`]:
//!
//! - [`GrammarVariant::Classic`]: rest/ramp state machine, see [`classic`]
//! - [`GrammarVariant::Mirror`]: 11-node ramp graph with phase sets, see [`mirror`]
//!
//! Every state forbids repeating the previous symbol, and every transition
//! produces a new [`AutomatonState`]; states are never mutated in place.
//!
//! # Example
//!
//! ```rust
//! use iouseq::grammar::{EnumerateOptions, Grammar};
//! use iouseq::eligibility::EligibilitySet;
//!
//! let sets = [
//!     EligibilitySet::from_symbols(&[1]).unwrap(),
//!     EligibilitySet::from_symbols(&[2]).unwrap(),
//!     EligibilitySet::from_symbols(&[3]).unwrap(),
//! ];
//! let found = Grammar::classic().enumerate(&sets, EnumerateOptions::default());
//! assert_eq!(found.total, 1);
//! assert_eq!(found.sequences[0].as_slice(), &[1, 2, 3]);
//! ```

pub mod classic;
pub mod mirror;
mod runs;
mod search;

use std::fmt;
use std::ops::Deref;

pub use classic::{ClassicState, Mode, RampDirection, Sign};
pub use mirror::MirrorState;
pub use runs::find_mirror_runs;
pub use search::{EnumerateOptions, Enumeration};

use crate::eligibility::EligibilitySet;

// ============================================================
// GRAMMAR
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarVariant {
    #[default]
    Classic,
    Mirror,
}

/// Grammar selection and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Grammar {
    pub variant: GrammarVariant,
    /// Classic only: allow `0` right after a first symbol of magnitude 1 or 3
    pub allow_zero_after_start: bool,
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            variant: GrammarVariant::Classic,
            allow_zero_after_start: true,
        }
    }
}

impl Grammar {
    pub fn classic() -> Self {
        Self::default()
    }

    pub fn mirror() -> Self {
        Self {
            variant: GrammarVariant::Mirror,
            ..Self::default()
        }
    }

    pub fn with_zero_after_start(mut self, allow: bool) -> Self {
        self.allow_zero_after_start = allow;
        self
    }

    pub(crate) fn initial_core(&self) -> StateCore {
        match self.variant {
            GrammarVariant::Classic => StateCore::Classic(ClassicState::INITIAL),
            GrammarVariant::Mirror => StateCore::Mirror(MirrorState::INITIAL),
        }
    }

    /// Empty-sequence starting state
    pub fn initial(&self) -> AutomatonState {
        AutomatonState {
            core: self.initial_core(),
            seq: Vec::new(),
        }
    }

    /// Symbols legal after `state`, restricted to `candidates`.
    #[inline]
    pub fn legal_next(&self, state: &AutomatonState, candidates: EligibilitySet) -> EligibilitySet {
        state.core.legal() & candidates
    }

    /// New state with `symbol` appended, or `None` if it is not legal.
    pub fn advance(&self, state: &AutomatonState, symbol: i8) -> Option<AutomatonState> {
        let core = state.core.advance(symbol, self.allow_zero_after_start)?;
        let mut seq = Vec::with_capacity(state.seq.len() + 1);
        seq.extend_from_slice(&state.seq);
        seq.push(symbol);
        Some(AutomatonState { core, seq })
    }

    /// Feed `symbols` through the grammar starting from `state`.
    pub fn replay(&self, state: &AutomatonState, symbols: &[i8]) -> Option<AutomatonState> {
        let mut core = state.core;
        for &s in symbols {
            core = core.advance(s, self.allow_zero_after_start)?;
        }
        let mut seq = Vec::with_capacity(state.seq.len() + symbols.len());
        seq.extend_from_slice(&state.seq);
        seq.extend_from_slice(symbols);
        Some(AutomatonState { core, seq })
    }

    /// True when `seq` is a legal sequence from the initial state.
    pub fn accepts(&self, seq: &[i8]) -> bool {
        self.replay(&self.initial(), seq).is_some()
    }

    /// True when `seq` is legal and every symbol is eligible at its position.
    pub fn validate(&self, seq: &[i8], sets: &[EligibilitySet]) -> bool {
        seq.len() == sets.len()
            && seq.iter().zip(sets).all(|(&s, set)| set.contains(s))
            && self.accepts(seq)
    }
}

// ============================================================
// STATES
// ============================================================

/// Grammar state without the emitted sequence; identical cores accept
/// identical continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCore {
    Classic(ClassicState),
    Mirror(MirrorState),
}

impl StateCore {
    #[inline]
    pub fn legal(&self) -> EligibilitySet {
        match self {
            StateCore::Classic(s) => s.legal(),
            StateCore::Mirror(s) => s.legal(),
        }
    }

    #[inline]
    pub fn prev(&self) -> Option<i8> {
        match self {
            StateCore::Classic(s) => s.prev,
            StateCore::Mirror(s) => s.prev,
        }
    }

    #[inline]
    pub fn advance(&self, symbol: i8, allow_zero_after_start: bool) -> Option<Self> {
        match self {
            StateCore::Classic(s) => s.advance(symbol, allow_zero_after_start).map(StateCore::Classic),
            StateCore::Mirror(s) => s.advance(symbol).map(StateCore::Mirror),
        }
    }
}

/// Grammar state plus everything emitted so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonState {
    core: StateCore,
    seq: Vec<i8>,
}

impl AutomatonState {
    #[inline]
    pub fn core(&self) -> &StateCore {
        &self.core
    }

    #[inline]
    pub fn seq(&self) -> &[i8] {
        &self.seq
    }

    #[inline]
    pub fn prev_symbol(&self) -> Option<i8> {
        self.core.prev()
    }

    pub fn into_sequence(self) -> PatternSequence {
        PatternSequence(self.seq)
    }
}

// ============================================================
// PATTERN SEQUENCE
// ============================================================

/// Finished symbol sequence; equality is tuple equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PatternSequence(Vec<i8>);

impl PatternSequence {
    pub fn new(symbols: Vec<i8>) -> Self {
        Self(symbols)
    }

    #[inline]
    pub fn as_slice(&self) -> &[i8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<i8> {
        self.0
    }
}

impl Deref for PatternSequence {
    type Target = [i8];

    fn deref(&self) -> &[i8] {
        &self.0
    }
}

impl From<Vec<i8>> for PatternSequence {
    fn from(symbols: Vec<i8>) -> Self {
        Self(symbols)
    }
}

impl fmt::Display for PatternSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{s}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(symbols: &[&[i8]]) -> Vec<EligibilitySet> {
        symbols
            .iter()
            .map(|s| EligibilitySet::from_symbols(s).unwrap())
            .collect()
    }

    #[test]
    fn test_advance_does_not_touch_source_state() {
        let grammar = Grammar::classic();
        let start = grammar.initial();
        let one = grammar.advance(&start, 1).unwrap();
        let minus = grammar.advance(&start, -1).unwrap();
        assert!(start.seq().is_empty());
        assert_eq!(one.seq(), &[1]);
        assert_eq!(minus.seq(), &[-1]);
        assert_eq!(one.prev_symbol(), Some(1));
    }

    #[test]
    fn test_legal_next_intersects_candidates() {
        let grammar = Grammar::classic();
        let state = grammar.replay(&grammar.initial(), &[0]).unwrap();
        let legal = grammar.legal_next(&state, EligibilitySet::from_symbols(&[0, 1, 2]).unwrap());
        assert_eq!(legal.to_vec(), vec![1]);
    }

    #[test]
    fn test_validate() {
        let grammar = Grammar::classic();
        let s = sets(&[&[1, 0], &[2], &[3]]);
        assert!(grammar.validate(&[1, 2, 3], &s));
        assert!(!grammar.validate(&[1, 2], &s));
        assert!(!grammar.validate(&[0, 2, 3], &s));
    }

    #[test]
    fn test_variants_differ() {
        // 0,1,2,3,0 is classic but not mirror (mirror must come back down)
        assert!(Grammar::classic().accepts(&[0, 1, 2, 3, 0]));
        assert!(!Grammar::mirror().accepts(&[0, 1, 2, 3, 0]));
        assert!(Grammar::mirror().accepts(&[0, 1, 2, 3, 2, 1, 0]));
        assert!(!Grammar::classic().accepts(&[0, 1, 2, 3, 2]));
    }

    #[test]
    fn test_display() {
        assert_eq!(PatternSequence::from(vec![0, -1, -2]).to_string(), "[0, -1, -2]");
    }
}
