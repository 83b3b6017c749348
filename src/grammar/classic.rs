//! Classic ramp grammar
//!
//! Symbols alternate between rest (`0`) and a same-signed ramp through the
//! magnitudes 1, 2, 3:
//!
//! ```text
//! free      --0-->  after_zero
//! free      --±1->  triple(asc, 1)      --±2-> triple(asc, 2)  --±3-> need_zero
//! free      --±3->  triple(desc, 3)     --±2-> triple(desc, 2) --±1-> need_zero
//! free      --±2->  triple(none, 2)     --±1 or ±3-> need_zero
//! after_zero accepts only ±1 / ±3 and continues as `free` does
//! need_zero --0-->  after_zero
//! ```
//!
//! When enabled, a first symbol of magnitude 1 or 3 may be followed directly
//! by `0`. That exception is consumed by the next transition.

use crate::eligibility::EligibilitySet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Free,
    AfterZero,
    Triple,
    NeedZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    #[inline]
    pub fn of(symbol: i8) -> Option<Sign> {
        match symbol {
            s if s > 0 => Some(Sign::Positive),
            s if s < 0 => Some(Sign::Negative),
            _ => None,
        }
    }

    #[inline]
    pub fn apply(self, magnitude: i8) -> i8 {
        match self {
            Sign::Positive => magnitude,
            Sign::Negative => -magnitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RampDirection {
    Ascending,
    Descending,
}

/// Classic automaton state, excluding the emitted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassicState {
    pub mode: Mode,
    pub sign: Option<Sign>,
    pub direction: Option<RampDirection>,
    pub position: Option<u8>,
    pub pending_zero: bool,
    pub prev: Option<i8>,
}

const START_SYMBOLS: EligibilitySet = EligibilitySet::of(&[-3, -1, 1, 3]);
const ZERO: EligibilitySet = EligibilitySet::of(&[0]);

impl ClassicState {
    pub const INITIAL: Self = Self {
        mode: Mode::Free,
        sign: None,
        direction: None,
        position: None,
        pending_zero: false,
        prev: None,
    };

    const fn triple(sign: Sign, direction: Option<RampDirection>, position: u8, prev: i8) -> Self {
        Self {
            mode: Mode::Triple,
            sign: Some(sign),
            direction,
            position: Some(position),
            pending_zero: false,
            prev: Some(prev),
        }
    }

    const fn need_zero(sign: Sign, direction: RampDirection, position: u8, prev: i8) -> Self {
        Self {
            mode: Mode::NeedZero,
            sign: Some(sign),
            direction: Some(direction),
            position: Some(position),
            pending_zero: false,
            prev: Some(prev),
        }
    }

    /// Symbols the mode allows, before the no-repeat rule.
    fn allowed(&self) -> EligibilitySet {
        use RampDirection::*;

        let mut set = match self.mode {
            Mode::Free => EligibilitySet::FULL,
            Mode::AfterZero => START_SYMBOLS,
            Mode::NeedZero => ZERO,
            Mode::Triple => {
                let Some(sign) = self.sign else {
                    return EligibilitySet::EMPTY;
                };
                let magnitudes: &[i8] = match (self.direction, self.position) {
                    (None, Some(2)) => &[1, 3],
                    (Some(Ascending), Some(1)) => &[2],
                    (Some(Ascending), Some(2)) => &[3],
                    (Some(Descending), Some(3)) => &[2],
                    (Some(Descending), Some(2)) => &[1],
                    _ => &[],
                };
                let mut set = EligibilitySet::EMPTY;
                for &m in magnitudes {
                    let _ = set.insert(sign.apply(m));
                }
                set
            }
        };
        if self.pending_zero {
            set = set | ZERO;
        }
        set
    }

    /// Legal next symbols: the mode's symbols minus the previous one.
    #[inline]
    pub fn legal(&self) -> EligibilitySet {
        self.allowed().without(self.prev)
    }

    /// Successor state, or `None` when `symbol` is not legal here.
    pub fn advance(&self, symbol: i8, allow_zero_after_start: bool) -> Option<Self> {
        use RampDirection::*;

        if !self.legal().contains(symbol) {
            return None;
        }
        if symbol == 0 {
            return Some(Self {
                mode: Mode::AfterZero,
                prev: Some(0),
                ..Self::INITIAL
            });
        }

        let sign = Sign::of(symbol)?;
        let magnitude = symbol.abs();

        match self.mode {
            Mode::Free | Mode::AfterZero => {
                let mut next = match magnitude {
                    1 => Self::triple(sign, Some(Ascending), 1, symbol),
                    3 => Self::triple(sign, Some(Descending), 3, symbol),
                    _ => Self::triple(sign, None, 2, symbol),
                };
                next.pending_zero = self.mode == Mode::Free && magnitude != 2 && allow_zero_after_start;
                Some(next)
            }
            Mode::Triple => match (self.direction, self.position, magnitude) {
                (None, Some(2), 1) => Some(Self::need_zero(sign, Descending, 1, symbol)),
                (None, Some(2), 3) => Some(Self::need_zero(sign, Ascending, 3, symbol)),
                (Some(Ascending), Some(1), 2) => Some(Self::triple(sign, Some(Ascending), 2, symbol)),
                (Some(Ascending), Some(2), 3) => Some(Self::need_zero(sign, Ascending, 3, symbol)),
                (Some(Descending), Some(3), 2) => Some(Self::triple(sign, Some(Descending), 2, symbol)),
                (Some(Descending), Some(2), 1) => Some(Self::need_zero(sign, Descending, 1, symbol)),
                _ => None,
            },
            Mode::NeedZero => None,
        }
    }
}
