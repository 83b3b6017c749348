//! Offset alignment engine
//!
//! Walks a [`SequenceDefinition`] across a candle series starting from an
//! anchor candle. Every step counts only non-DC candles; DC candles are
//! stepped over without being counted. Steps that run off either end of the
//! data are predicted from the edge candle instead of looked up.
//!
//! Alignment never fails. Missing data is reported in-band through `None`
//! indices, predicted timestamps and [`OffsetStatus`].

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::config::SequenceDefinition;
use crate::series::CandleSeries;
use crate::StepMinutes;

const MINUTES_PER_DAY: i64 = 1440;

// ============================================================
// ANCHOR
// ============================================================

/// How the anchor candle was located
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    Exact,
    Nearest,
    NotFound,
}

/// Starting candle for an alignment walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub index: usize,
    pub status: AnchorStatus,
}

impl Anchor {
    pub fn new(index: usize, status: AnchorStatus) -> Self {
        Self { index, status }
    }

    pub fn exact(index: usize) -> Self {
        Self::new(index, AnchorStatus::Exact)
    }
}

/// Locate the first candle opening at `anchor_time`.
///
/// Falls back to the first candle with the smallest circular time-of-day
/// distance, provided that distance is under one step.
pub fn find_anchor(series: &CandleSeries, anchor_time: NaiveTime) -> (Option<usize>, AnchorStatus) {
    let target = minute_of_day(anchor_time);
    let mut best: Option<(usize, i64)> = None;

    for (i, candle) in series.candles().iter().enumerate() {
        let raw = (minute_of_day(candle.time_of_day()) - target).abs();
        let distance = raw.min(MINUTES_PER_DAY - raw);
        if distance == 0 {
            return (Some(i), AnchorStatus::Exact);
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }

    match best {
        Some((i, d)) if d < series.step().get() as i64 => (Some(i), AnchorStatus::Nearest),
        _ => (None, AnchorStatus::NotFound),
    }
}

fn minute_of_day(t: NaiveTime) -> i64 {
    (t.hour() * 60 + t.minute()) as i64
}

// ============================================================
// WALKER
// ============================================================

/// Outcome of walking a number of non-DC steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Landed on a real candle
    Landed { index: usize, skipped_dc: bool },
    /// Ran off the data at `edge`; `remaining` keeps the walk's sign
    Beyond {
        edge: usize,
        remaining: i64,
        skipped_dc: bool,
    },
}

/// Walk `steps` non-DC candles from `start` (negative walks go backwards).
///
/// `start` must be a valid index. Missing flags count as non-DC.
pub fn walk(dc_flags: &[bool], len: usize, start: usize, steps: i64) -> Walk {
    let is_dc = |i: usize| dc_flags.get(i).copied().unwrap_or(false);
    let forward = steps >= 0;
    let target = steps.abs();

    let mut index = start;
    let mut counted = 0;
    let mut skipped_dc = false;

    while counted < target {
        let next = if forward {
            Some(index + 1).filter(|&n| n < len)
        } else {
            index.checked_sub(1)
        };
        let Some(next) = next else {
            let remaining = target - counted;
            return Walk::Beyond {
                edge: index,
                remaining: if forward { remaining } else { -remaining },
                skipped_dc,
            };
        };
        index = next;
        if is_dc(index) {
            skipped_dc = true;
        } else {
            counted += 1;
        }
    }

    Walk::Landed { index, skipped_dc }
}

/// Linear extrapolation from the last known real candle; `None` when the
/// result falls outside the representable date range.
#[inline]
pub fn predict_timestamp(
    last_known: NaiveDateTime,
    steps_remaining: i64,
    step: StepMinutes,
) -> Option<NaiveDateTime> {
    let minutes = steps_remaining.checked_mul(step.get() as i64)?;
    last_known.checked_add_signed(Duration::try_minutes(minutes)?)
}

// ============================================================
// ALIGNMENT
// ============================================================

/// Which branch produced an [`AlignmentResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OffsetStatus {
    /// Target and every step are real candles
    Aligned,
    /// Target is real, some steps were predicted
    ExtrapolatedFromTarget { missing_steps: usize },
    /// Target itself lies past the last candle
    ExtrapolatedFromTail { missing_steps: usize },
    /// Target itself lies before the first candle
    ExtrapolatedFromHead { missing_steps: usize },
}

impl OffsetStatus {
    pub fn missing_steps(self) -> usize {
        match self {
            OffsetStatus::Aligned => 0,
            OffsetStatus::ExtrapolatedFromTarget { missing_steps }
            | OffsetStatus::ExtrapolatedFromTail { missing_steps }
            | OffsetStatus::ExtrapolatedFromHead { missing_steps } => missing_steps,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OffsetStatus::Aligned => "aligned",
            OffsetStatus::ExtrapolatedFromTarget { .. } => "extrapolated_from_target",
            OffsetStatus::ExtrapolatedFromTail { .. } => "extrapolated_from_tail",
            OffsetStatus::ExtrapolatedFromHead { .. } => "extrapolated_from_head",
        }
    }
}

/// One sequence step mapped onto the series
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StepHit {
    pub seq_value: i32,
    pub index: Option<usize>,
    pub timestamp: Option<NaiveDateTime>,
    /// Set only when the step fell beyond the data
    pub predicted: Option<NaiveDateTime>,
    pub used_dc: bool,
}

impl StepHit {
    /// Real or predicted timestamp
    pub fn effective_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp.or(self.predicted)
    }
}

/// A sequence aligned at one offset; `hits` is parallel to the sequence.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AlignmentResult {
    pub offset: i32,
    pub base_index: usize,
    pub base_status: AnchorStatus,
    pub target_index: Option<usize>,
    /// Real or predicted; `None` only when prediction overflows
    pub target_ts: Option<NaiveDateTime>,
    pub offset_status: OffsetStatus,
    pub hits: Vec<StepHit>,
}

/// Align `sequence` at `offset` non-DC steps from `anchor`.
///
/// Each value `v` lands `v - first` non-DC steps from the target candle. When
/// the target itself is beyond the data, every step is walked from the
/// anchor instead so the DC candles before the tail are still discounted.
pub fn align_offset(
    series: &CandleSeries,
    dc_flags: &[bool],
    anchor: Anchor,
    sequence: &SequenceDefinition,
    offset: i32,
) -> AlignmentResult {
    let len = series.len();
    let step = series.step();

    // An anchor past the data walks on from the last candle.
    let (start, overshoot) = if anchor.index < len {
        (anchor.index, 0)
    } else {
        log::debug!("anchor {} beyond series of {len} candles", anchor.index);
        (len - 1, (anchor.index - (len - 1)) as i64)
    };

    let first = sequence.first() as i64;
    let offset_steps = overshoot + offset as i64;

    let resolve = |seq_value: i32, outcome: Walk| match outcome {
        Walk::Landed { index, skipped_dc } => StepHit {
            seq_value,
            index: Some(index),
            timestamp: series.timestamp(index),
            predicted: None,
            used_dc: skipped_dc,
        },
        Walk::Beyond {
            edge,
            remaining,
            skipped_dc,
        } => StepHit {
            seq_value,
            index: None,
            timestamp: None,
            predicted: series
                .timestamp(edge)
                .and_then(|ts| predict_timestamp(ts, remaining, step)),
            used_dc: skipped_dc,
        },
    };

    // Edge the target fell off, if any
    let (target_index, target_ts, hits, beyond) = match walk(dc_flags, len, start, offset_steps) {
        Walk::Landed { index, .. } => {
            let hits: Vec<StepHit> = sequence
                .values()
                .iter()
                .map(|&v| resolve(v, walk(dc_flags, len, index, v as i64 - first)))
                .collect();
            (Some(index), Some(series.candles()[index].timestamp), hits, None)
        }
        Walk::Beyond {
            edge, remaining, ..
        } => {
            let target_ts = predict_timestamp(series.candles()[edge].timestamp, remaining, step);
            let hits: Vec<StepHit> = sequence
                .values()
                .iter()
                .map(|&v| resolve(v, walk(dc_flags, len, start, offset_steps + v as i64 - first)))
                .collect();
            (None, target_ts, hits, Some(remaining < 0))
        }
    };

    let missing_steps = hits.iter().filter(|h| h.index.is_none()).count();
    let offset_status = match (beyond, missing_steps) {
        (Some(true), _) => OffsetStatus::ExtrapolatedFromHead { missing_steps },
        (Some(false), _) => OffsetStatus::ExtrapolatedFromTail { missing_steps },
        (None, 0) => OffsetStatus::Aligned,
        (None, _) => OffsetStatus::ExtrapolatedFromTarget { missing_steps },
    };

    AlignmentResult {
        offset,
        base_index: anchor.index,
        base_status: anchor.status,
        target_index,
        target_ts,
        offset_status,
        hits,
    }
}
