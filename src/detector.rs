//! IOU/IOV detector
//!
//! For every offset in `-3..=3` the sequence is aligned and each real step
//! candle (with a predecessor) is tested against the sign/magnitude rule:
//!
//! - `oc = close - open` of the candle, `prev_oc` of the one before it
//! - both `|oc|` and `|prev_oc|` must exceed `limit + tolerance`
//! - IOU: same sign, IOV: opposite sign
//!
//! Candles at forbidden slots are never reported.

use std::ops::RangeInclusive;

use chrono::NaiveDateTime;

use crate::alignment::{align_offset, AlignmentResult, Anchor, AnchorStatus};
use crate::calendar::ForbiddenSlots;
use crate::config::SequenceDefinition;
use crate::series::CandleSeries;
use crate::{OHLCExt, Threshold};

/// Offsets tried for every sequence
pub const OFFSETS: RangeInclusive<i8> = -3..=3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IouRule {
    /// Same-signed consecutive bodies
    #[default]
    Iou,
    /// Opposite-signed consecutive bodies
    Iov,
}

impl IouRule {
    pub fn as_str(self) -> &'static str {
        match self {
            IouRule::Iou => "IOU",
            IouRule::Iov => "IOV",
        }
    }

    #[inline]
    pub fn qualifies(self, oc: f64, prev_oc: f64, threshold: f64) -> bool {
        if oc.abs() <= threshold || prev_oc.abs() <= threshold {
            return false;
        }
        let same_sign = (oc > 0.0) == (prev_oc > 0.0);
        match self {
            IouRule::Iou => same_sign,
            IouRule::Iov => !same_sign,
        }
    }
}

/// A qualifying candle
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct IouHit {
    pub offset: i8,
    pub seq_value: i32,
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub oc: f64,
    pub prev_oc: f64,
    pub dc_flag: bool,
    pub used_dc: bool,
}

/// Magnitude rule and exclusions applied by [`detect`]
#[derive(Debug, Clone, Copy)]
pub struct DetectParams<'a> {
    pub limit: Threshold,
    pub tolerance: Threshold,
    pub rule: IouRule,
    pub forbidden: &'a ForbiddenSlots,
}

impl DetectParams<'_> {
    #[inline]
    fn threshold(&self) -> f64 {
        self.limit.get() + self.tolerance.get()
    }
}

/// Detector output for one series and one sequence
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Report {
    pub sequence: String,
    pub rule: IouRule,
    pub anchor_index: Option<usize>,
    pub anchor_status: AnchorStatus,
    /// One entry per offset, empty when no anchor was found
    pub alignments: Vec<AlignmentResult>,
    pub hits: Vec<IouHit>,
}

impl Report {
    pub fn hits_at(&self, offset: i8) -> impl Iterator<Item = &IouHit> {
        self.hits.iter().filter(move |h| h.offset == offset)
    }

    pub fn alignment(&self, offset: i8) -> Option<&AlignmentResult> {
        self.alignments.iter().find(|a| a.offset == offset as i32)
    }
}

/// Qualifying hits of a single alignment.
pub fn detect_hits(
    series: &CandleSeries,
    dc_flags: &[bool],
    alignment: &AlignmentResult,
    params: &DetectParams<'_>,
) -> Vec<IouHit> {
    let threshold = params.threshold();
    let candles = series.candles();

    alignment
        .hits
        .iter()
        .filter_map(|step| {
            let index = step.index.filter(|&i| i > 0)?;
            let candle = &candles[index];
            if params.forbidden.is_forbidden(candle.timestamp) {
                return None;
            }
            let oc = candle.oc();
            let prev_oc = candles[index - 1].oc();
            params.rule.qualifies(oc, prev_oc, threshold).then(|| IouHit {
                offset: alignment.offset as i8,
                seq_value: step.seq_value,
                index,
                timestamp: candle.timestamp,
                oc,
                prev_oc,
                dc_flag: dc_flags.get(index).copied().unwrap_or(false),
                used_dc: step.used_dc,
            })
        })
        .collect()
}

/// Align every offset from the anchor and collect qualifying hits.
pub fn detect(
    series: &CandleSeries,
    dc_flags: &[bool],
    anchor: (Option<usize>, AnchorStatus),
    sequence: &SequenceDefinition,
    params: &DetectParams<'_>,
) -> Report {
    let (anchor_index, anchor_status) = anchor;
    let mut report = Report {
        sequence: sequence.name().to_string(),
        rule: params.rule,
        anchor_index,
        anchor_status,
        alignments: Vec::new(),
        hits: Vec::new(),
    };

    let Some(index) = anchor_index else {
        log::warn!("no anchor candle for sequence {}", sequence.name());
        return report;
    };

    for offset in OFFSETS {
        let alignment = align_offset(
            series,
            dc_flags,
            Anchor::new(index, anchor_status),
            sequence,
            offset as i32,
        );
        report
            .hits
            .extend(detect_hits(series, dc_flags, &alignment, params));
        report.alignments.push(alignment);
    }

    log::debug!(
        "{} {} hits for sequence {} across {} offsets",
        report.hits.len(),
        params.rule.as_str(),
        sequence.name(),
        report.alignments.len()
    );
    report
}
