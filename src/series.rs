//! Candle series model
//!
//! A [`CandleSeries`] is a non-empty, strictly time-ordered run of [`Candle`]s
//! with a fixed nominal step. Gaps are tolerated: not every slot of the step
//! grid has to be present.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::{AnalysisError, OHLCExt, Result, StepMinutes, OHLC};

const MINUTES_PER_DAY: u32 = 1440;

// ============================================================
// CANDLE
// ============================================================

/// One OHLC bar, stamped with its open time.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    #[inline]
    pub fn time_of_day(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

impl OHLC for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }
}

// ============================================================
// TIMEZONE
// ============================================================

/// Fixed hour shift applied to a whole series.
///
/// Only two shifts exist in practice: data already in the analysis zone, or
/// data one hour behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TzOffset {
    #[default]
    Same,
    PlusOneHour,
}

impl TzOffset {
    #[inline]
    pub fn hours(self) -> i64 {
        match self {
            TzOffset::Same => 0,
            TzOffset::PlusOneHour => 1,
        }
    }
}

impl FromStr for TzOffset {
    type Err = AnalysisError;

    fn from_str(label: &str) -> Result<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "same" | "0" | "+0" | "utc" => Ok(TzOffset::Same),
            "1" | "+1" | "+1h" | "plus_one_hour" => Ok(TzOffset::PlusOneHour),
            other => Err(AnalysisError::InvalidConfig(format!(
                "unsupported timezone offset label: {other}"
            ))),
        }
    }
}

// ============================================================
// SERIES
// ============================================================

/// Validated, strictly ascending candle series.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    step: StepMinutes,
}

impl CandleSeries {
    /// Validate and wrap `candles`.
    ///
    /// Rejects empty input, NaN/infinite or inverted OHLC values and any
    /// timestamp that does not strictly follow its predecessor.
    pub fn new(candles: Vec<Candle>, step: StepMinutes) -> Result<Self> {
        if candles.is_empty() {
            return Err(AnalysisError::EmptySeries);
        }

        for (i, candle) in candles.iter().enumerate() {
            candle.validate().map_err(|e| match e {
                AnalysisError::InvalidCandle { reason, .. } => {
                    AnalysisError::InvalidCandle { index: i, reason }
                }
                other => other,
            })?;
        }

        if let Some(i) = (1..candles.len()).find(|&i| candles[i].timestamp <= candles[i - 1].timestamp)
        {
            return Err(AnalysisError::UnorderedSeries { index: i });
        }

        Ok(Self { candles, step })
    }

    /// Build a series whose step is the most frequent gap between candles.
    pub fn with_inferred_step(candles: Vec<Candle>) -> Result<Self> {
        let minutes = infer_step(&candles)
            .ok_or(AnalysisError::InvalidValue("cannot infer step from fewer than two candles"))?;
        Self::new(candles, StepMinutes::new(minutes)?)
    }

    #[inline]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Always false for a constructed series; kept for slice-like ergonomics.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    #[inline]
    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime> {
        self.candles.get(index).map(|c| c.timestamp)
    }

    #[inline]
    pub fn step(&self) -> StepMinutes {
        self.step
    }

    #[inline]
    pub fn first(&self) -> &Candle {
        &self.candles[0]
    }

    #[inline]
    pub fn last(&self) -> &Candle {
        &self.candles[self.candles.len() - 1]
    }

    /// Shift every timestamp by the offset's hour delta.
    pub fn adjust_timezone(&self, offset: TzOffset) -> Self {
        let shift = Duration::hours(offset.hours());
        if shift.is_zero() {
            return self.clone();
        }
        let candles = self
            .candles
            .iter()
            .map(|c| Candle {
                timestamp: c.timestamp + shift,
                ..*c
            })
            .collect();
        Self {
            candles,
            step: self.step,
        }
    }

    /// Aggregate into a coarser timeframe.
    ///
    /// `target` must be a multiple of the current step and divide a day
    /// evenly, so buckets line up with midnight.
    pub fn resample(&self, target: StepMinutes) -> Result<Self> {
        let from = self.step.get();
        let to = target.get();
        if to % from != 0 || MINUTES_PER_DAY % to != 0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "cannot resample {from}m candles into {to}m buckets"
            )));
        }
        if to == from {
            return Ok(self.clone());
        }

        let mut out: Vec<Candle> = Vec::with_capacity(self.candles.len() / (to / from) as usize + 1);
        let mut current_start: Option<NaiveDateTime> = None;

        for candle in &self.candles {
            let start = bucket_start(candle.timestamp, to);
            match out.last_mut() {
                Some(bar) if current_start == Some(start) => {
                    bar.high = bar.high.max(candle.high);
                    bar.low = bar.low.min(candle.low);
                    bar.close = candle.close;
                }
                _ => {
                    out.push(Candle { timestamp: start, ..*candle });
                    current_start = Some(start);
                }
            }
        }

        Self::new(out, target)
    }
}

fn bucket_start(ts: NaiveDateTime, bucket_minutes: u32) -> NaiveDateTime {
    let minute_of_day = ts.hour() * 60 + ts.minute();
    let offset = minute_of_day - minute_of_day % bucket_minutes;
    ts.date().and_time(NaiveTime::MIN) + Duration::minutes(offset as i64)
}

/// Most frequent positive gap between consecutive candles, in minutes.
///
/// Ties resolve to the smaller gap. Returns `None` for fewer than two candles.
pub fn infer_step(candles: &[Candle]) -> Option<u32> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in candles.windows(2) {
        let gap = (pair[1].timestamp - pair[0].timestamp).num_minutes();
        if gap > 0 {
            *counts.entry(gap).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(gap_a, n_a), (gap_b, n_b)| n_a.cmp(n_b).then(gap_b.cmp(gap_a)))
        .and_then(|(gap, _)| u32::try_from(gap).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn flat(day: u32, h: u32, m: u32, o: f64, c: f64) -> Candle {
        Candle::new(ts(day, h, m), o, o.max(c) + 1.0, o.min(c) - 1.0, c)
    }

    #[test]
    fn test_rejects_empty() {
        let err = CandleSeries::new(vec![], StepMinutes::new(60).unwrap()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySeries));
    }

    #[test]
    fn test_rejects_unordered() {
        let candles = vec![flat(1, 10, 0, 1.0, 2.0), flat(1, 9, 0, 1.0, 2.0)];
        let err = CandleSeries::new(candles, StepMinutes::new(60).unwrap()).unwrap_err();
        assert!(matches!(err, AnalysisError::UnorderedSeries { index: 1 }));
    }

    #[test]
    fn test_rejects_invalid_candle_with_index() {
        let mut bad = flat(1, 11, 0, 1.0, 2.0);
        bad.high = bad.low - 1.0;
        let candles = vec![flat(1, 10, 0, 1.0, 2.0), bad];
        let err = CandleSeries::new(candles, StepMinutes::new(60).unwrap()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidCandle { index: 1, .. }));
    }

    #[test]
    fn test_adjust_timezone() {
        let series = CandleSeries::new(vec![flat(1, 10, 0, 1.0, 2.0)], StepMinutes::new(60).unwrap())
            .unwrap();
        assert_eq!(series.adjust_timezone(TzOffset::Same), series);
        let shifted = series.adjust_timezone(TzOffset::PlusOneHour);
        assert_eq!(shifted.first().timestamp, ts(1, 11, 0));
    }

    #[test]
    fn test_tz_offset_labels() {
        assert_eq!("same".parse::<TzOffset>().unwrap(), TzOffset::Same);
        assert_eq!("+1".parse::<TzOffset>().unwrap(), TzOffset::PlusOneHour);
        assert_eq!("+1H".parse::<TzOffset>().unwrap(), TzOffset::PlusOneHour);
        assert!("+2".parse::<TzOffset>().is_err());
    }

    #[test]
    fn test_infer_step() {
        let candles = vec![
            flat(1, 0, 0, 1.0, 2.0),
            flat(1, 1, 12, 1.0, 2.0),
            flat(1, 2, 24, 1.0, 2.0),
            flat(1, 6, 0, 1.0, 2.0),
        ];
        assert_eq!(infer_step(&candles), Some(72));
        assert_eq!(infer_step(&candles[..1]), None);
    }

    #[test]
    fn test_resample_hourly_to_two_hours() {
        let candles = vec![
            Candle::new(ts(1, 0, 0), 10.0, 12.0, 9.0, 11.0),
            Candle::new(ts(1, 1, 0), 11.0, 15.0, 10.0, 14.0),
            Candle::new(ts(1, 2, 0), 14.0, 14.5, 8.0, 9.0),
        ];
        let series = CandleSeries::new(candles, StepMinutes::new(60).unwrap()).unwrap();
        let two_hour = series.resample(StepMinutes::new(120).unwrap()).unwrap();

        assert_eq!(two_hour.len(), 2);
        let first = two_hour.first();
        assert_eq!(first.timestamp, ts(1, 0, 0));
        assert_eq!((first.open, first.high, first.low, first.close), (10.0, 15.0, 9.0, 14.0));
        assert_eq!(two_hour.last().timestamp, ts(1, 2, 0));
    }

    #[test]
    fn test_resample_rejects_uneven_target() {
        let series = CandleSeries::new(vec![flat(1, 0, 0, 1.0, 2.0)], StepMinutes::new(60).unwrap())
            .unwrap();
        assert!(series.resample(StepMinutes::new(90).unwrap()).is_err());
        assert!(series.resample(StepMinutes::new(420).unwrap()).is_err());
    }
}
