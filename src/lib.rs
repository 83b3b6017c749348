//! # IOUSEQ - offset alignment and symbolic sequence engine
//!
//! Analysis library for fixed-period OHLC candle series:
//!
//! - align named step sequences onto real candles, skipping DC candles
//! - detect IOU/IOV candles (sign and magnitude rule with tolerance)
//! - reduce each file to an eligibility set of offsets `-3..=3`
//! - enumerate, validate and chain symbol sequences under a ramp grammar
//!
//! ## Quick Start
//!
//! ```rust
//! use iouseq::prelude::*;
//!
//! let analyzer = AnalyzerBuilder::new()
//!     .limit(0.0010)
//!     .tolerance(0.0002)
//!     .sequence("S1", vec![1, 2, 3])
//!     .build()
//!     .unwrap();
//!
//! // One eligibility set per file, in file order
//! let sets = vec![EligibilitySet::FULL; 4];
//! let found = analyzer.enumerate(&sets);
//! assert_eq!(found.total, found.sequences.len() as u128);
//! ```

pub mod alignment;
pub mod calendar;
pub mod config;
pub mod detector;
pub mod eligibility;
pub mod grammar;
pub mod series;

pub mod prelude {
    pub use crate::{
        // Alignment
        alignment::{align_offset, find_anchor, predict_timestamp, AlignmentResult, Anchor, AnchorStatus, OffsetStatus, StepHit},
        // Parallel
        analyze_files,
        // Calendar
        calendar::{DcRules, ForbiddenSlots, SlotPattern},
        // Config
        config::{AnalysisConfig, SequenceBook, SequenceDefinition},
        // Detection
        detector::{IouHit, IouRule, Report},
        // Eligibility
        eligibility::{build_eligibility, EligibilitySet, NewsCategory, NewsEvent, NewsLookup, NewsSnapshot, NewsWindow, NoNews},
        // Grammar
        grammar::{find_mirror_runs, AutomatonState, EnumerateOptions, Enumeration, Grammar, GrammarVariant, PatternSequence},
        // Series
        series::{Candle, CandleSeries, TzOffset},
        // Errors
        AnalysisError,
        // Engine
        Analyzer,
        AnalyzerBuilder,
        FileAnalysis,
        FileError,
        FileInput,
        // Core traits
        OHLCExt,
        Result,
        StepMinutes,
        Threshold,
        OHLC,
    };
}

use chrono::NaiveTime;

use alignment::{align_offset, find_anchor, Anchor, AlignmentResult};
use calendar::{DcRules, ForbiddenSlots};
use config::AnalysisConfig;
use detector::{detect, DetectParams, IouRule, Report};
use eligibility::{build_eligibility, EligibilitySet, NewsLookup, NewsWindow};
use grammar::{Enumeration, Grammar, PatternSequence};
use series::{CandleSeries, TzOffset};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Input errors; data shortfalls are reported in-band instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Empty candle series")]
    EmptySeries,

    #[error("Candle at index {index} is not after its predecessor")]
    UnorderedSeries { index: usize },

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("Symbol {0} outside -3..=3")]
    InvalidSymbol(i32),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Candle period in minutes (1..=1440)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepMinutes(u32);

impl StepMinutes {
    /// Create a new StepMinutes, validating 0 < value <= 1440
    pub fn new(value: u32) -> Result<Self> {
        if value == 0 || value > 1440 {
            return Err(AnalysisError::OutOfRange {
                field: "StepMinutes",
                value: value as f64,
                min: 1.0,
                max: 1440.0,
            });
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl serde::Serialize for StepMinutes {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for StepMinutes {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = u32::deserialize(d)?;
        StepMinutes::new(value).map_err(serde::de::Error::custom)
    }
}

/// Non-negative, finite price distance (limits and tolerances)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::InvalidValue(
                "Threshold cannot be NaN or infinite",
            ));
        }
        if value < 0.0 {
            return Err(AnalysisError::OutOfRange {
                field: "Threshold",
                value,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Threshold {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Threshold {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Threshold::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core OHLC data trait
pub trait OHLC {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCExt: OHLC {
    /// Signed body: close - open
    #[inline]
    fn oc(&self) -> f64 {
        self.close() - self.open()
    }

    /// Validate OHLC data consistency
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if self.high() < self.low() {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLC> OHLCExt for T {}

// ============================================================
// ANALYZER
// ============================================================

/// Configured analysis pipeline
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[inline]
    pub fn grammar(&self) -> Grammar {
        self.config.grammar
    }

    /// Series shifted into the analysis timezone.
    pub fn prepare(&self, series: &CandleSeries) -> CandleSeries {
        series.adjust_timezone(self.config.timezone)
    }

    /// Per-candle DC flags.
    pub fn dc_flags(&self, series: &CandleSeries) -> Vec<bool> {
        self.config.dc_rules.classify(series)
    }

    /// Align `sequence_name` at every offset `-3..=3`; empty when no anchor
    /// candle exists.
    pub fn align(&self, series: &CandleSeries, sequence_name: &str) -> Result<Vec<AlignmentResult>> {
        let sequence = self.config.sequences.get(sequence_name)?;
        let series = self.prepare(series);
        let dc_flags = self.dc_flags(&series);
        let (index, status) = find_anchor(&series, self.config.anchor_time);
        let Some(index) = index else {
            return Ok(Vec::new());
        };
        Ok(detector::OFFSETS
            .map(|offset| {
                align_offset(&series, &dc_flags, Anchor::new(index, status), &sequence, offset as i32)
            })
            .collect())
    }

    /// Run the IOU/IOV detector for one series.
    pub fn detect(&self, series: &CandleSeries, sequence_name: &str) -> Result<Report> {
        let sequence = self.config.sequences.get(sequence_name)?;
        let series = self.prepare(series);
        let dc_flags = self.dc_flags(&series);
        let anchor = find_anchor(&series, self.config.anchor_time);
        let params = DetectParams {
            limit: self.config.limit,
            tolerance: self.config.tolerance,
            rule: self.config.rule,
            forbidden: &self.config.forbidden,
        };
        Ok(detect(&series, &dc_flags, anchor, &sequence, &params))
    }

    /// Offsets still eligible after applying news protection.
    pub fn eligibility<N: NewsLookup + ?Sized>(
        &self,
        report: &Report,
        news: &N,
        wildcard: bool,
    ) -> EligibilitySet {
        build_eligibility(report, news, self.config.limit, self.config.news, wildcard)
    }

    /// Detect and reduce one file.
    pub fn analyze_file<N: NewsLookup + ?Sized>(
        &self,
        file: &FileInput<'_>,
        news: &N,
    ) -> Result<FileAnalysis> {
        let report = self.detect(file.series, file.sequence)?;
        let eligibility = self.eligibility(&report, news, file.wildcard);
        Ok(FileAnalysis {
            name: file.name.to_string(),
            report,
            eligibility,
        })
    }

    /// Enumerate sequences over per-file eligibility sets.
    pub fn enumerate(&self, sets: &[EligibilitySet]) -> Enumeration {
        self.config.grammar.enumerate(sets, self.config.enumerate)
    }

    /// Chain previously enumerated groups.
    pub fn chain(&self, groups: &[Vec<PatternSequence>]) -> Enumeration {
        self.config.grammar.chain(groups, self.config.enumerate)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Analyzer instances
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
    limit: Option<f64>,
    tolerance: Option<f64>,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn timezone(mut self, offset: TzOffset) -> Self {
        self.config.timezone = offset;
        self
    }

    pub fn anchor_time(mut self, time: NaiveTime) -> Self {
        self.config.anchor_time = time;
        self
    }

    /// Magnitude limit (validated on build)
    pub fn limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Tolerance added to the limit (validated on build)
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn rule(mut self, rule: IouRule) -> Self {
        self.config.rule = rule;
        self
    }

    pub fn news_window(mut self, window: NewsWindow) -> Self {
        self.config.news = window;
        self
    }

    pub fn dc_rules(mut self, rules: DcRules) -> Self {
        self.config.dc_rules = rules;
        self
    }

    pub fn forbidden(mut self, slots: ForbiddenSlots) -> Self {
        self.config.forbidden = slots;
        self
    }

    /// Add or replace a named sequence
    pub fn sequence(mut self, name: impl Into<String>, values: Vec<i32>) -> Self {
        self.config.sequences.insert(name, values);
        self
    }

    pub fn grammar(mut self, grammar: Grammar) -> Self {
        self.config.grammar = grammar;
        self
    }

    pub fn beam_width(mut self, width: usize) -> Self {
        self.config.enumerate.beam_width = Some(width);
        self
    }

    pub fn max_paths(mut self, max: usize) -> Self {
        self.config.enumerate.max_paths = Some(max);
        self
    }

    /// Build the analyzer
    pub fn build(mut self) -> Result<Analyzer> {
        if let Some(limit) = self.limit {
            self.config.limit = Threshold::new(limit)?;
        }
        if let Some(tolerance) = self.tolerance {
            self.config.tolerance = Threshold::new(tolerance)?;
        }
        self.config.validate()?;
        Ok(Analyzer {
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// One input file of a multi-file analysis
#[derive(Debug, Clone, Copy)]
pub struct FileInput<'a> {
    pub name: &'a str,
    pub series: &'a CandleSeries,
    pub sequence: &'a str,
    /// Keep every offset regardless of hits
    pub wildcard: bool,
}

/// Result of analyzing a single file
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileAnalysis {
    pub name: String,
    pub report: Report,
    pub eligibility: EligibilitySet,
}

/// Error from analyzing a single file
#[derive(Debug)]
pub struct FileError {
    pub name: String,
    pub error: AnalysisError,
}

/// Parallel analysis of multiple files; both outputs keep input order.
pub fn analyze_files<'a, I, N>(
    analyzer: &Analyzer,
    files: I,
    news: &N,
) -> (Vec<FileAnalysis>, Vec<FileError>)
where
    I: IntoParallelIterator<Item = FileInput<'a>>,
    N: NewsLookup + Sync + ?Sized,
{
    let results: Vec<_> = files
        .into_par_iter()
        .map(|file| {
            analyzer
                .analyze_file(&file, news)
                .map_err(|error| FileError {
                    name: file.name.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                log::warn!("analysis of {} failed: {}", e.name, e.error);
                errors.push(e);
            }
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use crate::series::Candle;

    fn hourly(n: usize) -> CandleSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let candles = (0..n)
            .map(|i| {
                let o = 100.0 + i as f64;
                Candle::new(base + Duration::hours(i as i64), o, o + 1.0, o - 1.0, o + 0.5)
            })
            .collect();
        CandleSeries::new(candles, StepMinutes::new(60).unwrap()).unwrap()
    }

    #[test]
    fn test_step_minutes_validation() {
        assert!(StepMinutes::new(1).is_ok());
        assert!(StepMinutes::new(1440).is_ok());
        assert!(StepMinutes::new(0).is_err());
        assert!(StepMinutes::new(1441).is_err());
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(0.5).is_ok());
        assert!(Threshold::new(-0.1).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert!(Threshold::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_ohlc_ext() {
        let candle = hourly(1).first().to_owned();
        assert_eq!(candle.oc(), 0.5);
        assert!(candle.validate().is_ok());

        let inverted = Candle::new(candle.timestamp, 1.0, 0.5, 2.0, 1.0);
        assert!(matches!(
            inverted.validate(),
            Err(AnalysisError::InvalidCandle { reason: "high < low", .. })
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let analyzer = AnalyzerBuilder::new().build().unwrap();
        assert_eq!(analyzer.grammar(), Grammar::classic());
        assert_eq!(analyzer.config().anchor_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(AnalyzerBuilder::new().limit(-1.0).build().is_err());
        assert!(AnalyzerBuilder::new().tolerance(f64::NAN).build().is_err());
        assert!(AnalyzerBuilder::new().beam_width(0).build().is_err());
        assert!(AnalyzerBuilder::new().sequence("E", vec![]).build().is_err());
    }

    #[test]
    fn test_unknown_sequence() {
        let analyzer = AnalyzerBuilder::new().build().unwrap();
        let err = analyzer.detect(&hourly(10), "nope").unwrap_err();
        assert_eq!(err, AnalysisError::UnknownSequence("nope".into()));
    }

    #[test]
    fn test_align_all_offsets() {
        let analyzer = AnalyzerBuilder::new().sequence("S", vec![1, 2]).build().unwrap();
        let alignments = analyzer.align(&hourly(12), "S").unwrap();
        assert_eq!(alignments.len(), 7);
        // 18:00 is index 6
        assert_eq!(alignments[3].target_index, Some(6));
        assert_eq!(alignments[0].target_index, Some(3));
    }

    #[test]
    fn test_align_without_anchor() {
        let analyzer = AnalyzerBuilder::new().sequence("S", vec![1]).build().unwrap();
        assert!(analyzer.align(&hourly(3), "S").unwrap().is_empty());
    }

    #[test]
    fn test_parallel_analysis() {
        let analyzer = AnalyzerBuilder::new().sequence("S", vec![1, 2]).build().unwrap();
        let a = hourly(20);
        let b = hourly(20);
        let files = vec![
            FileInput { name: "a.csv", series: &a, sequence: "S", wildcard: false },
            FileInput { name: "b.csv", series: &b, sequence: "missing", wildcard: false },
        ];

        let (ok, failed) = analyze_files(&analyzer, files, &eligibility::NoNews);
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].name, "a.csv");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "b.csv");
    }
}
