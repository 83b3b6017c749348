//! Analysis configuration
//!
//! Everything app-specific lives here: named step sequences, calendar tables,
//! detection thresholds and grammar defaults. [`AnalysisConfig`] deserializes
//! from any serde format; missing fields take their defaults.
//!
//! # Example
//!
//! ```rust
//! use iouseq::config::AnalysisConfig;
//!
//! let config: AnalysisConfig = serde_json::from_str(r#"{ "sequences": { "S1": [1, 2, 3] } }"#).unwrap();
//! assert!(config.sequences.get("S1").is_ok());
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;

use chrono::NaiveTime;

use crate::calendar::{DcRules, ForbiddenSlots};
use crate::detector::IouRule;
use crate::eligibility::NewsWindow;
use crate::grammar::{EnumerateOptions, Grammar};
use crate::series::TzOffset;
use crate::{AnalysisError, Result, Threshold};

// ============================================================
// SEQUENCES
// ============================================================

/// Named, non-empty list of logical step positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDefinition {
    name: String,
    values: Vec<i32>,
}

impl SequenceDefinition {
    pub fn new(name: impl Into<String>, values: Vec<i32>) -> Result<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(AnalysisError::InvalidConfig(format!(
                "sequence {name} has no values"
            )));
        }
        Ok(Self { name, values })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    #[inline]
    pub fn first(&self) -> i32 {
        self.values[0]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sequence definitions by name ("S1", "S2", ...); empty until configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SequenceBook(BTreeMap<String, Vec<i32>>);

impl SequenceBook {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<i32>) {
        self.0.insert(name.into(), values);
    }

    /// Look up and validate a sequence.
    pub fn get(&self, name: &str) -> Result<SequenceDefinition> {
        let values = self
            .0
            .get(name)
            .ok_or_else(|| AnalysisError::UnknownSequence(name.to_string()))?;
        SequenceDefinition::new(name, values.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        for name in self.0.keys() {
            self.get(name)?;
        }
        Ok(())
    }
}

// ============================================================
// ANALYSIS CONFIG
// ============================================================

fn default_anchor_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Complete, app-specific configuration of the pipeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Shift applied to incoming series
    pub timezone: TzOffset,
    /// Time of day of the day-start anchor candle
    pub anchor_time: NaiveTime,
    pub limit: Threshold,
    pub tolerance: Threshold,
    pub rule: IouRule,
    pub news: NewsWindow,
    pub dc_rules: DcRules,
    pub forbidden: ForbiddenSlots,
    pub sequences: SequenceBook,
    pub grammar: Grammar,
    pub enumerate: EnumerateOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timezone: TzOffset::Same,
            anchor_time: default_anchor_time(),
            limit: Threshold::new_const(0.0),
            tolerance: Threshold::new_const(0.0),
            rule: IouRule::Iou,
            news: NewsWindow::default(),
            dc_rules: DcRules::default(),
            forbidden: ForbiddenSlots::default(),
            sequences: SequenceBook::default(),
            grammar: Grammar::default(),
            enumerate: EnumerateOptions::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.sequences.validate()?;
        if self.enumerate.beam_width == Some(0) {
            return Err(AnalysisError::InvalidConfig("beam_width must be > 0".into()));
        }
        if self.enumerate.max_paths == Some(0) {
            return Err(AnalysisError::InvalidConfig("max_paths must be > 0".into()));
        }
        for pattern in self.dc_rules.base.iter().chain(&self.dc_rules.never).chain(&self.forbidden.0) {
            if pattern.hour.is_some_and(|h| h > 23) || pattern.minute.is_some_and(|m| m > 59) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "slot pattern out of range: {pattern:?}"
                )));
            }
        }
        Ok(())
    }
}
