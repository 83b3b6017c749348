//! Calendar tables: DC (skip) candles and forbidden detection slots
//!
//! Both tables are configuration data. A [`SlotPattern`] matches a timestamp
//! by weekday, hour and minute; any field left out matches everything.
//!
//! DC precedence, highest first:
//! 1. `never` patterns (forced non-DC)
//! 2. the Friday-close slot (never DC)
//! 3. `base` patterns (DC)
//! 4. otherwise not DC

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::series::CandleSeries;
use crate::StepMinutes;

// ============================================================
// SLOT PATTERN
// ============================================================

/// Weekday / time-of-day matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SlotPattern {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<Weekday>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
}

impl SlotPattern {
    /// Every slot at `minute` past any hour.
    pub const fn minute(minute: u32) -> Self {
        Self {
            weekday: None,
            hour: None,
            minute: Some(minute),
        }
    }

    /// A fixed time of day on any weekday.
    pub const fn at(hour: u32, minute: u32) -> Self {
        Self {
            weekday: None,
            hour: Some(hour),
            minute: Some(minute),
        }
    }

    pub const fn on(self, weekday: Weekday) -> Self {
        Self {
            weekday: Some(weekday),
            ..self
        }
    }

    pub fn matches(&self, ts: NaiveDateTime) -> bool {
        self.weekday.map_or(true, |w| ts.weekday() == w)
            && self.hour.map_or(true, |h| ts.hour() == h)
            && self.minute.map_or(true, |m| ts.minute() == m)
    }
}

// ============================================================
// DC RULES
// ============================================================

/// The last slot of the Friday session is never DC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FridayClose {
    /// Session close time on Friday
    pub close: NaiveTime,
    /// How far before the close the protected slot opens; defaults to one step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_before: Option<u32>,
}

/// DC (skip candle) classification table.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DcRules {
    pub base: Vec<SlotPattern>,
    pub never: Vec<SlotPattern>,
    pub friday_close: Option<FridayClose>,
}

impl DcRules {
    /// Table used by the intraday session apps: the `:00` slot is DC except
    /// on Sunday, 18:00 is never DC, and the slot before the 17:00 Friday
    /// close is never DC.
    pub fn session_standard() -> Self {
        Self {
            base: vec![SlotPattern::minute(0)],
            never: vec![SlotPattern::minute(0).on(Weekday::Sun), SlotPattern::at(18, 0)],
            friday_close: Some(FridayClose {
                close: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
                minutes_before: None,
            }),
        }
    }

    pub fn is_dc(&self, ts: NaiveDateTime, step: StepMinutes) -> bool {
        if self.never.iter().any(|p| p.matches(ts)) {
            return false;
        }
        if self.is_friday_close_slot(ts, step) {
            return false;
        }
        self.base.iter().any(|p| p.matches(ts))
    }

    /// Per-index DC flags for the whole series.
    pub fn classify(&self, series: &CandleSeries) -> Vec<bool> {
        let step = series.step();
        series
            .candles()
            .iter()
            .map(|c| self.is_dc(c.timestamp, step))
            .collect()
    }

    fn is_friday_close_slot(&self, ts: NaiveDateTime, step: StepMinutes) -> bool {
        let Some(rule) = self.friday_close else {
            return false;
        };
        if ts.weekday() != Weekday::Fri {
            return false;
        }
        let before = rule.minutes_before.unwrap_or(step.get());
        ts.time() + Duration::minutes(before as i64) == rule.close
    }
}

// ============================================================
// FORBIDDEN SLOTS
// ============================================================

/// Timestamps never reported by the IOU/IOV detector.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ForbiddenSlots(pub Vec<SlotPattern>);

impl ForbiddenSlots {
    pub fn is_forbidden(&self, ts: NaiveDateTime) -> bool {
        self.0.iter().any(|p| p.matches(ts))
    }
}
