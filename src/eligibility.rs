//! Eligibility sets and the news signals that protect offsets from elimination
//!
//! An [`EligibilitySet`] is the alphabet the pattern automaton may use at one
//! file's position. It starts full (`-3..=3`) and loses every offset that
//! produced a large IOU/IOV candle without an effective news event nearby.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use chrono::{Duration, NaiveDateTime};

use crate::detector::Report;
use crate::{AnalysisError, Result, Threshold};

/// Smallest and largest symbol of the alphabet
pub const MIN_SYMBOL: i8 = -3;
pub const MAX_SYMBOL: i8 = 3;

// ============================================================
// ELIGIBILITY SET
// ============================================================

/// Subset of the symbols `-3..=3`, stored as a 7-bit mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EligibilitySet(u8);

impl EligibilitySet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(0b111_1111);

    #[inline]
    fn bit(symbol: i8) -> Option<u8> {
        (MIN_SYMBOL..=MAX_SYMBOL)
            .contains(&symbol)
            .then(|| 1u8 << (symbol - MIN_SYMBOL) as u32)
    }

    /// Build from symbols, rejecting anything outside `-3..=3`.
    pub fn from_symbols(symbols: &[i8]) -> Result<Self> {
        let mut set = Self::EMPTY;
        for &s in symbols {
            set.insert(s)?;
        }
        Ok(set)
    }

    /// Const-friendly builder for symbols known to be in range.
    pub(crate) const fn of(symbols: &[i8]) -> Self {
        let mut mask = 0u8;
        let mut i = 0;
        while i < symbols.len() {
            mask |= 1u8 << (symbols[i] - MIN_SYMBOL) as u32;
            i += 1;
        }
        Self(mask)
    }

    #[inline]
    pub fn contains(self, symbol: i8) -> bool {
        Self::bit(symbol).is_some_and(|b| self.0 & b != 0)
    }

    pub fn insert(&mut self, symbol: i8) -> Result<()> {
        let b = Self::bit(symbol).ok_or(AnalysisError::InvalidSymbol(symbol as i32))?;
        self.0 |= b;
        Ok(())
    }

    pub fn remove(&mut self, symbol: i8) {
        if let Some(b) = Self::bit(symbol) {
            self.0 &= !b;
        }
    }

    #[inline]
    pub fn without(mut self, symbol: Option<i8>) -> Self {
        if let Some(s) = symbol {
            self.remove(s);
        }
        self
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Symbols in ascending order
    pub fn iter(self) -> impl Iterator<Item = i8> {
        (MIN_SYMBOL..=MAX_SYMBOL).filter(move |&s| self.contains(s))
    }

    pub fn to_vec(self) -> Vec<i8> {
        self.iter().collect()
    }
}

impl BitAnd for EligibilitySet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for EligibilitySet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for EligibilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for EligibilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl serde::Serialize for EligibilitySet {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_vec().serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for EligibilitySet {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let symbols = Vec::<i8>::deserialize(d)?;
        EligibilitySet::from_symbols(&symbols).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// NEWS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    Normal,
    Holiday,
    #[serde(alias = "all-day")]
    AllDay,
    Speech,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NewsEvent {
    pub time: NaiveDateTime,
    pub title: String,
    pub category: NewsCategory,
    #[serde(default)]
    pub is_null: bool,
}

impl NewsEvent {
    /// Only scheduled releases and speeches move price; holidays and
    /// all-day markers do not.
    pub fn is_effective(&self) -> bool {
        !self.is_null && matches!(self.category, NewsCategory::Normal | NewsCategory::Speech)
    }
}

/// Read-only access to resolved news data.
pub trait NewsLookup {
    /// Events in `[ts - null_back_minutes, ts + duration_minutes)`.
    fn find_news(
        &self,
        ts: NaiveDateTime,
        duration_minutes: u32,
        null_back_minutes: u32,
    ) -> Vec<NewsEvent>;
}

/// Lookup that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

impl NewsLookup for NoNews {
    fn find_news(&self, _: NaiveDateTime, _: u32, _: u32) -> Vec<NewsEvent> {
        Vec::new()
    }
}

/// Immutable, time-sorted news snapshot fetched once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "Vec<NewsEvent>", into = "Vec<NewsEvent>")]
pub struct NewsSnapshot {
    events: Vec<NewsEvent>,
}

impl NewsSnapshot {
    pub fn new(mut events: Vec<NewsEvent>) -> Self {
        events.sort_by_key(|e| e.time);
        Self { events }
    }

    pub fn events(&self) -> &[NewsEvent] {
        &self.events
    }
}

impl From<Vec<NewsEvent>> for NewsSnapshot {
    fn from(events: Vec<NewsEvent>) -> Self {
        Self::new(events)
    }
}

impl From<NewsSnapshot> for Vec<NewsEvent> {
    fn from(snapshot: NewsSnapshot) -> Self {
        snapshot.events
    }
}

impl NewsLookup for NewsSnapshot {
    fn find_news(&self, ts: NaiveDateTime, duration: u32, null_back: u32) -> Vec<NewsEvent> {
        let from = ts - Duration::minutes(null_back as i64);
        let to = ts + Duration::minutes(duration as i64);
        let start = self.events.partition_point(|e| e.time < from);
        self.events[start..]
            .iter()
            .take_while(|e| e.time < to)
            .cloned()
            .collect()
    }
}

/// Window searched around each hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NewsWindow {
    pub duration_minutes: u32,
    pub null_back_minutes: u32,
}

impl Default for NewsWindow {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            null_back_minutes: 15,
        }
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Reduce a detector report to the offsets still eligible for this file.
///
/// A wildcard file keeps every offset regardless of its hits.
pub fn build_eligibility<N: NewsLookup + ?Sized>(
    report: &Report,
    news: &N,
    limit: Threshold,
    window: NewsWindow,
    wildcard: bool,
) -> EligibilitySet {
    if wildcard {
        return EligibilitySet::FULL;
    }

    let mut set = EligibilitySet::FULL;
    for hit in &report.hits {
        if !set.contains(hit.offset) || hit.oc.abs() <= limit.get() {
            continue;
        }
        let events = news.find_news(hit.timestamp, window.duration_minutes, window.null_back_minutes);
        if events.iter().any(NewsEvent::is_effective) {
            continue;
        }
        log::debug!(
            "offset {} eliminated by {} hit at {} (oc {:.5})",
            hit.offset,
            report.rule.as_str(),
            hit.timestamp,
            hit.oc
        );
        set.remove(hit.offset);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn event(h: u32, m: u32, category: NewsCategory) -> NewsEvent {
        NewsEvent {
            time: ts(h, m),
            title: "CPI".to_string(),
            category,
            is_null: false,
        }
    }

    #[test]
    fn test_set_basics() {
        let mut set = EligibilitySet::from_symbols(&[-3, 0, 2]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(-3) && set.contains(0) && set.contains(2));
        assert!(!set.contains(1));
        assert!(!set.contains(9));
        set.remove(0);
        assert_eq!(set.to_vec(), vec![-3, 2]);
        assert_eq!(EligibilitySet::FULL.to_vec(), vec![-3, -2, -1, 0, 1, 2, 3]);
        assert!(EligibilitySet::from_symbols(&[4]).is_err());
    }

    #[test]
    fn test_set_ops() {
        let a = EligibilitySet::of(&[1, 2, 3]);
        let b = EligibilitySet::of(&[2, 3, -1]);
        assert_eq!((a & b).to_vec(), vec![2, 3]);
        assert_eq!((a | b).len(), 4);
        assert_eq!(a.without(Some(2)).to_vec(), vec![1, 3]);
        assert_eq!(a.without(None), a);
        assert_eq!(format!("{a}"), "{1, 2, 3}");
    }

    #[test]
    fn test_set_serde() {
        let set: EligibilitySet = serde_json::from_str("[-1, 3]").unwrap();
        assert_eq!(set.to_vec(), vec![-1, 3]);
        assert_eq!(serde_json::to_string(&set).unwrap(), "[-1,3]");
        assert!(serde_json::from_str::<EligibilitySet>("[7]").is_err());
    }

    #[test]
    fn test_effective_categories() {
        assert!(event(9, 0, NewsCategory::Normal).is_effective());
        assert!(event(9, 0, NewsCategory::Speech).is_effective());
        assert!(!event(9, 0, NewsCategory::Holiday).is_effective());
        assert!(!event(9, 0, NewsCategory::AllDay).is_effective());
        let mut null = event(9, 0, NewsCategory::Normal);
        null.is_null = true;
        assert!(!null.is_effective());
    }

    #[test]
    fn test_snapshot_window() {
        let snapshot = NewsSnapshot::new(vec![
            event(11, 0, NewsCategory::Normal),
            event(9, 50, NewsCategory::Speech),
            event(10, 30, NewsCategory::Holiday),
            event(8, 0, NewsCategory::Normal),
        ]);
        let found = snapshot.find_news(ts(10, 0), 60, 15);
        let times: Vec<_> = found.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![ts(9, 50), ts(10, 30)]);
    }

    #[test]
    fn test_category_alias() {
        let parsed: NewsCategory = serde_json::from_str("\"all-day\"").unwrap();
        assert_eq!(parsed, NewsCategory::AllDay);
    }
}
