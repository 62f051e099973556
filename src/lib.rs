pub mod config;
pub mod data_loading;
pub mod labeling;
pub mod output;
pub mod preprocessing;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// A named absolute calendar period (e.g. a medication course).
///
/// Observations are matched against it at day granularity: the time-of-day
/// part of `start` and `stop` is discarded during labeling.
#[derive(Debug, Clone)]
pub struct DatetimeSpan {
    pub name: String,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

/// A named recurring clock-time window (e.g. a morning measurement slot).
///
/// The window crosses midnight when `start > stop`.
#[derive(Debug, Clone)]
pub struct DailyWindow {
    pub name: String,
    pub start: NaiveTime,
    pub stop: NaiveTime,
}

/// Labeling outcome for one label family across all processed tables.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyLabels {
    /// Family name, also used in the QA column name ("QA: Unassigned (<family>)").
    pub family: String,
    /// Ordered label names; downstream model fitting selects columns by this list.
    pub labels: Vec<String>,
    /// Unassigned-observation count per table name.
    pub unassigned: BTreeMap<String, usize>,
}
