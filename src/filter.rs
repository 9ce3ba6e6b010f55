//! Date-range filtering and sorting of the history buffer

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FilterError;
use crate::models::Reading;

/// Sort direction by timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    #[serde(alias = "ascending")]
    Oldest,
    /// Descending
    #[default]
    #[serde(alias = "descending")]
    Newest,
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, FilterError> {
        let (Some(start), Some(end)) = (start, end) else {
            return Err(FilterError::MissingDates);
        };
        if start > end {
            return Err(FilterError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Calendar day of a timestamp in the given local offset
pub fn local_date(timestamp: i64, offset: &FixedOffset) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(timestamp).map(|dt| dt.with_timezone(offset).date_naive())
}

/// Build a working set from the history buffer.
///
/// Keeps readings whose local calendar day falls inside `range`, then sorts
/// stably by timestamp so equal timestamps keep their buffer order.
pub fn filter_and_sort(
    history: &[Reading],
    range: &DateRange,
    order: SortOrder,
    offset: &FixedOffset,
) -> Vec<Reading> {
    let mut working: Vec<Reading> = history
        .iter()
        .filter(|r| local_date(r.timestamp, offset).is_some_and(|d| range.contains(d)))
        .cloned()
        .collect();

    match order {
        SortOrder::Oldest => working.sort_by_key(|r| r.timestamp),
        SortOrder::Newest => working.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
    }

    debug!(
        start = %range.start,
        end = %range.end,
        order = ?order,
        matched = working.len(),
        "History filtered"
    );

    working
}
