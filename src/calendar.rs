//! Date-picker support
//!
//! Derives the set of days that hold at least one reading and marks the
//! days of a picker month so the client can tell data days from empty ones
//! and grey out days that would invert the selected range.

use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::filter::local_date;
use crate::models::Reading;

/// Distinct local calendar days present in the history buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    days: BTreeSet<NaiveDate>,
}

impl Availability {
    pub fn from_history(history: &[Reading], offset: &FixedOffset) -> Self {
        Self {
            days: history
                .iter()
                .filter_map(|r| local_date(r.timestamp, offset))
                .collect(),
        }
    }

    pub fn has_data(&self, date: NaiveDate) -> bool {
        self.days.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }
}

/// Selectable window of one calendar year
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarWindow {
    min_date: NaiveDate,
    max_date: NaiveDate,
}

impl CalendarWindow {
    /// Jan 1 through Dec 31 of `year`; `None` if the year is out of range
    pub fn for_year(year: i32) -> Option<Self> {
        Some(Self {
            min_date: NaiveDate::from_ymd_opt(year, 1, 1)?,
            max_date: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn min_date(&self) -> NaiveDate {
        self.min_date
    }

    pub fn max_date(&self) -> NaiveDate {
        self.max_date
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.min_date && date <= self.max_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Picker {
    Start,
    End,
}

impl Picker {
    pub fn other(self) -> Self {
        match self {
            Picker::Start => Picker::End,
            Picker::End => Picker::Start,
        }
    }
}

/// Which picker the client should redraw after a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedrawHint {
    pub redraw: Picker,
}

/// Dates currently chosen in the two pickers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSelection {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RangeSelection {
    /// Record a selection (or clear it with `None`) and hint the other picker.
    pub fn select(&mut self, picker: Picker, date: Option<NaiveDate>) -> RedrawHint {
        match picker {
            Picker::Start => self.start = date,
            Picker::End => self.end = date,
        }
        RedrawHint {
            redraw: picker.other(),
        }
    }
}

/// One day cell of a picker month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMarking {
    pub date: NaiveDate,
    pub has_data: bool,
    pub disabled: bool,
}

/// Mark every day of `year`/`month` for the given picker.
///
/// A day is disabled when it lies outside the window, or (soft range
/// constraint) after the chosen end date in the start picker, or before the
/// chosen start date in the end picker. Returns `None` for an invalid month.
pub fn mark_month(
    window: &CalendarWindow,
    availability: &Availability,
    selection: &RangeSelection,
    picker: Picker,
    year: i32,
    month: u32,
) -> Option<Vec<DayMarking>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    let days = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| {
            let crosses_selection = match picker {
                Picker::Start => selection.end.is_some_and(|end| date > end),
                Picker::End => selection.start.is_some_and(|start| date < start),
            };
            DayMarking {
                date,
                has_data: availability.has_data(date),
                disabled: !window.contains(date) || crosses_selection,
            }
        })
        .collect();

    Some(days)
}
