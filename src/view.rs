//! History table view model
//!
//! Read-only projection of the current page consumed by the table
//! renderer. Severities are computed here, at render time, against
//! whatever threshold map is current.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::classifier::{classify, Severity};
use crate::filter::SortOrder;
use crate::models::{LiveReading, Parameter, Reading, ThresholdMap};
use crate::paginator::{PageInfo, PaginationControls, Paginator};

/// Cell text for a channel the sensor did not report
pub const PLACEHOLDER: &str = "--";

/// Shown instead of rows when a filter matched nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyNotice {
    pub title: &'static str,
    pub detail: &'static str,
}

impl EmptyNotice {
    fn no_records() -> Self {
        Self {
            title: "No Data Available",
            detail: "There are no records for the selected date range",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub parameter: Parameter,
    pub value: Option<f64>,
    pub display: String,
    pub severity: Severity,
    pub css_class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub timestamp: i64,
    pub display_time: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub filter_applied: bool,
    pub sort: SortOrder,
    pub current_page: usize,
    pub total_pages: usize,
    pub rows: Vec<HistoryRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationControls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<EmptyNotice>,
}

/// Live snapshot with per-channel severities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveView {
    pub reading: Option<LiveReading>,
    pub cells: Vec<Cell>,
}

/// Render the current page of `working_set`.
///
/// `working_set` is `None` until the first filter command succeeds.
pub fn render_history(
    working_set: Option<&[Reading]>,
    pager: &Paginator,
    sort: SortOrder,
    thresholds: Option<&ThresholdMap>,
    offset: &FixedOffset,
) -> HistoryView {
    let Some(working) = working_set else {
        return HistoryView {
            filter_applied: false,
            sort,
            current_page: pager.current(),
            total_pages: 0,
            rows: Vec::new(),
            info: None,
            summary: None,
            pagination: None,
            notice: None,
        };
    };

    let rows = pager
        .slice(working)
        .iter()
        .map(|reading| HistoryRow {
            timestamp: reading.timestamp,
            display_time: format_timestamp(reading.timestamp, offset),
            cells: Parameter::ALL
                .iter()
                .map(|p| cell(*p, reading.value(*p), thresholds))
                .collect(),
        })
        .collect();

    let info = pager.info(working.len());

    HistoryView {
        filter_applied: true,
        sort,
        current_page: pager.current(),
        total_pages: pager.total_pages(working.len()),
        rows,
        summary: info.as_ref().map(PageInfo::summary),
        info,
        pagination: pager.controls(working.len()),
        notice: working.is_empty().then(EmptyNotice::no_records),
    }
}

pub fn render_live(reading: Option<&LiveReading>, thresholds: Option<&ThresholdMap>) -> LiveView {
    LiveView {
        reading: reading.cloned(),
        cells: Parameter::ALL
            .iter()
            .map(|p| cell(*p, reading.and_then(|r| r.value(*p)), thresholds))
            .collect(),
    }
}

pub fn cell(parameter: Parameter, value: Option<f64>, thresholds: Option<&ThresholdMap>) -> Cell {
    let severity = classify(parameter, value, thresholds);
    Cell {
        parameter,
        value,
        display: format_value(parameter, value),
        severity,
        css_class: severity.css_class(),
    }
}

/// Fixed-precision value, or the placeholder when absent
pub fn format_value(parameter: Parameter, value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.*}", parameter.precision(), v),
        None => PLACEHOLDER.to_string(),
    }
}

/// `M/D/YYYY, h:mm:ss AM` in the local offset
pub fn format_timestamp(timestamp: i64, offset: &FixedOffset) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|dt| {
            dt.with_timezone(offset)
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}
