//! Application state management
//!
//! Single owned state object for the dashboard: the normalized history
//! buffer, the threshold map, the live snapshot, and the current filter
//! interaction (working set, page, sort, picker selection). Feed pushes
//! arrive through [`FeedSubscriber`]; user actions are explicit commands
//! that return a fresh read-only view.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::calendar::{mark_month, Availability, CalendarWindow, DayMarking, Picker, RangeSelection, RedrawHint};
use crate::config::{Settings, SettingsError};
use crate::error::FilterError;
use crate::feeds::{FeedKind, FeedStatusBoard, FeedStatusReport, FeedStatusSource, FeedSubscriber, FeedUpdate};
use crate::filter::{filter_and_sort, DateRange, SortOrder};
use crate::models::{LiveReading, Reading, ThresholdMap};
use crate::normalizer::normalize_snapshot;
use crate::paginator::{Paginator, DEFAULT_PAGE_SIZE};
use crate::view::{render_history, render_live, HistoryView, LiveView};

/// Default number of raw history records kept per snapshot
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

pub const DEFAULT_CALENDAR_YEAR: i32 = 2026;

/// Construction parameters for [`AppState`]
#[derive(Debug, Clone)]
pub struct StateOptions {
    pub offset: FixedOffset,
    pub history_limit: usize,
    pub page_size: usize,
    pub window: CalendarWindow,
}

impl StateOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let offset = settings
            .history
            .offset()
            .ok_or(SettingsError::InvalidOffset(settings.history.utc_offset_minutes))?;
        let window = settings
            .calendar
            .window()
            .ok_or(SettingsError::InvalidYear(settings.calendar.year))?;

        Ok(Self {
            offset,
            history_limit: settings.history.limit,
            page_size: settings.history.page_size,
            window,
        })
    }
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            window: CalendarWindow::for_year(DEFAULT_CALENDAR_YEAR).unwrap_or_default(),
        }
    }
}

/// Change counters, one per feed, used by live-push sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    pub live: u64,
    pub thresholds: u64,
    pub history: u64,
}

/// "Apply filter" command
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCommand {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Overrides the current sort selection when present
    pub sort: Option<SortOrder>,
}

/// Central application state
#[derive(Debug)]
pub struct AppState {
    offset: FixedOffset,
    history_limit: usize,
    window: CalendarWindow,

    /// Normalized history, replaced on every history push
    history: Vec<Reading>,
    availability: Availability,
    thresholds: Option<ThresholdMap>,
    live: Option<LiveReading>,

    /// `None` until the first successful filter
    working_set: Option<Vec<Reading>>,
    pager: Paginator,
    sort: SortOrder,
    selection: RangeSelection,

    feeds: FeedStatusBoard,
    revisions: Revisions,
    start_time: DateTime<Utc>,
    rejected_records: u64,
    connected_clients: Vec<String>,
}

impl AppState {
    /// Create new application state
    pub fn new(options: StateOptions) -> Self {
        info!(
            history_limit = options.history_limit,
            page_size = options.page_size,
            utc_offset_seconds = options.offset.local_minus_utc(),
            "Initializing application state"
        );
        Self {
            offset: options.offset,
            history_limit: options.history_limit,
            window: options.window,
            history: Vec::new(),
            availability: Availability::default(),
            thresholds: None,
            live: None,
            working_set: None,
            pager: Paginator::new(options.page_size),
            sort: SortOrder::default(),
            selection: RangeSelection::default(),
            feeds: FeedStatusBoard::default(),
            revisions: Revisions::default(),
            start_time: Utc::now(),
            rejected_records: 0,
            connected_clients: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Filter the history buffer into a new working set and go to page 1.
    ///
    /// On a validation error nothing is changed.
    pub fn apply_filter(&mut self, command: FilterCommand) -> Result<HistoryView, FilterError> {
        let range = DateRange::new(command.start, command.end).map_err(|e| {
            warn!(error = %e, "Rejected history filter");
            e
        })?;

        if let Some(sort) = command.sort {
            self.sort = sort;
        }

        let working = filter_and_sort(&self.history, &range, self.sort, &self.offset);
        info!(
            start = %range.start(),
            end = %range.end(),
            sort = ?self.sort,
            matched = working.len(),
            buffered = self.history.len(),
            "History filter applied"
        );

        self.working_set = Some(working);
        self.pager.reset();

        Ok(self.view())
    }

    /// Move to `page`; out-of-range requests leave the page unchanged.
    pub fn go_to_page(&mut self, page: usize) -> HistoryView {
        let len = self.working_len();
        if !self.pager.go_to(page, len) {
            debug!(
                page,
                total_pages = self.pager.total_pages(len),
                "Ignoring out-of-range page request"
            );
        }
        self.view()
    }

    /// Change the sort selection; it takes effect on the next filter.
    pub fn change_sort(&mut self, order: SortOrder) -> HistoryView {
        debug!(order = ?order, "Sort selection changed");
        self.sort = order;
        self.view()
    }

    /// Record a picker selection and tell the client which picker to redraw.
    pub fn select_date(&mut self, picker: Picker, date: Option<NaiveDate>) -> RedrawHint {
        self.selection.select(picker, date)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Current page view, classified against the current thresholds
    pub fn view(&self) -> HistoryView {
        render_history(
            self.working_set.as_deref(),
            &self.pager,
            self.sort,
            self.thresholds.as_ref(),
            &self.offset,
        )
    }

    pub fn live_view(&self) -> LiveView {
        render_live(self.live.as_ref(), self.thresholds.as_ref())
    }

    pub fn calendar_month(&self, picker: Picker, year: i32, month: u32) -> Option<Vec<DayMarking>> {
        mark_month(
            &self.window,
            &self.availability,
            &self.selection,
            picker,
            year,
            month,
        )
    }

    pub fn history(&self) -> &[Reading] {
        &self.history
    }

    pub fn thresholds(&self) -> Option<&ThresholdMap> {
        self.thresholds.as_ref()
    }

    pub fn live(&self) -> Option<&LiveReading> {
        self.live.as_ref()
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn window(&self) -> &CalendarWindow {
        &self.window
    }

    pub fn revisions(&self) -> Revisions {
        self.revisions
    }

    pub fn feed_reports(&self) -> Vec<FeedStatusReport> {
        self.feeds.reports()
    }

    pub fn rejected_records(&self) -> u64 {
        self.rejected_records
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }

    fn working_len(&self) -> usize {
        self.working_set.as_ref().map_or(0, Vec::len)
    }

    // ---------------------------------------------------------------------
    // Live-push clients
    // ---------------------------------------------------------------------

    /// Register a new WebSocket client
    pub fn add_client(&mut self, client_id: String) {
        info!(client_id = %client_id, "WebSocket client connected");
        self.connected_clients.push(client_id);
    }

    /// Remove a WebSocket client
    pub fn remove_client(&mut self, client_id: &str) {
        info!(client_id = %client_id, "WebSocket client disconnected");
        self.connected_clients.retain(|id| id != client_id);
    }

    /// Get count of connected clients
    pub fn client_count(&self) -> usize {
        self.connected_clients.len()
    }

    fn replace_history(&mut self, raw: &serde_json::Value) {
        let normalized = normalize_snapshot(raw, self.history_limit, &self.offset);

        self.rejected_records += normalized.rejected as u64;
        self.history = normalized.readings;
        self.availability = Availability::from_history(&self.history, &self.offset);
        self.revisions.history += 1;

        if self.history.is_empty() {
            warn!(rejected = normalized.rejected, "No valid history data found");
        } else {
            info!(
                records = self.history.len(),
                rejected = normalized.rejected,
                days_with_data = self.availability.len(),
                "History buffer replaced"
            );
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(StateOptions::default())
    }
}

impl FeedSubscriber for AppState {
    fn on_full_update(&mut self, update: FeedUpdate) {
        self.feeds.record_update(update.kind());

        match update {
            FeedUpdate::Thresholds(raw) => {
                self.thresholds = ThresholdMap::from_raw(&raw);
                self.revisions.thresholds += 1;
                match &self.thresholds {
                    Some(map) => info!(parameters = map.len(), "Thresholds replaced"),
                    None => error!("No thresholds found in the store"),
                }
            }
            FeedUpdate::Live(reading) => {
                debug!(
                    temperature = ?reading.temperature,
                    ph = ?reading.ph,
                    salinity = ?reading.salinity,
                    turbidity = ?reading.turbidity,
                    dissolved_oxygen = ?reading.dissolved_oxygen,
                    "Live snapshot replaced"
                );
                self.live = Some(reading);
                self.revisions.live += 1;
            }
            FeedUpdate::History(raw) => self.replace_history(&raw),
        }
    }

    fn on_feed_error(&mut self, feed: FeedKind, message: &str) {
        warn!(
            feed = ?feed,
            error = %message,
            "Feed subscription error; keeping previous state"
        );
        self.feeds.record_error(feed, message);
    }
}

impl FeedStatusSource for AppState {
    fn feed_status_mut(&mut self) -> &mut FeedStatusBoard {
        &mut self.feeds
    }
}
