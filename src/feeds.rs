//! Feed subscription ports
//!
//! The threshold store, the live sensor feed and the history feed each push
//! full replacement snapshots. Producers (the simulator, the HTTP push
//! endpoints) publish into a [`FeedHub`]; a single dispatcher task hands
//! every event, in arrival order, to a [`FeedSubscriber`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};
use crate::models::LiveReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Thresholds,
    Live,
    History,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::Thresholds, FeedKind::Live, FeedKind::History];
}

/// A full replacement snapshot from one feed
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    /// Raw threshold map, `Null` when nothing is configured
    Thresholds(Value),
    Live(LiveReading),
    /// Raw history records, array or object keyed by child id
    History(Value),
}

impl FeedUpdate {
    pub fn kind(&self) -> FeedKind {
        match self {
            FeedUpdate::Thresholds(_) => FeedKind::Thresholds,
            FeedUpdate::Live(_) => FeedKind::Live,
            FeedUpdate::History(_) => FeedKind::History,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FeedEvent {
    Update(FeedUpdate),
    Error { feed: FeedKind, message: String },
}

/// Receiver side of the feed ports
pub trait FeedSubscriber {
    /// Replace the state owned for `update.kind()` wholesale.
    fn on_full_update(&mut self, update: FeedUpdate);

    /// A subscription failed; previously delivered state stays in place.
    fn on_feed_error(&mut self, feed: FeedKind, message: &str);
}

/// Publishing handle shared by all feed producers
#[derive(Debug, Clone)]
pub struct FeedHub {
    tx: mpsc::Sender<FeedEvent>,
}

impl FeedHub {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn publish(&self, update: FeedUpdate) -> AppResult<()> {
        let kind = update.kind();
        self.send(FeedEvent::Update(update), kind).await
    }

    pub async fn report_error(&self, feed: FeedKind, message: impl Into<String>) -> AppResult<()> {
        let event = FeedEvent::Error {
            feed,
            message: message.into(),
        };
        self.send(event, feed).await
    }

    async fn send(&self, event: FeedEvent, feed: FeedKind) -> AppResult<()> {
        self.tx.send(event).await.map_err(|_| {
            AppError::FeedUnavailable(format!("{feed:?} feed dispatcher is not running"))
        })
    }
}

/// Deliver feed events to `subscriber` until every [`FeedHub`] is dropped.
pub async fn run_dispatcher<S>(mut rx: mpsc::Receiver<FeedEvent>, subscriber: Arc<RwLock<S>>)
where
    S: FeedSubscriber,
{
    info!("Feed dispatcher started");

    while let Some(event) = rx.recv().await {
        let mut subscriber = subscriber.write().await;
        match event {
            FeedEvent::Update(update) => {
                debug!(feed = ?update.kind(), "Dispatching feed snapshot");
                subscriber.on_full_update(update);
            }
            FeedEvent::Error { feed, message } => {
                subscriber.on_feed_error(feed, &message);
            }
        }
    }

    info!("Feed dispatcher stopped: all publishers dropped");
}

/// Per-feed delivery bookkeeping
#[derive(Debug, Clone, Default)]
struct FeedStatus {
    updates: u64,
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
    unavailable_reported: bool,
}

/// Health-check view of one feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatusReport {
    pub feed: FeedKind,
    pub connected: bool,
    pub updates: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedStatusBoard {
    thresholds: FeedStatus,
    live: FeedStatus,
    history: FeedStatus,
}

impl FeedStatusBoard {
    fn status(&self, feed: FeedKind) -> &FeedStatus {
        match feed {
            FeedKind::Thresholds => &self.thresholds,
            FeedKind::Live => &self.live,
            FeedKind::History => &self.history,
        }
    }

    fn status_mut(&mut self, feed: FeedKind) -> &mut FeedStatus {
        match feed {
            FeedKind::Thresholds => &mut self.thresholds,
            FeedKind::Live => &mut self.live,
            FeedKind::History => &mut self.history,
        }
    }

    pub fn record_update(&mut self, feed: FeedKind) {
        let status = self.status_mut(feed);
        status.updates += 1;
        status.last_update = Some(Utc::now());
    }

    pub fn record_error(&mut self, feed: FeedKind, message: &str) {
        self.status_mut(feed).last_error = Some(message.to_string());
    }

    pub fn has_delivered(&self, feed: FeedKind) -> bool {
        self.status(feed).updates > 0
    }

    /// Feeds that never delivered and have not been reported yet.
    ///
    /// Each feed is returned at most once over the board's lifetime.
    pub fn take_unreported_silent(&mut self) -> Vec<FeedKind> {
        FeedKind::ALL
            .into_iter()
            .filter(|feed| {
                if self.has_delivered(*feed) {
                    return false;
                }
                let status = self.status_mut(*feed);
                if status.unavailable_reported {
                    return false;
                }
                status.unavailable_reported = true;
                true
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<FeedStatusReport> {
        FeedKind::ALL
            .into_iter()
            .map(|feed| {
                let status = self.status(feed);
                FeedStatusReport {
                    feed,
                    connected: self.has_delivered(feed),
                    updates: status.updates,
                    last_update: status.last_update,
                    last_error: status.last_error.clone(),
                }
            })
            .collect()
    }
}

/// Access to the status board for the startup watchdog
pub trait FeedStatusSource {
    fn feed_status_mut(&mut self) -> &mut FeedStatusBoard;
}

/// After `grace`, report every feed that has not delivered yet (once).
pub async fn watch_startup<S>(state: Arc<RwLock<S>>, grace: Duration)
where
    S: FeedStatusSource,
{
    tokio::time::sleep(grace).await;

    let silent = state.write().await.feed_status_mut().take_unreported_silent();
    for feed in silent {
        error!(
            feed = ?feed,
            grace_ms = grace.as_millis() as u64,
            "Feed subscription never delivered; dependent views will show placeholders"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<FeedKind>,
        errors: Vec<(FeedKind, String)>,
        board: FeedStatusBoard,
    }

    impl FeedSubscriber for Recorder {
        fn on_full_update(&mut self, update: FeedUpdate) {
            self.board.record_update(update.kind());
            self.updates.push(update.kind());
        }

        fn on_feed_error(&mut self, feed: FeedKind, message: &str) {
            self.errors.push((feed, message.to_string()));
        }
    }

    impl FeedStatusSource for Recorder {
        fn feed_status_mut(&mut self) -> &mut FeedStatusBoard {
            &mut self.board
        }
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_in_order() {
        let recorder = Arc::new(RwLock::new(Recorder::default()));
        let (hub, rx) = FeedHub::channel(8);
        let handle = tokio::spawn(run_dispatcher(rx, recorder.clone()));

        hub.publish(FeedUpdate::Thresholds(json!({}))).await.unwrap();
        hub.publish(FeedUpdate::History(json!([]))).await.unwrap();
        hub.report_error(FeedKind::Live, "permission denied").await.unwrap();
        hub.publish(FeedUpdate::Live(LiveReading::default())).await.unwrap();

        drop(hub);
        handle.await.unwrap();

        let recorder = recorder.read().await;
        assert_eq!(
            recorder.updates,
            vec![FeedKind::Thresholds, FeedKind::History, FeedKind::Live]
        );
        assert_eq!(
            recorder.errors,
            vec![(FeedKind::Live, "permission denied".to_string())]
        );
    }

    #[tokio::test]
    async fn test_publish_without_dispatcher_fails() {
        let (hub, rx) = FeedHub::channel(1);
        drop(rx);

        let result = hub.publish(FeedUpdate::History(Value::Null)).await;
        assert!(matches!(result, Err(AppError::FeedUnavailable(_))));
    }

    #[test]
    fn test_silent_feeds_reported_once() {
        let mut board = FeedStatusBoard::default();
        board.record_update(FeedKind::Live);

        assert_eq!(
            board.take_unreported_silent(),
            vec![FeedKind::Thresholds, FeedKind::History]
        );
        assert!(board.take_unreported_silent().is_empty());
        assert!(board.has_delivered(FeedKind::Live));
    }

    #[test]
    fn test_reports() {
        let mut board = FeedStatusBoard::default();
        board.record_update(FeedKind::History);
        board.record_error(FeedKind::Thresholds, "timeout");

        let reports = board.reports();
        assert_eq!(reports.len(), 3);
        assert!(!reports[0].connected);
        assert_eq!(reports[0].last_error.as_deref(), Some("timeout"));
        assert!(reports[2].connected);
        for report in &reports {
            assert_eq!(report.connected, board.has_delivered(report.feed));
        }
        assert_eq!(reports[2].updates, 1);
    }

    #[tokio::test]
    async fn test_watchdog_marks_silent_feeds() {
        let recorder = Arc::new(RwLock::new(Recorder::default()));
        recorder.write().await.board.record_update(FeedKind::History);

        watch_startup(recorder.clone(), Duration::from_millis(10)).await;

        let mut recorder = recorder.write().await;
        assert!(recorder.board.take_unreported_silent().is_empty());
    }
}
