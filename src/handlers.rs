//! HTTP request handlers
//!
//! Implements the REST API: feed push endpoints, the live snapshot, and the
//! history filter/page/sort commands with their view queries.

use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::{DayMarking, Picker};
use crate::error::AppError;
use crate::feeds::{FeedHub, FeedKind, FeedUpdate};
use crate::models::{HealthCheck, LiveReading};
use crate::state::AppState;
use crate::validation::{
    validate_live_reading, CalendarQuery, FilterRequest, SelectionRequest, SortRequest,
};
use crate::websocket::WsSession;

type SharedState = web::Data<Arc<RwLock<AppState>>>;

/// Configure all application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Health check
            .route("/health", web::get().to(health_check))
            // Feed pushes
            .route("/feeds/thresholds", web::post().to(push_thresholds))
            .route("/feeds/sensors", web::post().to(push_live_reading))
            .route("/feeds/history", web::post().to(push_history))
            // Live dashboard
            .route("/sensors/latest", web::get().to(get_live_view))
            .route("/thresholds", web::get().to(get_thresholds))
            // History commands and queries
            .route("/history/filter", web::post().to(apply_filter))
            .route("/history/page/{page}", web::post().to(go_to_page))
            .route("/history/sort", web::put().to(change_sort))
            .route("/history/view", web::get().to(get_history_view))
            .route("/history/selection", web::put().to(select_date))
            .route("/history/calendar", web::get().to(get_calendar_month)),
    )
    // WebSocket endpoint
    .route("/ws", web::get().to(websocket_handler));
}

/// Health check endpoint
///
/// GET /api/health
///
/// Reports `degraded` while any feed has not delivered yet.
pub async fn health_check(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    let feeds = state.feed_reports();
    let status = if feeds.iter().all(|f| f.connected) {
        "healthy"
    } else {
        "degraded"
    };

    let health = HealthCheck {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        history_records: state.history().len(),
        rejected_records: state.rejected_records(),
        connected_clients: state.client_count(),
        feeds,
    };

    Ok(HttpResponse::Ok().json(health))
}

#[derive(Serialize)]
struct AcceptedResponse {
    accepted: bool,
    feed: FeedKind,
    correlation_id: String,
}

async fn enqueue(
    hub: &FeedHub,
    update: FeedUpdate,
    req: &HttpRequest,
) -> Result<HttpResponse, AppError> {
    let correlation_id = extract_correlation_id(req);
    let feed = update.kind();

    hub.publish(update).await?;

    info!(
        correlation_id = %correlation_id,
        feed = ?feed,
        "Feed snapshot accepted"
    );

    Ok(HttpResponse::Accepted().json(AcceptedResponse {
        accepted: true,
        feed,
        correlation_id,
    }))
}

/// Replace the threshold map
///
/// POST /api/feeds/thresholds
pub async fn push_thresholds(
    hub: web::Data<FeedHub>,
    body: web::Json<Value>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    enqueue(&hub, FeedUpdate::Thresholds(body.into_inner()), &req).await
}

/// Replace the live sensor snapshot
///
/// POST /api/feeds/sensors
pub async fn push_live_reading(
    hub: web::Data<FeedHub>,
    body: web::Json<LiveReading>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    validate_live_reading(&body)?;
    enqueue(&hub, FeedUpdate::Live(body.into_inner()), &req).await
}

/// Replace the raw history snapshot
///
/// POST /api/feeds/history
pub async fn push_history(
    hub: web::Data<FeedHub>,
    body: web::Json<Value>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    enqueue(&hub, FeedUpdate::History(body.into_inner()), &req).await
}

/// Live snapshot with per-parameter severity
///
/// GET /api/sensors/latest
///
/// Before the first snapshot every cell carries the placeholder.
pub async fn get_live_view(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    Ok(HttpResponse::Ok().json(state.live_view()))
}

/// GET /api/thresholds
pub async fn get_thresholds(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;

    match state.thresholds() {
        Some(thresholds) => Ok(HttpResponse::Ok().json(thresholds)),
        None => Err(AppError::NotFound("No thresholds configured".to_string())),
    }
}

/// Apply a date-range filter
///
/// POST /api/history/filter
pub async fn apply_filter(
    state: SharedState,
    body: web::Json<FilterRequest>,
) -> Result<HttpResponse, AppError> {
    let command = body.into_inner().into_command()?;

    let mut state = state.write().await;
    let view = state.apply_filter(command)?;

    Ok(HttpResponse::Ok().json(view))
}

/// Go to a page of the working set
///
/// POST /api/history/page/{page}
pub async fn go_to_page(
    state: SharedState,
    path: web::Path<usize>,
) -> Result<HttpResponse, AppError> {
    let page = path.into_inner();
    let mut state = state.write().await;
    Ok(HttpResponse::Ok().json(state.go_to_page(page)))
}

/// Change the sort selection; applied on the next filter
///
/// PUT /api/history/sort
pub async fn change_sort(
    state: SharedState,
    body: web::Json<SortRequest>,
) -> Result<HttpResponse, AppError> {
    let mut state = state.write().await;
    Ok(HttpResponse::Ok().json(state.change_sort(body.sort)))
}

/// GET /api/history/view
pub async fn get_history_view(state: SharedState) -> Result<HttpResponse, AppError> {
    let state = state.read().await;
    Ok(HttpResponse::Ok().json(state.view()))
}

/// Record a picker selection
///
/// PUT /api/history/selection
pub async fn select_date(
    state: SharedState,
    body: web::Json<SelectionRequest>,
) -> Result<HttpResponse, AppError> {
    let date = body.parsed_date()?;
    debug!(picker = ?body.picker, date = ?date, "Picker selection");

    let mut state = state.write().await;
    Ok(HttpResponse::Ok().json(state.select_date(body.picker, date)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarMonth {
    year: i32,
    month: u32,
    picker: Picker,
    min_date: chrono::NaiveDate,
    max_date: chrono::NaiveDate,
    days: Vec<DayMarking>,
}

/// Day markings for one picker month
///
/// GET /api/history/calendar?year=2026&month=1&picker=start
pub async fn get_calendar_month(
    state: SharedState,
    query: web::Query<CalendarQuery>,
) -> Result<HttpResponse, AppError> {
    query.check()?;

    let state = state.read().await;
    let days = state
        .calendar_month(query.picker, query.year, query.month)
        .ok_or_else(|| {
            AppError::BadRequest(format!("Invalid month {}-{}", query.year, query.month))
        })?;

    Ok(HttpResponse::Ok().json(CalendarMonth {
        year: query.year,
        month: query.month,
        picker: query.picker,
        min_date: state.window().min_date(),
        max_date: state.window().max_date(),
        days,
    }))
}

/// WebSocket upgrade handler
///
/// GET /ws
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: SharedState,
) -> Result<HttpResponse, actix_web::Error> {
    let client_id = Uuid::new_v4().to_string();

    info!(client_id = %client_id, "WebSocket connection request");

    // Register client
    {
        let mut state = state.write().await;
        state.add_client(client_id.clone());
    }

    let ws_session = WsSession::new(client_id, state.get_ref().clone());

    actix_web_actors::ws::start(ws_session, &req, stream)
}

/// Extract or generate correlation ID from request headers
fn extract_correlation_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Correlation-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
