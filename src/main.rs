//! Water Quality Monitoring System (WQMS)
//!
//! Dashboard backend for pond sensors: subscribes to the threshold, live
//! and history feeds, classifies readings against the configured bands, and
//! serves the filterable, paginated history table.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod calendar;
mod classifier;
mod config;
mod error;
mod fake_feed;
mod feeds;
mod filter;
mod handlers;
mod models;
mod normalizer;
mod paginator;
mod state;
mod validation;
mod view;
mod websocket;

use crate::config::Settings;
use crate::fake_feed::SimulatedStore;
use crate::feeds::{run_dispatcher, watch_startup, FeedHub};
use crate::state::{AppState, StateOptions};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenv::dotenv().ok();

    // Logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wqms=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();

    // Load configuration
    let settings = Settings::from_env().context("Failed to load configuration")?;
    let options = StateOptions::from_settings(&settings).context("Invalid configuration")?;
    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);

    info!("Starting WQMS backend");
    info!("Binding server to {}", bind_address);

    // Shared application state
    let app_state = Arc::new(RwLock::new(AppState::new(options)));

    // ---------------------------------------------------------------------
    // Feed ports: one dispatcher applies every snapshot in arrival order
    // ---------------------------------------------------------------------
    let (hub, rx) = FeedHub::channel(settings.feeds.channel_capacity);

    actix_rt::spawn(run_dispatcher(rx, app_state.clone()));
    actix_rt::spawn(watch_startup(
        app_state.clone(),
        Duration::from_millis(settings.feeds.startup_timeout_ms),
    ));

    if settings.simulator.enabled {
        let store = SimulatedStore::new(settings.simulator.interval_ms, settings.history.limit);
        let store_hub = hub.clone();

        actix_rt::spawn(async move {
            if let Err(e) = store.run(store_hub).await {
                error!(error = %e, "Simulated store stopped");
            }
        });
    } else {
        info!("Simulator disabled; waiting for pushes on /api/feeds");
    }

    // ---------------------------------------------------------------------
    // HTTP + WebSocket server
    // ---------------------------------------------------------------------
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(hub.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure_routes)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")
}
