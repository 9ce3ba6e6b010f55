//! WebSocket module for live dashboard pushes
//!
//! Each session polls the state's revision counters and forwards whatever
//! changed since its last poll: the live snapshot, the threshold map, or a
//! notice that the history buffer was replaced.

use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{LiveReading, ThresholdMap, WsMessage};
use crate::state::{AppState, Revisions};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the state revisions are polled
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// State captured by one poll
struct PollSnapshot {
    revisions: Revisions,
    live: Option<LiveReading>,
    thresholds: Option<ThresholdMap>,
    history_records: usize,
}

/// WebSocket session actor
pub struct WsSession {
    client_id: String,
    last_heartbeat: Instant,
    state: Arc<RwLock<AppState>>,
    last_seen: Revisions,
}

impl WsSession {
    pub fn new(client_id: String, state: Arc<RwLock<AppState>>) -> Self {
        Self {
            client_id,
            last_heartbeat: Instant::now(),
            state,
            last_seen: Revisions::default(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    client_id = %act.client_id,
                    "WebSocket heartbeat timeout"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn start_state_polling(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(POLL_INTERVAL, |act, ctx| {
            let state = act.state.clone();

            let fut = async move {
                let state = state.read().await;
                PollSnapshot {
                    revisions: state.revisions(),
                    live: state.live().cloned(),
                    thresholds: state.thresholds().cloned(),
                    history_records: state.history().len(),
                }
            };

            let fut = actix::fut::wrap_future::<_, Self>(fut);

            ctx.spawn(fut.map(|snapshot, act, ctx| {
                for msg in act.changes(snapshot) {
                    send(ctx, &msg);
                }
            }));
        });
    }

    /// Messages for everything that changed since the previous poll
    fn changes(&mut self, snapshot: PollSnapshot) -> Vec<WsMessage> {
        let mut messages = Vec::new();
        let seen = self.last_seen;

        if snapshot.revisions.thresholds != seen.thresholds {
            messages.push(WsMessage::ThresholdsUpdate(snapshot.thresholds));
        }
        if snapshot.revisions.live != seen.live {
            if let Some(live) = snapshot.live {
                messages.push(WsMessage::LiveUpdate(live));
            }
        }
        if snapshot.revisions.history != seen.history {
            messages.push(WsMessage::HistoryChanged {
                records: snapshot.history_records,
            });
        }

        if !messages.is_empty() {
            debug!(
                client_id = %self.client_id,
                messages = messages.len(),
                "Pushing state changes"
            );
        }

        self.last_seen = snapshot.revisions;
        messages
    }
}

fn send(ctx: &mut ws::WebsocketContext<WsSession>, msg: &WsMessage) {
    if let Ok(json) = serde_json::to_string(msg) {
        ctx.text(json);
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(client_id = %self.client_id, "WebSocket connected");

        self.start_heartbeat(ctx);
        self.start_state_polling(ctx);

        send(
            ctx,
            &WsMessage::Connected {
                client_id: self.client_id.clone(),
            },
        );
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        info!(client_id = %self.client_id, "WebSocket disconnected");

        let state = self.state.clone();
        let client_id = self.client_id.clone();

        actix_rt::spawn(async move {
            let mut state = state.write().await;
            state.remove_client(&client_id);
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                debug!(client_id = %self.client_id, message = %text);

                match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Ping) => {
                        self.last_heartbeat = Instant::now();
                        send(ctx, &WsMessage::Pong);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(client_id = %self.client_id, error = %e);
                        send(
                            ctx,
                            &WsMessage::Error {
                                message: "Invalid message format".into(),
                            },
                        );
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                info!(client_id = %self.client_id, reason = ?reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e);
                ctx.stop();
            }
            _ => {}
        }
    }
}
