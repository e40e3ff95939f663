//! HTTP and WebSocket surface for dashboards.
//!
//! Used by the binary and by integration tests. Create with [`create_router`].
//! Uses Extension for state so the router is `Router<()>` and works with `into_make_service()`.
//!
//! Routes:
//! - `GET /health`: liveness
//! - `GET /stats`: relay counters and subscriber count
//! - `GET /ws`: dashboard feed, `{"type":"price_update","x":..,"y":..,"timestamp":..}`
//! - `GET /ws/hub`: event feed, `{"event":"ReceiveNewData","data":{"time":..,"price":..}}`

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, info};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::XAxis;
use crate::sink::{BroadcastSink, RECEIVE_NEW_DATA};
use crate::stats::{RelayStats, StatsSnapshot};
use crate::types::MarketData;

/// Shared app state: the broadcast topic the relay publishes to, plus its counters.
#[derive(Clone)]
pub struct AppState {
    pub(crate) sink: BroadcastSink,
    pub(crate) stats: RelayStats,
    pub(crate) x_axis: XAxis,
}

impl AppState {
    pub fn new(sink: BroadcastSink, stats: RelayStats, x_axis: XAxis) -> Self {
        Self {
            sink,
            stats,
            x_axis,
        }
    }
}

/// Builds the router with state. Returns `Router<()>` so you can call `.into_make_service()` for `axum::serve`.
pub fn create_router(state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/ws", get(dashboard_ws))
        .route("/ws/hub", get(hub_ws))
        .layer(Extension(state))
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn stats(Extension(state): Extension<AppState>) -> Response {
    #[derive(serde::Serialize)]
    struct Out {
        relay: StatsSnapshot,
        subscribers: usize,
    }
    (
        StatusCode::OK,
        Json(Out {
            relay: state.stats.snapshot(),
            subscribers: state.sink.subscriber_count(),
        }),
    )
        .into_response()
}

#[derive(serde::Serialize)]
struct ConnectionMessage {
    #[serde(rename = "type")]
    msg_type: &'static str,
    message: &'static str,
    timestamp: u64,
}

#[derive(serde::Serialize)]
struct PriceUpdate {
    #[serde(rename = "type")]
    msg_type: &'static str,
    x: i64,
    y: i64,
    timestamp: u64,
}

#[derive(serde::Serialize)]
struct HubEvent {
    event: &'static str,
    data: MarketData,
}

/// How a subscriber session renders each price point.
enum Feed {
    Dashboard { x_axis: XAxis, next_index: i64 },
    Hub,
}

impl Feed {
    fn render(&mut self, data: MarketData) -> serde_json::Result<String> {
        match self {
            Feed::Dashboard { x_axis, next_index } => {
                let x = match x_axis {
                    XAxis::Time => data.time,
                    XAxis::Sequence => {
                        let x = *next_index;
                        *next_index += 1;
                        x
                    }
                };
                serde_json::to_string(&PriceUpdate {
                    msg_type: "price_update",
                    x,
                    y: data.price,
                    timestamp: unix_secs(),
                })
            }
            Feed::Hub => serde_json::to_string(&HubEvent {
                event: RECEIVE_NEW_DATA,
                data,
            }),
        }
    }
}

/// Largest frame accepted from a subscriber. Client frames are never interpreted.
const MAX_CLIENT_MESSAGE: usize = 512;

async fn dashboard_ws(ws: WebSocketUpgrade, Extension(state): Extension<AppState>) -> Response {
    let rx = state.sink.subscribe();
    let feed = Feed::Dashboard {
        x_axis: state.x_axis,
        next_index: 0,
    };
    ws.max_message_size(MAX_CLIENT_MESSAGE)
        .max_frame_size(MAX_CLIENT_MESSAGE)
        .on_upgrade(move |socket| serve_subscriber(socket, rx, feed))
}

async fn hub_ws(ws: WebSocketUpgrade, Extension(state): Extension<AppState>) -> Response {
    let rx = state.sink.subscribe();
    ws.max_message_size(MAX_CLIENT_MESSAGE)
        .max_frame_size(MAX_CLIENT_MESSAGE)
        .on_upgrade(move |socket| serve_subscriber(socket, rx, Feed::Hub))
}

/// One subscriber session: forward every broadcast price point until either side goes away.
/// Incoming text/binary frames are ignored; an oversized one ends the session.
async fn serve_subscriber(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<MarketData>,
    mut feed: Feed,
) {
    info!("subscriber connected");
    if let Feed::Dashboard { .. } = feed {
        let hello = ConnectionMessage {
            msg_type: "connection",
            message: "Connected to price relay",
            timestamp: unix_secs(),
        };
        let sent = match serde_json::to_string(&hello) {
            Ok(text) => socket.send(Message::Text(text)).await,
            Err(_) => Ok(()),
        };
        if sent.is_err() {
            info!("subscriber disconnected");
            return;
        }
    }

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(data) => {
                    let text = match feed.render(data) {
                        Ok(t) => t,
                        Err(_) => continue,
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("subscriber lagging, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!("subscriber disconnected");
}
