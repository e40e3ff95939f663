//! WebSocket subscriber tests. Connect to /ws and /ws/hub and assert what the relay publishes.

use futures_util::{SinkExt, StreamExt};
use price_relay::api::{self, AppState};
use price_relay::{BroadcastSink, MarketData, PriceSink, RelayStats, XAxis};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_app(x_axis: XAxis) -> (SocketAddr, BroadcastSink, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = BroadcastSink::new(16);
    let app = api::create_router(AppState::new(sink.clone(), RelayStats::new(), x_axis));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, sink, handle)
}

/// Waits until the sink counts `n` subscribers.
async fn wait_for_subscribers(sink: &BroadcastSink, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while sink.subscriber_count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscriber registered");
}

#[derive(serde::Deserialize)]
struct ConnectionMessage {
    #[serde(rename = "type")]
    msg_type: String,
    message: String,
    timestamp: u64,
}

#[derive(serde::Deserialize)]
struct PriceUpdate {
    #[serde(rename = "type")]
    msg_type: String,
    x: i64,
    y: i64,
}

#[derive(serde::Deserialize)]
struct HubEvent {
    event: String,
    data: MarketData,
}

async fn next_text<S>(ws: &mut S) -> String
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let raw = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("message in time")
        .expect("one message")
        .expect("ws recv");
    raw.into_text().expect("text frame")
}

#[tokio::test]
async fn ws_sends_connection_message_on_connect() {
    let (addr, _sink, _handle) = spawn_app(XAxis::Time).await;
    let url = format!("ws://{}/ws", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("connect");
    let hello: ConnectionMessage = serde_json::from_str(&next_text(&mut ws).await).expect("json");
    assert_eq!(hello.msg_type, "connection");
    assert!(!hello.message.is_empty());
    assert!(hello.timestamp > 0);
}

#[tokio::test]
async fn ws_forwards_published_prices_in_order() {
    let (addr, sink, _handle) = spawn_app(XAxis::Time).await;
    let url = format!("ws://{}/ws", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("connect");
    let _hello = next_text(&mut ws).await;
    wait_for_subscribers(&sink, 1).await;

    sink.publish(MarketData { time: 1000, price: 1001 });
    sink.publish(MarketData { time: 2000, price: 1011 });

    let a: PriceUpdate = serde_json::from_str(&next_text(&mut ws).await).expect("json");
    let b: PriceUpdate = serde_json::from_str(&next_text(&mut ws).await).expect("json");
    assert_eq!(a.msg_type, "price_update");
    assert_eq!((a.x, a.y), (1000, 1001));
    assert_eq!((b.x, b.y), (2000, 1011));
}

#[tokio::test]
async fn ws_sequence_axis_counts_from_zero() {
    let (addr, sink, _handle) = spawn_app(XAxis::Sequence).await;
    let url = format!("ws://{}/ws", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("connect");
    let _hello = next_text(&mut ws).await;
    wait_for_subscribers(&sink, 1).await;

    for price in [7, 8, 9] {
        sink.publish(MarketData { time: 123, price });
    }
    for (i, price) in [7, 8, 9].into_iter().enumerate() {
        let u: PriceUpdate = serde_json::from_str(&next_text(&mut ws).await).expect("json");
        assert_eq!((u.x, u.y), (i as i64, price));
    }
}

#[tokio::test]
async fn hub_broadcasts_receive_new_data_to_every_subscriber() {
    let (addr, sink, _handle) = spawn_app(XAxis::Time).await;
    let url = format!("ws://{}/ws/hub", addr);
    let (mut first, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");
    let (mut second, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");
    wait_for_subscribers(&sink, 2).await;

    sink.publish(MarketData { time: 5, price: 50 });
    for ws in [&mut first, &mut second] {
        let ev: HubEvent = serde_json::from_str(&next_text(ws).await).expect("json");
        assert_eq!(ev.event, "ReceiveNewData");
        assert_eq!(ev.data, MarketData { time: 5, price: 50 });
    }
}

#[tokio::test]
async fn closing_client_releases_its_subscription() {
    let (addr, sink, _handle) = spawn_app(XAxis::Time).await;
    let url = format!("ws://{}/ws/hub", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");
    wait_for_subscribers(&sink, 1).await;

    ws.send(Message::Text("ignored".into())).await.unwrap();
    ws.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while sink.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription dropped after close");
}

#[tokio::test]
async fn oversized_client_frame_ends_the_session() {
    let (addr, sink, _handle) = spawn_app(XAxis::Time).await;
    let url = format!("ws://{}/ws", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");
    let _hello = next_text(&mut ws).await;
    wait_for_subscribers(&sink, 1).await;

    // Small frames are fine.
    ws.send(Message::Text("x".repeat(512))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.subscriber_count(), 1);

    let _ = ws.send(Message::Text("x".repeat(4096))).await;
    tokio::time::timeout(Duration::from_secs(2), async {
        while sink.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("oversized frame drops the subscriber");
}
