//! End to end WebSocket feed over a real socket.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, StaticOrigin};
use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use stock_feed::{InMemoryPriceStore, PricePoint, PriceStore, Ticker, router};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn serve(harness: &Harness) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(harness.app_state());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("ws://{addr}/stocks-feed")
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn joined_client_receives_price_updates() {
    let store = Arc::new(InMemoryPriceStore::new());
    store
        .append(&PricePoint::new(Ticker::new("ABC"), dec!(101.23)))
        .await
        .unwrap();
    let harness = Harness::new(store, Arc::new(StaticOrigin::default()));
    harness.resolver.resolve(&Ticker::new("ABC")).await.unwrap();
    let url = serve(&harness).await;

    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
    socket
        .send(Message::text(json!({ "type": "join", "ticker": "abc" }).to_string()))
        .await
        .unwrap();
    assert_eq!(
        next_json(&mut socket).await,
        json!({ "type": "joined", "ticker": "ABC" })
    );

    let report = harness.scheduler.tick().await;
    assert_eq!(report.published, 1);

    assert_eq!(
        next_json(&mut socket).await,
        json!({ "type": "price_update", "ticker": "ABC", "price": "101.23" })
    );
}

#[tokio::test]
async fn invalid_join_gets_error_frame_and_socket_stays_open() {
    let harness = Harness::new(
        Arc::new(InMemoryPriceStore::new()),
        Arc::new(StaticOrigin::default()),
    );
    let url = serve(&harness).await;

    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
    socket.send(Message::text("{\"type\":\"join\"}")).await.unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "error");

    socket
        .send(Message::text(json!({ "type": "join", "ticker": "XYZ" }).to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "joined");
}

#[tokio::test]
async fn closing_socket_leaves_groups() {
    let harness = Harness::new(
        Arc::new(InMemoryPriceStore::new()),
        Arc::new(StaticOrigin::default()),
    );
    let url = serve(&harness).await;

    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
    socket
        .send(Message::text(json!({ "type": "join", "ticker": "ABC" }).to_string()))
        .await
        .unwrap();
    next_json(&mut socket).await;
    assert_eq!(harness.broadcast.stats().connections, 1);

    socket.close(None).await.unwrap();

    timeout(Duration::from_secs(2), async {
        loop {
            let stats = harness.broadcast.stats();
            if stats.connections == 0 && stats.memberships == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
