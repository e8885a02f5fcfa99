//! Connection layer: reconnection, fan-out, and engine snapshot delivery.

mod support;

use std::sync::Arc;
use std::time::Duration;

use edgewire::detector::DetectorConfig;
use edgewire::engine::{DetectionEngine, EngineConfig};
use edgewire::error::Error;
use edgewire::feed::{channel_sink, ConnectionState, FeedManager, ReconnectConfig, SourceHandler};
use serde_json::{json, Value};
use support::{scripted_factory, Script};

fn fast_config() -> ReconnectConfig {
    ReconnectConfig {
        base_delay_ms: 1,
        max_delay_ms: 5,
        max_attempts: 5,
        broadcast_queue_size: 64,
    }
}

fn passthrough() -> Arc<dyn SourceHandler> {
    Arc::new(|_source: &str, message: &Value| Some(message.clone()))
}

#[tokio::test]
async fn broadcast_preserves_enqueue_order_per_source() {
    let manager = FeedManager::new(fast_config());
    manager.start();

    let (sink, mut rx) = channel_sink(16);
    manager.add_client(Arc::new(sink));

    let script = Script::new();
    for seq in 0..5 {
        script.push_json(&format!(r#"{{"seq": {seq}}}"#));
    }
    manager.register_source_with(
        "polymarket",
        "wss://example/ws",
        passthrough(),
        scripted_factory(script),
    );

    for expected in 0..5 {
        let message = rx.recv().await.unwrap();
        assert_eq!(message["data"]["seq"], expected);
        assert_eq!(message["source"], "polymarket");
    }

    manager.shutdown().await;
}

#[tokio::test]
async fn late_client_reregistration_resumes_delivery() {
    let manager = FeedManager::new(fast_config());
    manager.start();

    let (first_sink, first_rx) = channel_sink(4);
    let first_id = manager.add_client(Arc::new(first_sink));

    // The first client goes away; its sink starts failing.
    drop(first_rx);
    manager.broadcast("engine", json!({"tick": 1}));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.client_count(), 0);

    // A reconnecting client re-registers rather than being retried.
    let (second_sink, mut second_rx) = channel_sink(4);
    let second_id = manager.add_client(Arc::new(second_sink));
    assert_ne!(first_id, second_id);

    manager.broadcast("engine", json!({"tick": 2}));
    let message = second_rx.recv().await.unwrap();
    assert_eq!(message["data"]["tick"], 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn source_status_reports_backoff_progress() {
    let manager = FeedManager::new(ReconnectConfig {
        base_delay_ms: 200,
        max_delay_ms: 200,
        max_attempts: 5,
        broadcast_queue_size: 16,
    });
    manager.start();

    let script = Script::new();
    script.push_connect(Err(Error::Connection("refused".into())));
    script.push_connect(Err(Error::Connection("refused".into())));
    manager.register_source_with(
        "limitless",
        "wss://example/ws",
        passthrough(),
        scripted_factory(script),
    );

    // Caught mid-backoff: some attempts recorded, error text retained.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = manager
        .status()
        .into_iter()
        .find(|s| s.name == "limitless")
        .unwrap();
    assert_eq!(status.state, ConnectionState::Reconnecting);
    assert!(status.reconnect_attempts >= 1);
    assert_eq!(status.error.as_deref(), Some("connection error: refused"));
    assert_eq!(status.endpoint, "wss://example/ws");

    manager.shutdown().await;
}

#[tokio::test]
async fn engine_snapshots_flow_through_the_feed() {
    use edgewire::domain::{MarketId, Venue};
    use rust_decimal_macros::dec;

    let manager = Arc::new(FeedManager::new(fast_config()));
    manager.start();

    let (sink, mut rx) = channel_sink(16);
    manager.add_client(Arc::new(sink));

    let engine = Arc::new(DetectionEngine::new(
        EngineConfig {
            scan_interval_ms: 10,
            ..EngineConfig::default()
        },
        DetectorConfig::default(),
    ));
    engine.cache().update_price(
        Venue::Polymarket,
        MarketId::new("m1"),
        "Test?",
        dec!(40),
        dec!(50),
        dec!(2000),
    );

    let handle = engine.clone().spawn(manager.clone());

    let message = rx.recv().await.unwrap();
    assert_eq!(message["source"], "engine");
    assert_eq!(message["data"]["type"], "arbitrage_update");
    let opportunities = message["data"]["data"]["opportunities"].as_array().unwrap();
    assert_eq!(opportunities.len(), 1);
    assert_eq!(opportunities[0]["key"], "single_market:m1");

    handle.stop().await;
    manager.shutdown().await;
}

#[tokio::test]
async fn removing_a_source_stops_its_deliveries() {
    let manager = FeedManager::new(fast_config());
    manager.start();

    let (sink, mut rx) = channel_sink(16);
    manager.add_client(Arc::new(sink));

    let script = Script::new();
    script.push_json(r#"{"seq": 1}"#);
    manager.register_source_with(
        "polymarket",
        "wss://example/ws",
        passthrough(),
        scripted_factory(script.clone()),
    );

    let first = rx.recv().await.unwrap();
    assert_eq!(first["data"]["seq"], 1);

    manager.remove_source("polymarket");
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Messages pushed after removal never arrive.
    script.push_json(r#"{"seq": 2}"#);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(rx.try_recv().is_err());

    manager.shutdown().await;
}
