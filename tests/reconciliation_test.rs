//! End-to-end reconciliation tests.
//!
//! Drives the engine through its real channels with realistic venue
//! payloads and asserts on registry state and emitted lifecycle
//! notifications.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use async_trait::async_trait;
use polywatch::config::WatcherConfig;
use polywatch::logging::{LifecycleRecorder, ReconcileRecord, RecordError};
use polywatch::orders::{OrderId, OrderRegistry, OrderStatus, WatchedOrder};
use polywatch::reconcile::{
    FeedEvent, LifecycleEvent, LifecycleKind, OrderSnapshot, OrderUpdate, RawOrderMessage,
    RawOrderSnapshot, RawTradeMessage, ReconcileEngine, TradeEvent,
};
use polywatch::types::{OrderType, Side, SourceMode};

struct Harness {
    registry: Arc<OrderRegistry>,
    push_tx: mpsc::Sender<FeedEvent>,
    poll_tx: mpsc::Sender<FeedEvent>,
    events_rx: broadcast::Receiver<LifecycleEvent>,
}

fn harness() -> Harness {
    let config = WatcherConfig::default();
    let registry = Arc::new(OrderRegistry::new(config.tombstone_ttl_secs));
    let (events_tx, events_rx) = broadcast::channel(64);
    let (push_tx, push_rx) = mpsc::channel(64);
    let (poll_tx, poll_rx) = mpsc::channel(64);

    let engine = ReconcileEngine::new(Arc::clone(&registry), config, events_tx, None);
    tokio::spawn(engine.run(push_rx, poll_rx));

    Harness {
        registry,
        push_tx,
        poll_tx,
        events_rx,
    }
}

fn watched(id: &str, mode: SourceMode) -> WatchedOrder {
    WatchedOrder::new(
        OrderId::new(id),
        "0xmarket".to_string(),
        "YES-token".to_string(),
        Side::Buy,
        dec!(0.42),
        dec!(100),
        OrderType::Gtc,
        None,
        mode,
    )
}

fn order_event(json: &str) -> FeedEvent {
    let raw: RawOrderMessage = serde_json::from_str(json).unwrap();
    FeedEvent::Order(OrderUpdate::try_from(raw).unwrap())
}

fn trade_event(json: &str) -> FeedEvent {
    let raw: RawTradeMessage = serde_json::from_str(json).unwrap();
    FeedEvent::Trade(TradeEvent::try_from(raw).unwrap())
}

fn snapshot_event(json: &str) -> FeedEvent {
    let raw: RawOrderSnapshot = serde_json::from_str(json).unwrap();
    FeedEvent::Snapshot(OrderSnapshot::try_from(raw).unwrap())
}

async fn next_event(rx: &mut broadcast::Receiver<LifecycleEvent>) -> LifecycleEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for lifecycle event")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut broadcast::Receiver<LifecycleEvent>) {
    let result = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(result.is_err(), "unexpected lifecycle event: {result:?}");
}

/// Wait for the engine to drain the queued events and reach the expected
/// status for an order.
async fn wait_for_status(registry: &OrderRegistry, id: &OrderId, expected: OrderStatus) {
    for _ in 0..50 {
        if let Some(order) = registry.get(id).await {
            if order.status == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let actual = registry.get(id).await.map(|o| o.status);
    panic!("order {id} never reached {expected}, last seen: {actual:?}");
}

#[tokio::test]
async fn test_push_feed_drives_full_lifecycle() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    // Placement confirms the order is resting; not a notified transition.
    h.push_tx
        .send(order_event(
            r#"{"id": "o1", "status": "live", "original_size": "100", "size_matched": "0", "event_type": "PLACEMENT"}"#,
        ))
        .await
        .unwrap();
    wait_for_status(&h.registry, &id, OrderStatus::Open).await;
    assert_no_event(&mut h.events_rx).await;

    // A maker fill for 40 of 100.
    h.push_tx
        .send(trade_event(
            r#"{"id": "t1", "size": "40", "price": "0.42", "status": "MATCHED",
                "maker_orders": [{"order_id": "o1", "matched_amount": "40", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();

    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::PartiallyFilled);
    assert_eq!(event.fill_delta, dec!(40));
    assert_eq!(event.cumulative_filled, dec!(40));

    // The rest of the order fills.
    h.push_tx
        .send(trade_event(
            r#"{"id": "t2", "size": "60", "price": "0.42", "status": "MATCHED",
                "maker_orders": [{"order_id": "o1", "matched_amount": "60", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();

    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::Filled);
    assert_eq!(event.cumulative_filled, dec!(100));

    // Terminal order left active tracking but remains readable.
    wait_for_status(&h.registry, &id, OrderStatus::Filled).await;
    assert_eq!(h.registry.active_count().await, 0);
    let final_state = h.registry.get(&id).await.unwrap();
    assert_eq!(final_state.cumulative_filled, dec!(100));
}

#[tokio::test]
async fn test_duplicate_trade_delivery_applies_once() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    let trade = r#"{"id": "t1", "size": "40", "price": "0.42", "status": "MATCHED",
        "maker_orders": [{"order_id": "o1", "matched_amount": "40", "price": "0.42", "asset_id": "YES-token"}]}"#;

    h.push_tx.send(trade_event(trade)).await.unwrap();
    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::PartiallyFilled);

    // Same trade redelivered (reconnect replay): no double counting.
    h.push_tx.send(trade_event(trade)).await.unwrap();
    assert_no_event(&mut h.events_rx).await;

    let order = h.registry.get(&id).await.unwrap();
    assert_eq!(order.cumulative_filled, dec!(40));
}

#[tokio::test]
async fn test_maker_zero_fallback_uses_trade_size() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    // Venue quirk: maker fill reported with matched_amount zero.
    h.push_tx
        .send(trade_event(
            r#"{"id": "t1", "size": "30", "price": "0.42", "status": "MATCHED",
                "maker_orders": [{"order_id": "o1", "matched_amount": "0", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();

    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::PartiallyFilled);
    assert_eq!(event.fill_delta, dec!(30));
    assert_eq!(h.registry.get(&id).await.unwrap().cumulative_filled, dec!(30));
}

#[tokio::test]
async fn test_token_identity_survives_conflicting_reports() {
    let h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    // Venue reports the complementary outcome token.
    h.push_tx
        .send(order_event(
            r#"{"id": "o1", "asset_id": "NO-token", "status": "live", "original_size": "100", "size_matched": "0", "event_type": "UPDATE"}"#,
        ))
        .await
        .unwrap();
    wait_for_status(&h.registry, &id, OrderStatus::Open).await;

    let order = h.registry.get(&id).await.unwrap();
    assert_eq!(order.initial_token_id, "YES-token");
    assert_eq!(order.observed_token_id, "NO-token");
}

#[tokio::test]
async fn test_cancellation_beats_stale_poll_snapshot() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    h.push_tx
        .send(order_event(
            r#"{"id": "o1", "status": "cancelled", "original_size": "100", "size_matched": "0", "event_type": "CANCELLATION"}"#,
        ))
        .await
        .unwrap();
    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::Cancelled);

    // A snapshot fetched before the cancellation arrives late. First
    // write wins; the stale view cannot resurrect the order.
    h.poll_tx
        .send(snapshot_event(
            r#"{"id": "o1", "status": "live", "original_size": "100", "size_matched": "0"}"#,
        ))
        .await
        .unwrap();
    assert_no_event(&mut h.events_rx).await;
    assert_eq!(h.registry.get(&id).await.unwrap().status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_poll_only_order_reconstructed_from_snapshots() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::PollOnly)).await;

    // Push events for a poll-only order are not authoritative.
    h.push_tx
        .send(order_event(
            r#"{"id": "o1", "status": "cancelled", "original_size": "100", "size_matched": "0", "event_type": "CANCELLATION"}"#,
        ))
        .await
        .unwrap();
    assert_no_event(&mut h.events_rx).await;
    assert_eq!(h.registry.get(&id).await.unwrap().status, OrderStatus::Pending);

    // Snapshot sweep: live, then partially matched, then fully matched.
    h.poll_tx
        .send(snapshot_event(
            r#"{"id": "o1", "status": "live", "original_size": "100", "size_matched": "0"}"#,
        ))
        .await
        .unwrap();
    wait_for_status(&h.registry, &id, OrderStatus::Open).await;

    h.poll_tx
        .send(snapshot_event(
            r#"{"id": "o1", "status": "matched", "original_size": "100", "size_matched": "40"}"#,
        ))
        .await
        .unwrap();
    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::PartiallyFilled);
    assert_eq!(event.cumulative_filled, dec!(40));

    h.poll_tx
        .send(snapshot_event(
            r#"{"id": "o1", "status": "matched", "original_size": "100", "size_matched": "100"}"#,
        ))
        .await
        .unwrap();
    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::Filled);
    assert_eq!(event.cumulative_filled, dec!(100));
}

#[tokio::test]
async fn test_immediate_order_jumps_pending_to_filled() {
    let mut h = harness();
    let id = OrderId::new("o1");
    let mut order = watched("o1", SourceMode::Hybrid);
    order.order_type = OrderType::Fok;
    h.registry.register(order).await;

    // FOK fills in full immediately; there is no resting phase.
    h.push_tx
        .send(order_event(
            r#"{"id": "o1", "status": "matched", "original_size": "100", "size_matched": "100", "event_type": "UPDATE"}"#,
        ))
        .await
        .unwrap();

    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::Filled);
    wait_for_status(&h.registry, &id, OrderStatus::Filled).await;
}

#[tokio::test]
async fn test_cancelled_with_partial_fills_terminates() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::PollOnly)).await;

    // The snapshot says cancelled, but 40 of 100 filled first. The fill
    // is surfaced, then the terminal status lands.
    h.poll_tx
        .send(snapshot_event(
            r#"{"id": "o1", "status": "cancelled", "original_size": "100", "size_matched": "40"}"#,
        ))
        .await
        .unwrap();

    let first = next_event(&mut h.events_rx).await;
    assert_eq!(first.kind, LifecycleKind::PartiallyFilled);
    assert_eq!(first.cumulative_filled, dec!(40));

    let second = next_event(&mut h.events_rx).await;
    assert_eq!(second.kind, LifecycleKind::Cancelled);

    wait_for_status(&h.registry, &id, OrderStatus::Cancelled).await;
    assert_eq!(h.registry.get(&id).await.unwrap().cumulative_filled, dec!(40));
}

#[tokio::test]
async fn test_failed_trade_contributes_no_fills() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    h.push_tx
        .send(trade_event(
            r#"{"id": "t1", "size": "40", "price": "0.42", "status": "FAILED",
                "maker_orders": [{"order_id": "o1", "matched_amount": "40", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();

    assert_no_event(&mut h.events_rx).await;
    assert_eq!(h.registry.get(&id).await.unwrap().cumulative_filled, dec!(0));
}

#[tokio::test]
async fn test_events_for_unwatched_orders_are_dropped() {
    let mut h = harness();

    h.push_tx
        .send(order_event(
            r#"{"id": "ghost", "status": "live", "original_size": "100", "size_matched": "0", "event_type": "PLACEMENT"}"#,
        ))
        .await
        .unwrap();

    assert_no_event(&mut h.events_rx).await;
    assert!(h.registry.get(&OrderId::new("ghost")).await.is_none());
    assert_eq!(h.registry.active_count().await, 0);
}

#[tokio::test]
async fn test_late_trade_after_terminal_is_dropped() {
    let mut h = harness();
    let id = OrderId::new("o1");
    h.registry.register(watched("o1", SourceMode::Hybrid)).await;

    h.push_tx
        .send(order_event(
            r#"{"id": "o1", "status": "cancelled", "original_size": "100", "size_matched": "0", "event_type": "CANCELLATION"}"#,
        ))
        .await
        .unwrap();
    let event = next_event(&mut h.events_rx).await;
    assert_eq!(event.kind, LifecycleKind::Cancelled);

    // A trade that raced the cancellation arrives afterwards.
    h.push_tx
        .send(trade_event(
            r#"{"id": "t1", "size": "40", "price": "0.42", "status": "MATCHED",
                "maker_orders": [{"order_id": "o1", "matched_amount": "40", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();

    assert_no_event(&mut h.events_rx).await;
    let retained = h.registry.get(&id).await.unwrap();
    assert_eq!(retained.status, OrderStatus::Cancelled);
    assert_eq!(retained.cumulative_filled, dec!(0));
}

/// Recorder that captures every accepted transition for inspection.
#[derive(Default)]
struct CaptureRecorder {
    records: std::sync::Mutex<Vec<ReconcileRecord>>,
}

#[async_trait]
impl LifecycleRecorder for CaptureRecorder {
    async fn record(&self, record: &ReconcileRecord) -> Result<(), RecordError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_maker_fallback_is_recorded() {
    let config = WatcherConfig::default();
    let registry = Arc::new(OrderRegistry::new(config.tombstone_ttl_secs));
    let recorder = Arc::new(CaptureRecorder::default());
    let (events_tx, mut events_rx) = broadcast::channel(64);
    let (push_tx, push_rx) = mpsc::channel(64);
    let (_poll_tx, poll_rx) = mpsc::channel(64);

    let engine = ReconcileEngine::new(
        Arc::clone(&registry),
        config,
        events_tx,
        Some(recorder.clone() as Arc<dyn LifecycleRecorder>),
    );
    tokio::spawn(engine.run(push_rx, poll_rx));

    registry.register(watched("o1", SourceMode::Hybrid)).await;
    push_tx
        .send(trade_event(
            r#"{"id": "t1", "size": "30", "price": "0.42", "status": "MATCHED",
                "maker_orders": [{"order_id": "o1", "matched_amount": "0", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();
    next_event(&mut events_rx).await;

    let records = recorder.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].fallback_applied);
    assert_eq!(records[0].fill_delta, dec!(30));
    assert_eq!(records[0].source, "push");
}

#[tokio::test]
async fn test_one_trade_updates_taker_and_maker() {
    let mut h = harness();
    h.registry.register(watched("o-maker", SourceMode::Hybrid)).await;
    let mut taker = watched("o-taker", SourceMode::Hybrid);
    taker.side = Side::Sell;
    taker.original_size = dec!(25);
    h.registry.register(taker).await;

    h.push_tx
        .send(trade_event(
            r#"{"id": "t1", "taker_order_id": "o-taker", "size": "25", "price": "0.42", "status": "MATCHED",
                "maker_orders": [{"order_id": "o-maker", "matched_amount": "25", "price": "0.42", "asset_id": "YES-token"}]}"#,
        ))
        .await
        .unwrap();

    // Taker filled in full, maker partially.
    let first = next_event(&mut h.events_rx).await;
    let second = next_event(&mut h.events_rx).await;
    let kinds: Vec<LifecycleKind> = vec![first.kind, second.kind];
    assert!(kinds.contains(&LifecycleKind::Filled));
    assert!(kinds.contains(&LifecycleKind::PartiallyFilled));

    let taker = h.registry.get(&OrderId::new("o-taker")).await.unwrap();
    assert_eq!(taker.status, OrderStatus::Filled);
    let maker = h.registry.get(&OrderId::new("o-maker")).await.unwrap();
    assert_eq!(maker.cumulative_filled, dec!(25));
    assert_eq!(maker.status, OrderStatus::PartiallyFilled);
}
