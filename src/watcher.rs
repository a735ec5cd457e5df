//! Caller-facing order watcher.
//!
//! Wires the registry, reconciliation engine, and poller together and
//! exposes order entry, watching, and lifecycle subscription. Pre-flight
//! validation happens here: an invalid request yields a locally REJECTED
//! entry and never reaches the venue.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WatcherConfig;
use crate::logging::LifecycleRecorder;
use crate::orders::{OrderId, OrderRegistry, OrderStatus, RegisterOutcome, WatchedOrder};
use crate::reconcile::{spawn_poller, FeedEvent, LifecycleEvent, ReconcileEngine};
use crate::types::{OrderType, SourceMode};
use crate::venue::{LimitOrderRequest, MarketOrderRequest, OrderSpec, PushFeed, VenueClient, VenueError};

/// Errors surfaced by order entry.
#[derive(Debug, Error)]
pub enum OrderEntryError {
    /// Pre-flight validation failed; the order never reached the venue
    /// and was recorded locally as REJECTED.
    #[error("Order validation failed: {reason} (recorded as {order_id})")]
    Validation { reason: String, order_id: OrderId },

    #[error(transparent)]
    Venue(#[from] VenueError),
}

/// Facade over the reconciliation engine for one venue connection.
pub struct OrderWatcher<V: VenueClient> {
    venue: Arc<V>,
    registry: Arc<OrderRegistry>,
    events_tx: broadcast::Sender<LifecycleEvent>,
    push_tx: mpsc::Sender<FeedEvent>,
    engine_handle: JoinHandle<()>,
    poller_handle: JoinHandle<()>,
}

impl<V: VenueClient + 'static> OrderWatcher<V> {
    /// Build the watcher and start the engine and poller tasks.
    pub fn new(venue: Arc<V>, config: WatcherConfig) -> Self {
        Self::with_recorder(venue, config, None)
    }

    /// As `new`, with a lifecycle recorder attached to the engine.
    pub fn with_recorder(
        venue: Arc<V>,
        config: WatcherConfig,
        recorder: Option<Arc<dyn LifecycleRecorder>>,
    ) -> Self {
        let registry = Arc::new(OrderRegistry::new(config.tombstone_ttl_secs));
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (push_tx, push_rx) = mpsc::channel(config.feed_channel_capacity);
        let (poll_tx, poll_rx) = mpsc::channel(config.feed_channel_capacity);

        let engine = ReconcileEngine::new(
            Arc::clone(&registry),
            config.clone(),
            events_tx.clone(),
            recorder,
        );
        let engine_handle = tokio::spawn(engine.run(push_rx, poll_rx));
        let poller_handle = spawn_poller(
            Arc::clone(&registry),
            Arc::clone(&venue),
            poll_tx,
            config.poll_interval,
        );

        Self {
            venue,
            registry,
            events_tx,
            push_tx,
            engine_handle,
            poller_handle,
        }
    }

    /// Submit a limit order. Validation failures are recorded locally as
    /// REJECTED and never reach the venue.
    pub async fn create_order(
        &self,
        request: &LimitOrderRequest,
    ) -> Result<OrderId, OrderEntryError> {
        if let Err(reason) = validate_limit(request) {
            let order_id = self
                .record_rejected(&request.token_id, &request.spec, &reason)
                .await;
            return Err(OrderEntryError::Validation { reason, order_id });
        }
        let order_id = self.venue.create_order(request).await?;
        info!(order_id = %order_id, market = %request.spec.market, "Limit order submitted");
        Ok(order_id)
    }

    /// Submit a market order (fill-and-kill semantics).
    pub async fn create_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderId, OrderEntryError> {
        if let Err(reason) = validate_market(request) {
            let order_id = self
                .record_rejected(&request.token_id, &request.as_spec(), &reason)
                .await;
            return Err(OrderEntryError::Validation { reason, order_id });
        }
        let order_id = self.venue.create_market_order(request).await?;
        info!(order_id = %order_id, market = %request.market, "Market order submitted");
        Ok(order_id)
    }

    /// Register an order for lifecycle tracking.
    ///
    /// `initial_token_id` is supplied by the caller because it cannot be
    /// recovered from the venue after a restart; once set it is never
    /// overwritten by a polled value. Idempotent under concurrent
    /// submission: a duplicate watch returns the existing entry.
    pub async fn watch_order(
        &self,
        order_id: OrderId,
        initial_token_id: impl Into<String>,
        spec: OrderSpec,
        mode: SourceMode,
    ) -> WatchedOrder {
        let order = WatchedOrder::new(
            order_id,
            spec.market,
            initial_token_id.into(),
            spec.side,
            spec.price,
            spec.size,
            spec.order_type,
            spec.expiration,
            mode,
        );
        match self.registry.register(order).await {
            RegisterOutcome::Created(snapshot) => {
                info!(order_id = %snapshot.order_id, mode = %mode, "Order watched");
                snapshot
            }
            RegisterOutcome::Existing(snapshot) => snapshot,
        }
    }

    /// Request cancellation at the venue. Local state is not touched
    /// here; the cancellation lands through the feeds like any other
    /// transition.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<(), VenueError> {
        self.venue.cancel_order(order_id).await?;
        info!(order_id = %order_id, "Cancellation requested");
        Ok(())
    }

    /// Point-in-time snapshot of one order (active or completed).
    pub async fn get_order(&self, order_id: &OrderId) -> Option<WatchedOrder> {
        self.registry.get(order_id).await
    }

    /// Point-in-time snapshots of all actively watched orders.
    pub async fn list_watched_orders(&self) -> Vec<WatchedOrder> {
        self.registry.list().await
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events_tx.subscribe()
    }

    /// Sender for injecting push-feed events. External venue connectors
    /// deliver their parsed events here.
    pub fn push_sender(&self) -> mpsc::Sender<FeedEvent> {
        self.push_tx.clone()
    }

    /// Connect a push feed provider and keep it pumping events into the
    /// engine. Returns the task handle.
    pub fn attach_push_feed<F: PushFeed + 'static>(&self, feed: Arc<F>) -> JoinHandle<()> {
        let sender = self.push_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = feed.connect_and_subscribe(sender).await {
                warn!(error = %e, "Push feed terminated");
            }
        })
    }

    /// Stop the engine and poller tasks.
    pub fn shutdown(self) {
        self.poller_handle.abort();
        self.engine_handle.abort();
    }

    async fn record_rejected(&self, token_id: &str, spec: &OrderSpec, reason: &str) -> OrderId {
        let order_id = OrderId::new(format!("rejected-{}", Uuid::new_v4()));
        let mut order = WatchedOrder::new(
            order_id.clone(),
            spec.market.clone(),
            token_id.to_string(),
            spec.side,
            spec.price,
            spec.size,
            spec.order_type,
            spec.expiration,
            SourceMode::Hybrid,
        );
        order.status = OrderStatus::Rejected;
        warn!(order_id = %order_id, reason = reason, "Order rejected pre-flight");
        self.registry.register(order).await;
        order_id
    }
}

fn validate_limit(request: &LimitOrderRequest) -> Result<(), String> {
    if request.token_id.is_empty() {
        return Err("token id must not be empty".to_string());
    }
    let spec = &request.spec;
    if spec.size <= Decimal::ZERO {
        return Err(format!("order size must be positive, got {}", spec.size));
    }
    if spec.price <= Decimal::ZERO || spec.price >= Decimal::ONE {
        return Err(format!(
            "outcome token price must be strictly between 0 and 1, got {}",
            spec.price
        ));
    }
    match (spec.order_type, spec.expiration) {
        (OrderType::Gtd, None) => Err("GTD order requires an expiration".to_string()),
        (OrderType::Gtd, Some(exp)) if exp <= Utc::now() => {
            Err("GTD expiration must be in the future".to_string())
        }
        (t, Some(_)) if t != OrderType::Gtd => {
            Err(format!("{t} order must not carry an expiration"))
        }
        _ => Ok(()),
    }
}

fn validate_market(request: &MarketOrderRequest) -> Result<(), String> {
    if request.token_id.is_empty() {
        return Err("token id must not be empty".to_string());
    }
    if request.size <= Decimal::ZERO {
        return Err(format!("order size must be positive, got {}", request.size));
    }
    Ok(())
}
