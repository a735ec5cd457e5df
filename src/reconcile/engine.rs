//! The reconciliation engine.
//!
//! Consumes the push feed and the poll feed concurrently, normalizes each
//! event through the status mapper and fill accountant, applies the result
//! to the order registry under the state-machine rules, and emits lifecycle
//! notifications.
//!
//! # Ordering
//!
//! Both feeds drain into one consumer task, so application is serialized
//! per order: two events for the same order are never applied out of
//! mutual order, and notifications for a single order are emitted in
//! state-machine order. No ordering is guaranteed across distinct orders.
//!
//! # Conflict policy
//!
//! When push and poll disagree, whichever arrives first wins. The later,
//! contradictory update is evaluated against the already-updated state and
//! is accepted only if it represents forward progress under the transition
//! table, which makes the merge commutative with respect to terminal
//! outcomes regardless of feed arrival order.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::WatcherConfig;
use crate::logging::{LifecycleRecorder, ReconcileRecord};
use crate::orders::{
    assess, map_status, ApplyOutcome, OrderFill, OrderId, OrderPatch, OrderRegistry, OrderStatus,
    TradeId, TradeRole, WatchedOrder,
};

use super::events::{FeedEvent, OrderEventType, OrderSnapshot, OrderUpdate, TradeEvent, TradeStatus};

/// Which feed an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Push,
    Poll,
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedSource::Push => write!(f, "push"),
            FeedSource::Poll => write!(f, "poll"),
        }
    }
}

/// Lifecycle notification kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
}

impl LifecycleKind {
    fn from_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::PartiallyFilled => Some(Self::PartiallyFilled),
            OrderStatus::Filled => Some(Self::Filled),
            OrderStatus::Cancelled => Some(Self::Cancelled),
            OrderStatus::Expired => Some(Self::Expired),
            OrderStatus::Pending | OrderStatus::Open | OrderStatus::Rejected => None,
        }
    }
}

impl std::fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PartiallyFilled => write!(f, "order_partially_filled"),
            Self::Filled => write!(f, "order_filled"),
            Self::Cancelled => write!(f, "order_cancelled"),
            Self::Expired => write!(f, "order_expired"),
        }
    }
}

/// A lifecycle notification: emitted exactly once per (order, new-status).
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub order_id: OrderId,
    pub kind: LifecycleKind,
    /// Fill amount contributed by the event that caused the transition.
    pub fill_delta: Decimal,
    pub cumulative_filled: Decimal,
}

/// Orchestrates the two feeds into one authoritative order view.
pub struct ReconcileEngine {
    registry: Arc<OrderRegistry>,
    config: WatcherConfig,
    events_tx: broadcast::Sender<LifecycleEvent>,
    recorder: Option<Arc<dyn LifecycleRecorder>>,
}

impl ReconcileEngine {
    pub fn new(
        registry: Arc<OrderRegistry>,
        config: WatcherConfig,
        events_tx: broadcast::Sender<LifecycleEvent>,
        recorder: Option<Arc<dyn LifecycleRecorder>>,
    ) -> Self {
        Self {
            registry,
            config,
            events_tx,
            recorder,
        }
    }

    /// Drain both feeds until they close.
    ///
    /// The deduplication set for (trade, order) pairs lives here: the run
    /// loop is the single consumer, so no locking is needed around it.
    pub async fn run(
        self,
        mut push_rx: mpsc::Receiver<FeedEvent>,
        mut poll_rx: mpsc::Receiver<FeedEvent>,
    ) {
        let mut applied_trades: HashSet<(TradeId, OrderId)> = HashSet::new();
        let mut push_open = true;
        let mut poll_open = true;

        while push_open || poll_open {
            tokio::select! {
                event = push_rx.recv(), if push_open => match event {
                    Some(event) => self.handle(FeedSource::Push, event, &mut applied_trades).await,
                    None => push_open = false,
                },
                event = poll_rx.recv(), if poll_open => match event {
                    Some(event) => self.handle(FeedSource::Poll, event, &mut applied_trades).await,
                    None => poll_open = false,
                },
            }
        }
        debug!("Reconciliation engine stopped: both feeds closed");
    }

    async fn handle(
        &self,
        source: FeedSource,
        event: FeedEvent,
        applied_trades: &mut HashSet<(TradeId, OrderId)>,
    ) {
        match event {
            FeedEvent::Order(update) => self.handle_order_event(source, update).await,
            FeedEvent::Trade(trade) => {
                self.handle_trade_event(source, trade, applied_trades).await
            }
            FeedEvent::Snapshot(snapshot) => self.handle_snapshot(source, snapshot).await,
        }
    }

    /// Look up a watched order, logging and dropping events that reference
    /// orders this engine was never asked to watch.
    async fn watched(&self, source: FeedSource, order_id: &OrderId) -> Option<WatchedOrder> {
        if let Some(order) = self.registry.get(order_id).await {
            return Some(order);
        }
        if self.registry.is_tombstoned(order_id).await {
            debug!(order_id = %order_id, source = %source, "Late event for tombstoned order, dropped");
        } else {
            // Not this engine's job to retroactively discover orders.
            warn!(order_id = %order_id, source = %source, "Event references unknown order, dropped");
        }
        None
    }

    async fn handle_order_event(&self, source: FeedSource, update: OrderUpdate) {
        let Some(order) = self.watched(source, &update.order_id).await else {
            return;
        };
        if source == FeedSource::Push && !order.source_mode.accepts_push() {
            debug!(order_id = %update.order_id, mode = %order.source_mode, "Push feed not authoritative for order, dropped");
            return;
        }

        // The venue sometimes zeroes original_size on updates; fall back
        // to the size we registered with.
        let original = if update.original_size > Decimal::ZERO {
            update.original_size
        } else {
            order.original_size
        };

        let status = match update.event_type {
            OrderEventType::Cancellation => OrderStatus::Cancelled,
            OrderEventType::Placement | OrderEventType::Update => {
                map_status(update.status.as_deref(), original, update.size_matched)
            }
        };

        let token = (!update.asset_id.is_empty()).then(|| update.asset_id.clone());
        let patch = OrderPatch {
            status,
            cumulative_filled: update.size_matched,
            observed_token_id: token,
        };
        self.commit(source, &update.order_id, patch, false).await;

        // A cancelled/expired label alongside partial fills maps to
        // PARTIALLY_FILLED (size fields win). Apply the terminal status
        // as a follow-up so the order still terminates.
        if let Some(terminal) = terminal_followup(update.status.as_deref(), status) {
            let patch = OrderPatch {
                status: terminal,
                cumulative_filled: update.size_matched,
                observed_token_id: None,
            };
            self.commit(source, &update.order_id, patch, false).await;
        }
    }

    async fn handle_snapshot(&self, source: FeedSource, snapshot: OrderSnapshot) {
        let Some(order) = self.watched(source, &snapshot.order_id).await else {
            return;
        };
        if source == FeedSource::Poll && !order.source_mode.accepts_poll() {
            debug!(order_id = %snapshot.order_id, mode = %order.source_mode, "Poll feed not authoritative for order, dropped");
            return;
        }

        let original = if snapshot.original_size > Decimal::ZERO {
            snapshot.original_size
        } else {
            order.original_size
        };
        let status = map_status(snapshot.status.as_deref(), original, snapshot.size_matched);
        let patch = OrderPatch {
            status,
            cumulative_filled: snapshot.size_matched,
            observed_token_id: snapshot.asset_id.clone(),
        };
        self.commit(source, &snapshot.order_id, patch, false).await;

        if let Some(terminal) = terminal_followup(snapshot.status.as_deref(), status) {
            let patch = OrderPatch {
                status: terminal,
                cumulative_filled: snapshot.size_matched,
                observed_token_id: None,
            };
            self.commit(source, &snapshot.order_id, patch, false).await;
        }
    }

    async fn handle_trade_event(
        &self,
        source: FeedSource,
        trade: TradeEvent,
        applied_trades: &mut HashSet<(TradeId, OrderId)>,
    ) {
        if trade.status == TradeStatus::Failed {
            warn!(trade_id = %trade.trade_id, "Trade reported FAILED by venue, no fills applied");
            return;
        }

        // Taker participation: the matched amount is the trade size.
        let mut fills: Vec<OrderFill> = Vec::with_capacity(1 + trade.maker_fills.len());
        if let Some(taker_id) = &trade.taker_order_id {
            fills.push(OrderFill {
                trade_id: trade.trade_id.clone(),
                order_id: taker_id.clone(),
                role: TradeRole::Taker,
                matched_amount: trade.size,
                price: trade.price,
                trade_size: trade.size,
            });
        }
        for maker in &trade.maker_fills {
            fills.push(OrderFill {
                trade_id: trade.trade_id.clone(),
                order_id: maker.order_id.clone(),
                role: TradeRole::Maker,
                matched_amount: maker.matched_amount,
                price: maker.price,
                trade_size: trade.size,
            });
        }

        for fill in fills {
            let key = (fill.trade_id.clone(), fill.order_id.clone());
            if applied_trades.contains(&key) {
                debug!(
                    trade_id = %fill.trade_id,
                    order_id = %fill.order_id,
                    "Trade already applied to order, redelivery dropped"
                );
                continue;
            }
            let Some(order) = self.watched(source, &fill.order_id).await else {
                continue;
            };
            if source == FeedSource::Push && !order.source_mode.accepts_push() {
                debug!(order_id = %fill.order_id, mode = %order.source_mode, "Push feed not authoritative for order, dropped");
                continue;
            }

            let assessment = assess(&order, &fill);
            let patch = OrderPatch {
                status: assessment.status,
                cumulative_filled: assessment.new_cumulative,
                observed_token_id: None,
            };
            applied_trades.insert(key);
            self.commit(source, &fill.order_id, patch, assessment.fallback_applied)
                .await;
        }
    }

    /// Apply one normalized patch and act on the outcome: emit the
    /// lifecycle notification, record it, and unwatch terminal orders.
    async fn commit(
        &self,
        source: FeedSource,
        order_id: &OrderId,
        patch: OrderPatch,
        fallback_applied: bool,
    ) {
        match self.registry.apply(order_id, patch).await {
            ApplyOutcome::Applied {
                snapshot,
                previous_status,
                fill_delta,
            } => {
                if let Some(recorder) = &self.recorder {
                    let record = ReconcileRecord {
                        order_id: order_id.clone(),
                        timestamp: Utc::now(),
                        previous_status,
                        new_status: snapshot.status,
                        fill_delta,
                        cumulative_filled: snapshot.cumulative_filled,
                        fallback_applied,
                        source: source.to_string(),
                    };
                    if let Err(e) = recorder.record(&record).await {
                        warn!(error = %e, "Failed to record lifecycle transition");
                    }
                }

                // The state machine never revisits a status, so a changed
                // status is always the first sighting of that
                // (order, status) pair.
                if previous_status != snapshot.status {
                    if let Some(kind) = LifecycleKind::from_status(snapshot.status) {
                        let event = LifecycleEvent {
                            order_id: order_id.clone(),
                            kind,
                            fill_delta,
                            cumulative_filled: snapshot.cumulative_filled,
                        };
                        // Receivers may come and go; an empty audience is fine.
                        let _ = self.events_tx.send(event);
                        info!(
                            order_id = %order_id,
                            notification = %kind,
                            delta = %fill_delta,
                            cumulative = %snapshot.cumulative_filled,
                            "Lifecycle notification emitted"
                        );
                    }
                }

                if snapshot.status.is_terminal() {
                    self.registry.unwatch(order_id).await;
                }
            }
            ApplyOutcome::NoOp { .. } => {}
            ApplyOutcome::TransitionRejected {
                current,
                attempted,
                last_updated,
            } => {
                // Inside the conflict window this is ordinary push/poll
                // raciness; outside it the feeds genuinely disagree.
                let age = Utc::now().signed_duration_since(last_updated);
                let within_window = age
                    .to_std()
                    .map(|age| age <= self.config.conflict_window)
                    .unwrap_or(true);
                if within_window {
                    debug!(
                        order_id = %order_id,
                        source = %source,
                        current = %current,
                        attempted = %attempted,
                        "Stale cross-feed update rejected"
                    );
                } else {
                    warn!(
                        order_id = %order_id,
                        source = %source,
                        current = %current,
                        attempted = %attempted,
                        "Conflicting transition rejected, local state wins"
                    );
                }
            }
            ApplyOutcome::Tombstoned => {
                debug!(order_id = %order_id, "Patch for tombstoned order dropped");
            }
            ApplyOutcome::Unknown => {
                warn!(order_id = %order_id, "Patch references unknown order, dropped");
            }
        }
    }
}

/// When a terminal textual status loses to the size fields (rule priority:
/// fills win), the terminal transition still has to land. Returns the
/// terminal status to apply as a follow-up patch, if any.
fn terminal_followup(raw_status: Option<&str>, mapped: OrderStatus) -> Option<OrderStatus> {
    if mapped != OrderStatus::PartiallyFilled {
        return None;
    }
    match raw_status.map(str::to_ascii_lowercase).as_deref() {
        Some("cancelled") | Some("canceled") => Some(OrderStatus::Cancelled),
        Some("expired") => Some(OrderStatus::Expired),
        _ => None,
    }
}
