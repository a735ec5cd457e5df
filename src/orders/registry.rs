//! In-memory registry of watched orders.
//!
//! Owns the mutation rules for order state: the transition table,
//! monotonic fill accounting, identity-field immutability, and the
//! tombstone set that recognizes late events for unwatched orders.
//!
//! # Thread Safety
//!
//! A single `RwLock` guards active orders, the completed log, and the
//! tombstones together, so moving an order between them is atomic with
//! respect to concurrent applies: an apply racing an unwatch either
//! lands before the move or observes the tombstone, never a half state.
//! Read snapshots clone entries and are never torn.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{OrderId, OrderStatus, WatchedOrder};

/// Candidate mutation produced by normalizing one feed event.
#[derive(Debug, Clone)]
pub struct OrderPatch {
    pub status: OrderStatus,
    pub cumulative_filled: Decimal,
    /// Latest token id the venue reported, if the event carried one.
    /// Updates `observed_token_id` only; `initial_token_id` is immutable.
    pub observed_token_id: Option<String>,
}

/// Result of applying a patch to a watched order.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The patch was committed. `previous_status` equals the snapshot's
    /// status when only fill progress (or the observed token) changed.
    Applied {
        snapshot: WatchedOrder,
        previous_status: OrderStatus,
        fill_delta: Decimal,
    },
    /// The patch carried nothing new; state untouched.
    NoOp { snapshot: WatchedOrder },
    /// The patch conflicted with the state machine; state untouched.
    /// `last_updated` lets the caller judge whether this was ordinary
    /// push/poll raciness or a real consistency problem.
    TransitionRejected {
        current: OrderStatus,
        attempted: OrderStatus,
        last_updated: DateTime<Utc>,
    },
    /// The order was recently unwatched; the event is a late duplicate.
    Tombstoned,
    /// The order was never registered here.
    Unknown,
}

/// Result of registering an order.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    Created(WatchedOrder),
    /// The id was already present. Duplicate registration is expected
    /// under concurrent submission and is not an error.
    Existing(WatchedOrder),
}

impl RegisterOutcome {
    pub fn snapshot(&self) -> &WatchedOrder {
        match self {
            RegisterOutcome::Created(o) | RegisterOutcome::Existing(o) => o,
        }
    }
}

struct RegistryInner {
    active: HashMap<OrderId, WatchedOrder>,
    /// Terminal orders retained for reads; not polled or subscribed.
    completed: HashMap<OrderId, WatchedOrder>,
    /// Unwatch time per order, so late duplicates are dropped instead of
    /// re-registering a stale order.
    tombstones: HashMap<OrderId, DateTime<Utc>>,
}

/// Thread-safe registry of watched orders.
pub struct OrderRegistry {
    inner: RwLock<RegistryInner>,
    tombstone_ttl_secs: u64,
}

impl OrderRegistry {
    pub fn new(tombstone_ttl_secs: u64) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                active: HashMap::new(),
                completed: HashMap::new(),
                tombstones: HashMap::new(),
            }),
            tombstone_ttl_secs,
        }
    }

    /// Register an order for watching.
    ///
    /// Idempotent: if the id is already tracked (active or completed) the
    /// existing entry is returned untouched.
    pub async fn register(&self, order: WatchedOrder) -> RegisterOutcome {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.active.get(&order.order_id) {
            debug!(order_id = %order.order_id, "Duplicate registration, returning existing entry");
            return RegisterOutcome::Existing(existing.clone());
        }
        if let Some(existing) = inner.completed.get(&order.order_id) {
            debug!(order_id = %order.order_id, "Registration for completed order, returning existing entry");
            return RegisterOutcome::Existing(existing.clone());
        }

        let id = order.order_id.clone();
        let snapshot = order.clone();
        if order.is_terminal() {
            // Locally-rejected orders arrive already terminal and go
            // straight to the completed log.
            inner.tombstones.insert(id.clone(), Utc::now());
            inner.completed.insert(id.clone(), order);
        } else {
            inner.active.insert(id.clone(), order);
        }
        debug!(order_id = %id, status = %snapshot.status, mode = %snapshot.source_mode, "Order registered");
        RegisterOutcome::Created(snapshot)
    }

    /// Apply a candidate status / cumulative-fill pair to an order.
    ///
    /// Validates the state-machine transition table and the fill
    /// invariants; a conflicting patch is rejected without touching
    /// local state (local state wins over a stale update).
    pub async fn apply(&self, order_id: &OrderId, patch: OrderPatch) -> ApplyOutcome {
        let mut inner = self.inner.write().await;

        if inner.tombstones.contains_key(order_id) && !inner.active.contains_key(order_id) {
            debug!(order_id = %order_id, "Dropping event for tombstoned order");
            return ApplyOutcome::Tombstoned;
        }

        if let Some(done) = inner.completed.get(order_id) {
            // Terminal orders accept no further mutation.
            return ApplyOutcome::NoOp {
                snapshot: done.clone(),
            };
        }

        let Some(order) = inner.active.get_mut(order_id) else {
            return ApplyOutcome::Unknown;
        };

        if order.status.is_terminal() {
            return ApplyOutcome::NoOp {
                snapshot: order.clone(),
            };
        }

        // Fills only move forward and never exceed the original size. A
        // candidate below the current cumulative is stale, not a reset.
        let new_cumulative = patch
            .cumulative_filled
            .max(order.cumulative_filled)
            .min(order.original_size);
        let fill_delta = new_cumulative - order.cumulative_filled;

        let status_changes = patch.status != order.status;
        if status_changes && !order.status.can_transition_to(patch.status) {
            return ApplyOutcome::TransitionRejected {
                current: order.status,
                attempted: patch.status,
                last_updated: order.last_updated,
            };
        }

        let token_changes = patch
            .observed_token_id
            .as_ref()
            .is_some_and(|t| *t != order.observed_token_id);

        if !status_changes && fill_delta.is_zero() && !token_changes {
            return ApplyOutcome::NoOp {
                snapshot: order.clone(),
            };
        }

        let previous_status = order.status;
        order.status = patch.status;
        order.cumulative_filled = new_cumulative;
        if let Some(token) = patch.observed_token_id {
            if token != order.observed_token_id {
                debug!(
                    order_id = %order_id,
                    observed = %token,
                    initial = %order.initial_token_id,
                    "Venue reported a different token id, recording as observed only"
                );
                order.observed_token_id = token;
            }
        }
        order.last_updated = Utc::now();

        info!(
            order_id = %order_id,
            old_status = %previous_status,
            new_status = %order.status,
            filled = %order.cumulative_filled,
            original = %order.original_size,
            "Order state updated"
        );

        ApplyOutcome::Applied {
            snapshot: order.clone(),
            previous_status,
            fill_delta,
        }
    }

    /// Read one order (active or completed).
    pub async fn get(&self, order_id: &OrderId) -> Option<WatchedOrder> {
        let inner = self.inner.read().await;
        inner
            .active
            .get(order_id)
            .or_else(|| inner.completed.get(order_id))
            .cloned()
    }

    /// Snapshot of all actively watched orders.
    pub async fn list(&self) -> Vec<WatchedOrder> {
        let inner = self.inner.read().await;
        inner.active.values().cloned().collect()
    }

    /// Actively watched order ids that accept the poll feed.
    pub async fn pollable_ids(&self) -> Vec<OrderId> {
        let inner = self.inner.read().await;
        inner
            .active
            .values()
            .filter(|o| o.source_mode.accepts_poll())
            .map(|o| o.order_id.clone())
            .collect()
    }

    /// Whether a recently-unwatched order's tombstone is still held.
    pub async fn is_tombstoned(&self, order_id: &OrderId) -> bool {
        let inner = self.inner.read().await;
        inner.tombstones.contains_key(order_id) && !inner.active.contains_key(order_id)
    }

    /// Move a terminal order out of active tracking.
    ///
    /// The order is retained in the completed log and a tombstone is
    /// recorded so a late duplicate event neither re-creates the order
    /// nor mutates the retained record. Returns the final snapshot, or
    /// `None` if the order was not actively tracked.
    pub async fn unwatch(&self, order_id: &OrderId) -> Option<WatchedOrder> {
        let mut inner = self.inner.write().await;
        let order = inner.active.remove(order_id)?;
        if !order.status.is_terminal() {
            warn!(order_id = %order_id, status = %order.status, "Unwatching a non-terminal order");
        }
        let snapshot = order.clone();
        inner.tombstones.insert(order_id.clone(), Utc::now());
        inner.completed.insert(order_id.clone(), order);
        debug!(order_id = %order_id, "Order unwatched");
        Some(snapshot)
    }

    /// Drop tombstones older than the retention period. Call periodically
    /// to bound memory growth. Returns the number removed.
    pub async fn purge_tombstones(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.tombstone_ttl_secs as i64);
        let mut inner = self.inner.write().await;
        let stale: Vec<OrderId> = inner
            .tombstones
            .iter()
            .filter(|(_, t)| **t < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            inner.tombstones.remove(id);
            inner.completed.remove(id);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "Purged tombstones");
        }
        stale.len()
    }

    /// Count of actively watched orders.
    pub async fn active_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.active.len()
    }
}
