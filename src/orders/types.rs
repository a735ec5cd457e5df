//! Core types for order lifecycle tracking.
//!
//! Provides type-safe identifiers, the canonical order status state
//! machine, and the `WatchedOrder` record the registry stores.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderType, Side, SourceMode};

/// Type-safe order identifier (venue-assigned).
///
/// Newtype wrapper to prevent accidentally mixing order ids with other
/// string types at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let s: String = id.into();
        debug_assert!(!s.is_empty(), "OrderId cannot be empty");
        Self(s)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Type-safe trade identifier (venue-assigned).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(String);

impl TradeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TradeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical order lifecycle status.
///
/// Transitions are governed by `can_transition_to`; terminal statuses
/// accept no further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Submitted, not yet active in the book.
    Pending,
    /// Resting in the book, no fills yet.
    Open,
    /// Some quantity executed, order still live.
    PartiallyFilled,
    /// All quantity executed.
    Filled,
    /// Cancelled by the caller or the venue.
    Cancelled,
    /// Good-till-date expiration reached.
    Expired,
    /// Failed local pre-flight validation; never reached the venue.
    Rejected,
}

impl OrderStatus {
    /// Returns true if no further transitions are legal from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Expired | Self::Rejected
        )
    }

    /// Legal outward transitions.
    ///
    /// A transition to the current status is a permitted no-op and is not
    /// routed through this check. FOK/FAK orders jump Pending -> Filled or
    /// Pending -> Cancelled directly; both paths are in the table.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(
                next,
                Open | PartiallyFilled | Filled | Cancelled | Expired | Rejected
            ),
            Open => matches!(next, PartiallyFilled | Filled | Cancelled | Expired),
            PartiallyFilled => matches!(next, Filled | Cancelled | Expired),
            Filled | Cancelled | Expired | Rejected => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Open => write!(f, "OPEN"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A watched order: the authoritative local view of one venue order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedOrder {
    /// Venue-assigned order id (stable identity key).
    pub order_id: OrderId,
    /// Venue market identifier.
    pub market: String,
    /// Token id supplied by the caller at watch time. Immutable from the
    /// moment the order is registered; a polled value never overwrites it.
    pub initial_token_id: String,
    /// Latest token id reported by the venue. Informational only.
    pub observed_token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub original_size: Decimal,
    /// Monotonically non-decreasing, never exceeds `original_size`.
    pub cumulative_filled: Decimal,
    pub status: OrderStatus,
    pub order_type: OrderType,
    /// Required iff `order_type` is GTD.
    pub expiration: Option<DateTime<Utc>>,
    pub source_mode: SourceMode,
    pub created_at: DateTime<Utc>,
    /// Advances on every accepted event.
    pub last_updated: DateTime<Utc>,
}

impl WatchedOrder {
    /// Create a new watched order in Pending status.
    ///
    /// Timestamps use `Utc::now()`: registration is a real-world event and
    /// the timestamps feed logging, not strategy logic.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        market: String,
        initial_token_id: String,
        side: Side,
        price: Decimal,
        original_size: Decimal,
        order_type: OrderType,
        expiration: Option<DateTime<Utc>>,
        source_mode: SourceMode,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            market,
            observed_token_id: initial_token_id.clone(),
            initial_token_id,
            side,
            price,
            original_size,
            cumulative_filled: Decimal::ZERO,
            status: OrderStatus::Pending,
            order_type,
            expiration,
            source_mode,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Remaining unfilled quantity.
    pub fn remaining(&self) -> Decimal {
        self.original_size - self.cumulative_filled
    }

    /// True once fills cover the full original size.
    pub fn is_fully_filled(&self) -> bool {
        self.original_size > Decimal::ZERO && self.cumulative_filled >= self.original_size
    }
}
