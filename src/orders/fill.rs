//! Fill accounting for trade events.
//!
//! Computes the incremental fill delta a trade event contributes to an
//! order's cumulative fill, with the documented fallback for the venue
//! defect where a maker-side matched-amount field is spuriously zero.

use rust_decimal::Decimal;

use super::types::{OrderId, OrderStatus, TradeId, WatchedOrder};

/// Role an order played in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeRole {
    /// Passive side: the order was resting in the book.
    Maker,
    /// Aggressive side: the order crossed the book.
    Taker,
}

impl std::fmt::Display for TradeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeRole::Maker => write!(f, "maker"),
            TradeRole::Taker => write!(f, "taker"),
        }
    }
}

/// One order's participation in a trade, normalized from the feed.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub trade_id: TradeId,
    pub order_id: OrderId,
    pub role: TradeRole,
    /// Matched amount reported for this order. May be spuriously zero for
    /// maker participants.
    pub matched_amount: Decimal,
    pub price: Decimal,
    /// Overall size of the trade this fill belongs to.
    pub trade_size: Decimal,
}

/// Result of assessing a trade event against an order.
#[derive(Debug, Clone)]
pub struct FillAssessment {
    /// Incremental amount this trade contributes.
    pub delta: Decimal,
    /// New cumulative filled amount, clamped to the original size.
    pub new_cumulative: Decimal,
    /// Status transition the fill implies, derived from the fill threshold
    /// (a trade event carries no status field for the order itself).
    pub status: OrderStatus,
    /// True when the maker-zero fallback supplied the delta.
    pub fallback_applied: bool,
}

/// Compute the fill delta and resulting state for a trade event.
///
/// `delta = matched_amount` normally. When the order's role is maker and
/// the matched amount is zero while the trade's overall size is non-zero,
/// the venue has hit its known maker-side zeroing defect: the order
/// demonstrably matched, so `delta = trade_size`. The fallback is flagged
/// on the assessment so callers can record it; it is never silent.
///
/// The new cumulative is clamped to the original size, guarding against
/// double-application if a redelivered trade slips past deduplication
/// with a stale cumulative base.
pub fn assess(order: &WatchedOrder, fill: &OrderFill) -> FillAssessment {
    let mut fallback_applied = false;
    let delta = if fill.role == TradeRole::Maker
        && fill.matched_amount.is_zero()
        && fill.trade_size > Decimal::ZERO
    {
        fallback_applied = true;
        tracing::warn!(
            order_id = %fill.order_id,
            trade_id = %fill.trade_id,
            trade_size = %fill.trade_size,
            "Maker matched-amount reported zero for a matched trade, using trade size"
        );
        fill.trade_size
    } else {
        fill.matched_amount
    };

    let uncapped = order.cumulative_filled + delta;
    let new_cumulative = uncapped.min(order.original_size);
    let applied_delta = new_cumulative - order.cumulative_filled;

    let status = if order.original_size > Decimal::ZERO && new_cumulative >= order.original_size {
        OrderStatus::Filled
    } else if new_cumulative > Decimal::ZERO {
        OrderStatus::PartiallyFilled
    } else {
        order.status
    };

    FillAssessment {
        delta: applied_delta,
        new_cumulative,
        status,
        fallback_applied,
    }
}
