//! Status mapping from venue-observed fields to canonical statuses.
//!
//! The venue's status token and size fields can disagree: a fully-matched
//! order is sometimes still labeled "live", and size fields are sometimes
//! absent or zeroed. The mapper resolves these by trusting the size fields
//! over the textual status.

use rust_decimal::Decimal;

use super::types::OrderStatus;

/// Map a venue-observed status token plus size fields into one canonical
/// order status.
///
/// Rules, in priority order:
/// 1. `size_matched > 0` and `size_matched >= original_size` -> Filled,
///    regardless of the textual status.
/// 2. `0 < size_matched < original_size` -> PartiallyFilled.
/// 3. Explicit cancelled / expired / delayed tokens map 1:1.
/// 4. No fills and no recognized terminal status -> Open.
/// 5. Unrecognized tokens -> Open (an order is never silently dropped
///    from tracking because the venue invented a status).
///
/// `Rejected` is never produced here: it is assigned locally when
/// pre-flight validation fails, before the order reaches the venue.
///
/// Absent fields are the caller's concern: pass `None` for a missing
/// status (treated as live) and `Decimal::ZERO` for missing sizes.
pub fn map_status(raw: Option<&str>, original_size: Decimal, size_matched: Decimal) -> OrderStatus {
    // Size fields win over the textual status.
    if size_matched > Decimal::ZERO {
        if size_matched >= original_size {
            return OrderStatus::Filled;
        }
        return OrderStatus::PartiallyFilled;
    }

    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("cancelled") | Some("canceled") => OrderStatus::Cancelled,
        Some("expired") => OrderStatus::Expired,
        // Submitted but not yet active in the book.
        Some("delayed") => OrderStatus::Pending,
        Some("live") | Some("matched") | None => OrderStatus::Open,
        Some(other) => {
            tracing::debug!(status = other, "Unrecognized venue status, mapping to OPEN");
            OrderStatus::Open
        }
    }
}
