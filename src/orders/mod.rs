//! Order Lifecycle Module
//!
//! The leaf components of the reconciliation engine:
//!
//! - `status` - pure mapping from venue-observed fields to canonical statuses
//! - `fill` - incremental fill accounting with the maker-zero fallback
//! - `registry` - thread-safe store of watched orders with mutation rules
//! - Core types - `OrderId`, `TradeId`, `OrderStatus`, `WatchedOrder`

mod fill;
mod registry;
mod status;
mod types;

pub use fill::{assess, FillAssessment, OrderFill, TradeRole};
pub use registry::{ApplyOutcome, OrderPatch, OrderRegistry, RegisterOutcome};
pub use status::map_status;
pub use types::{OrderId, OrderStatus, TradeId, WatchedOrder};
