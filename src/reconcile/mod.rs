//! Reconciliation Module
//!
//! Merges the push feed and the poll feed into one authoritative order
//! view.
//!
//! - `events` - the feed boundary: raw venue payloads validated into a
//!   closed set of tagged variants
//! - `engine` - the serialized consumer applying events to the registry
//! - `poller` - the periodic pull feed

pub mod engine;
pub mod events;
pub mod poller;

pub use engine::{FeedSource, LifecycleEvent, LifecycleKind, ReconcileEngine};
pub use events::{
    FeedEvent, MakerFill, OrderEventType, OrderSnapshot, OrderUpdate, ParseError, RawMakerOrder,
    RawOrderMessage, RawOrderSnapshot, RawTradeMessage, TradeEvent, TradeStatus,
};
pub use poller::spawn_poller;
