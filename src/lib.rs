//! polywatch - order-lifecycle reconciliation for a CLOB venue.
//!
//! Maintains one authoritative view of every order the caller has placed
//! against a remote matching venue, fed concurrently by a push feed
//! (user WebSocket channel) and a pull feed (periodic REST snapshots).
//! Either feed may deliver events out of order, duplicated, delayed, or
//! with missing/zeroed fields; the engine still produces a monotonic
//! order state machine and correct cumulative fill accounting.

pub mod config;
pub mod logging;
pub mod orders;
pub mod reconcile;
pub mod types;
pub mod venue;
pub mod watcher;

pub use config::WatcherConfig;
pub use orders::{OrderId, OrderStatus, TradeId, WatchedOrder};
pub use watcher::OrderWatcher;
