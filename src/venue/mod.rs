//! Venue Abstraction Layer
//!
//! Trait seams for the remote matching venue. Transport (REST signing,
//! WebSocket plumbing, rate limiting) lives behind these traits and is
//! provided by the embedding application; the reconciliation engine only
//! depends on the shapes defined here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::orders::OrderId;
use crate::reconcile::events::{FeedEvent, RawOrderSnapshot};
use crate::types::{OrderType, Side};

/// Errors surfaced by venue transport implementations.
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Venue API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by venue")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Parameters of a limit order, shared between submission and watching.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub market: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    /// Required iff `order_type` is GTD.
    pub expiration: Option<DateTime<Utc>>,
}

/// A limit order submission.
#[derive(Debug, Clone)]
pub struct LimitOrderRequest {
    /// Outcome token the order trades.
    pub token_id: String,
    pub spec: OrderSpec,
}

/// A market order submission. Market orders execute with fill-and-kill
/// semantics: whatever crosses immediately fills, the rest is cancelled.
#[derive(Debug, Clone)]
pub struct MarketOrderRequest {
    pub token_id: String,
    pub market: String,
    pub side: Side,
    pub size: Decimal,
}

impl MarketOrderRequest {
    /// The order spec a market order is watched under. Price is unknown
    /// until fills arrive; zero marks it as unpriced.
    pub fn as_spec(&self) -> OrderSpec {
        OrderSpec {
            market: self.market.clone(),
            side: self.side,
            price: Decimal::ZERO,
            size: self.size,
            order_type: OrderType::Fak,
            expiration: None,
        }
    }
}

/// Order entry and snapshot access against the venue's REST API.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Submit a limit order; returns the venue-assigned order id.
    async fn create_order(&self, request: &LimitOrderRequest) -> Result<OrderId, VenueError>;

    /// Submit a market order; returns the venue-assigned order id.
    async fn create_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderId, VenueError>;

    /// Request cancellation. Confirmation arrives via the feeds, not here.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), VenueError>;

    /// Fetch the venue's current view of one order (the poll feed).
    async fn order_snapshot(&self, order_id: &OrderId) -> Result<RawOrderSnapshot, VenueError>;
}

/// Push feed provider (the venue's user WebSocket channel).
///
/// Implementations parse their wire messages into `FeedEvent`s and send
/// them until the connection or the receiver closes.
#[async_trait]
pub trait PushFeed: Send + Sync {
    async fn connect_and_subscribe(
        &self,
        sender: mpsc::Sender<FeedEvent>,
    ) -> Result<(), VenueError>;
}
