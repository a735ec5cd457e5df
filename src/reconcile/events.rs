//! Feed boundary: venue payloads parsed into a closed set of variants.
//!
//! The venue sends loosely-typed JSON: decimals as strings, optional
//! fields, and occasional spurious zeros. Everything is validated here;
//! the status mapper and fill accountant never see raw payloads.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::orders::{OrderId, TradeId};
use crate::types::Side;

/// Errors raised while validating a raw feed payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unparseable decimal in field {field}: {value:?}")]
    BadDecimal { field: &'static str, value: String },

    #[error("Unknown order event type: {0}")]
    UnknownEventType(String),

    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

fn parse_decimal(field: &'static str, value: Option<&str>) -> Result<Decimal, ParseError> {
    match value {
        // Absent or empty size fields are a known venue quirk, treated as zero.
        None | Some("") => Ok(Decimal::ZERO),
        Some(v) => v.parse().map_err(|_| ParseError::BadDecimal {
            field,
            value: v.to_string(),
        }),
    }
}

fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

// ============================================================================
// Raw wire format (user channel / REST)
// ============================================================================

/// Order message as delivered on the venue's user channel.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderMessage {
    pub id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub original_size: Option<String>,
    #[serde(default)]
    pub size_matched: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Maker participant inside a trade message.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMakerOrder {
    pub order_id: String,
    #[serde(default)]
    pub matched_amount: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub asset_id: String,
}

/// Trade message as delivered on the venue's user channel.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTradeMessage {
    pub id: String,
    #[serde(default)]
    pub taker_order_id: Option<String>,
    #[serde(default)]
    pub maker_orders: Vec<RawMakerOrder>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Per-order snapshot returned by the REST poll.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderSnapshot {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub original_size: Option<String>,
    #[serde(default)]
    pub size_matched: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
}

// ============================================================================
// Validated events
// ============================================================================

/// Order event kind on the push feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventType {
    Placement,
    Update,
    Cancellation,
}

impl OrderEventType {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.to_ascii_uppercase().as_str() {
            "PLACEMENT" => Ok(Self::Placement),
            "UPDATE" => Ok(Self::Update),
            "CANCELLATION" => Ok(Self::Cancellation),
            other => Err(ParseError::UnknownEventType(other.to_string())),
        }
    }
}

/// Validated push-feed order event.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub market: String,
    pub asset_id: String,
    pub side: Option<Side>,
    pub price: Decimal,
    pub original_size: Decimal,
    pub size_matched: Decimal,
    pub status: Option<String>,
    pub event_type: OrderEventType,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<RawOrderMessage> for OrderUpdate {
    type Error = ParseError;

    fn try_from(raw: RawOrderMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: OrderId::new(raw.id),
            market: raw.market,
            asset_id: raw.asset_id,
            side: Side::parse(&raw.side),
            price: parse_decimal("price", raw.price.as_deref())?,
            original_size: parse_decimal("original_size", raw.original_size.as_deref())?,
            size_matched: parse_decimal("size_matched", raw.size_matched.as_deref())?,
            status: raw.status,
            event_type: OrderEventType::parse(&raw.event_type)?,
            timestamp: parse_timestamp(raw.timestamp.as_deref()),
        })
    }
}

/// Venue-side settlement status of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Matched,
    Mined,
    Confirmed,
    Retrying,
    Failed,
}

impl TradeStatus {
    /// Parse a venue trade status, defaulting to Matched for unknown
    /// tokens: a trade event exists because a match happened.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "MINED" => Self::Mined,
            "CONFIRMED" => Self::Confirmed,
            "RETRYING" => Self::Retrying,
            "FAILED" => Self::Failed,
            _ => Self::Matched,
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matched => write!(f, "MATCHED"),
            Self::Mined => write!(f, "MINED"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Retrying => write!(f, "RETRYING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Maker participant in a validated trade event.
#[derive(Debug, Clone)]
pub struct MakerFill {
    pub order_id: OrderId,
    pub matched_amount: Decimal,
    pub price: Decimal,
    pub asset_id: String,
}

/// Validated push-feed trade event. Created on receipt, never mutated.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    pub trade_id: TradeId,
    pub taker_order_id: Option<OrderId>,
    pub maker_fills: Vec<MakerFill>,
    /// Overall trade size; the maker-zero fallback uses this.
    pub size: Decimal,
    pub price: Decimal,
    pub status: TradeStatus,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<RawTradeMessage> for TradeEvent {
    type Error = ParseError;

    fn try_from(raw: RawTradeMessage) -> Result<Self, Self::Error> {
        let maker_fills = raw
            .maker_orders
            .into_iter()
            .map(|m| {
                Ok(MakerFill {
                    order_id: OrderId::new(m.order_id),
                    matched_amount: parse_decimal("matched_amount", m.matched_amount.as_deref())?,
                    price: parse_decimal("price", m.price.as_deref())?,
                    asset_id: m.asset_id,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(Self {
            trade_id: TradeId::new(raw.id),
            taker_order_id: raw.taker_order_id.filter(|s| !s.is_empty()).map(OrderId::new),
            maker_fills,
            size: parse_decimal("size", raw.size.as_deref())?,
            price: parse_decimal("price", raw.price.as_deref())?,
            status: TradeStatus::parse(&raw.status),
            timestamp: parse_timestamp(raw.timestamp.as_deref()),
        })
    }
}

/// Validated poll-feed snapshot of a single order.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub status: Option<String>,
    pub original_size: Decimal,
    pub size_matched: Decimal,
    pub asset_id: Option<String>,
}

impl TryFrom<RawOrderSnapshot> for OrderSnapshot {
    type Error = ParseError;

    fn try_from(raw: RawOrderSnapshot) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: OrderId::new(raw.id),
            status: raw.status,
            original_size: parse_decimal("original_size", raw.original_size.as_deref())?,
            size_matched: parse_decimal("size_matched", raw.size_matched.as_deref())?,
            asset_id: raw.asset_id.filter(|s| !s.is_empty()),
        })
    }
}

/// Tagged union of everything the engine consumes.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Order(OrderUpdate),
    Trade(TradeEvent),
    Snapshot(OrderSnapshot),
}
