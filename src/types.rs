//! Common Types Module
//!
//! Shared types used across the codebase to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse a venue side token. The user channel sends upper-case tokens.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Time-in-force / order type supported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Good-Till-Cancelled: rests in the book until cancelled.
    Gtc,
    /// Good-Till-Date: rests until the expiration timestamp.
    Gtd,
    /// Fill-Or-Kill: fills in full immediately or is cancelled.
    Fok,
    /// Fill-And-Kill: fills what it can immediately, rest is cancelled.
    Fak,
}

impl OrderType {
    /// Parse a venue order-type token, defaulting to GTC when absent
    /// or unrecognized (the venue omits the field for plain limit orders).
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_uppercase).as_deref() {
            Some("GTD") => OrderType::Gtd,
            Some("FOK") => OrderType::Fok,
            Some("FAK") => OrderType::Fak,
            _ => OrderType::Gtc,
        }
    }

    /// Immediate-or-cancel types never rest in the book: they may jump
    /// straight from Pending to Filled or Cancelled without an Open phase.
    pub fn is_immediate(&self) -> bool {
        matches!(self, OrderType::Fok | OrderType::Fak)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Gtc => write!(f, "GTC"),
            OrderType::Gtd => write!(f, "GTD"),
            OrderType::Fok => write!(f, "FOK"),
            OrderType::Fak => write!(f, "FAK"),
        }
    }
}

/// Which feeds are authoritative for a watched order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMode {
    /// Only the WebSocket user channel drives updates.
    PushOnly,
    /// Only periodic REST snapshots drive updates. This is a full
    /// substitute for the push feed, not a degraded approximation.
    PollOnly,
    /// Both feeds are active; whichever arrives first wins.
    Hybrid,
}

impl SourceMode {
    pub fn accepts_push(&self) -> bool {
        matches!(self, SourceMode::PushOnly | SourceMode::Hybrid)
    }

    pub fn accepts_poll(&self) -> bool {
        matches!(self, SourceMode::PollOnly | SourceMode::Hybrid)
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::PushOnly => write!(f, "push-only"),
            SourceMode::PollOnly => write!(f, "poll-only"),
            SourceMode::Hybrid => write!(f, "hybrid"),
        }
    }
}
