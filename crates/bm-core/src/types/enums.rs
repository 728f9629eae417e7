//! Enumerations used throughout the bond service mesh.
//!
//! Each enum that crosses a wire boundary has a stable upper-case text form
//! (`Display` + `FromStr`) used by the line codec.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

// ---------------------------------------------------------------------------
// Product identifiers
// ---------------------------------------------------------------------------

/// Identifier scheme of a bond's `product_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BondIdType {
    #[default]
    Cusip,
    Isin,
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// Direction of a booked trade or a client inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Signed multiplier applied to a quantity when it hits a position.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

/// Side of a two-sided market: the bid stack or the offer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PricingSide {
    Bid,
    Offer,
}

impl PricingSide {
    /// Trade direction for an order that aggresses this side.
    ///
    /// Lifting the offer buys, hitting the bid sells.
    #[inline]
    pub fn aggressor_side(self) -> Side {
        match self {
            Self::Offer => Side::Buy,
            Self::Bid => Side::Sell,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Order type of an execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Fok,
    Ioc,
    Market,
    Limit,
    Stop,
}

/// Venue an execution order is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Market {
    BrokerTec,
    Espeed,
    Cme,
}

// ---------------------------------------------------------------------------
// Inquiry workflow
// ---------------------------------------------------------------------------

/// Lifecycle state of a client inquiry.
///
/// ```text
/// RECEIVED ──► QUOTED ──► DONE
///    │
///    ├──► REJECTED
///    └──► CUSTOMER_REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InquiryState {
    Received,
    Quoted,
    Done,
    Rejected,
    CustomerRejected,
}

impl InquiryState {
    /// Whether the workflow allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: InquiryState) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Quoted)
                | (Self::Received, Self::Rejected)
                | (Self::Received, Self::CustomerRejected)
                | (Self::Quoted, Self::Done)
        )
    }

    /// `DONE`, `REJECTED` and `CUSTOMER_REJECTED` have no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::CustomerRejected)
    }
}

// ---------------------------------------------------------------------------
// Text forms
// ---------------------------------------------------------------------------

macro_rules! text_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = MeshError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(MeshError::Parse(format!(concat!("bad ", $what, ": '{}'"), other))),
                }
            }
        }
    };
}

text_enum!(Side, "side", { Buy => "BUY", Sell => "SELL" });
text_enum!(PricingSide, "pricing side", { Bid => "BID", Offer => "OFFER" });
text_enum!(OrderType, "order type", {
    Fok => "FOK",
    Ioc => "IOC",
    Market => "MARKET",
    Limit => "LIMIT",
    Stop => "STOP",
});
text_enum!(Market, "market", { BrokerTec => "BROKERTEC", Espeed => "ESPEED", Cme => "CME" });
text_enum!(InquiryState, "inquiry state", {
    Received => "RECEIVED",
    Quoted => "QUOTED",
    Done => "DONE",
    Rejected => "REJECTED",
    CustomerRejected => "CUSTOMER_REJECTED",
});
