//! Trading records: booked trades, execution orders, price streams and
//! client inquiries.

use std::sync::Arc;

use super::{
    enums::{InquiryState, OrderType, PricingSide, Side},
    product::Bond,
};

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// A trade booked into one of the trading books.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub product: Arc<Bond>,
    pub trade_id: String,
    pub price: f64,
    pub book: String,
    pub quantity: i64,
    pub side: Side,
}

impl Trade {
    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }

    /// Quantity with the trade direction applied (BUY positive).
    #[inline]
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity
    }
}

// ---------------------------------------------------------------------------
// ExecutionOrder
// ---------------------------------------------------------------------------

/// An order sent to an execution venue.
///
/// `side` is the side of the book being aggressed. Child orders carry the id
/// of their parent in `parent_order_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOrder {
    pub product: Arc<Bond>,
    pub side: PricingSide,
    pub order_id: String,
    pub order_type: OrderType,
    pub price: f64,
    pub visible_quantity: i64,
    pub hidden_quantity: i64,
    pub parent_order_id: Option<String>,
    pub is_child_order: bool,
}

impl ExecutionOrder {
    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }
}

// ---------------------------------------------------------------------------
// PriceStream
// ---------------------------------------------------------------------------

/// One side of a two-way price stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStreamOrder {
    pub price: f64,
    pub visible_quantity: i64,
    pub hidden_quantity: i64,
    pub side: PricingSide,
}

/// Two-sided quote streamed out to the market.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceStream {
    pub product: Arc<Bond>,
    pub bid_order: PriceStreamOrder,
    pub offer_order: PriceStreamOrder,
}

impl PriceStream {
    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }
}

// ---------------------------------------------------------------------------
// Inquiry
// ---------------------------------------------------------------------------

/// A client request for quote.
#[derive(Debug, Clone, PartialEq)]
pub struct Inquiry {
    pub inquiry_id: String,
    pub product: Arc<Bond>,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub state: InquiryState,
}

impl Inquiry {
    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }

    /// Copy of this inquiry moved to `state` at `price`.
    pub fn with_state(&self, price: f64, state: InquiryState) -> Self {
        Self { price, state, ..self.clone() }
    }
}
