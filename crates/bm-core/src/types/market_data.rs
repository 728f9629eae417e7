//! Market data records: internal prices and order books.

use std::sync::Arc;

use super::{enums::PricingSide, product::Bond};

/// One price level on one side of a book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Order {
    pub price: f64,
    pub quantity: i64,
    pub side: PricingSide,
}

impl Order {
    pub fn new(price: f64, quantity: i64, side: PricingSide) -> Self {
        Self { price, quantity, side }
    }
}

/// Top of book: best bid and best offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidOffer {
    pub bid: Order,
    pub offer: Order,
}

impl BidOffer {
    #[inline]
    pub fn spread(&self) -> f64 {
        self.offer.price - self.bid.price
    }
}

/// Full-depth order book snapshot for one product.
///
/// Levels arrive sorted best-first from the producer: `bid_stack[0]` is the
/// highest bid and `offer_stack[0]` the lowest offer. The book never
/// re-sorts.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    pub product: Arc<Bond>,
    pub bid_stack: Vec<Order>,
    pub offer_stack: Vec<Order>,
}

impl OrderBook {
    pub fn new(product: Arc<Bond>, bid_stack: Vec<Order>, offer_stack: Vec<Order>) -> Self {
        Self { product, bid_stack, offer_stack }
    }

    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }

    /// Front of each stack, or `None` when either side is empty.
    pub fn best_bid_offer(&self) -> Option<BidOffer> {
        Some(BidOffer {
            bid: *self.bid_stack.first()?,
            offer: *self.offer_stack.first()?,
        })
    }
}

/// Internal mid/spread price for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub product: Arc<Bond>,
    pub mid: f64,
    pub bid_offer_spread: f64,
}

impl Price {
    pub fn new(product: Arc<Bond>, mid: f64, bid_offer_spread: f64) -> Self {
        Self { product, mid, bid_offer_spread }
    }

    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }
}

impl std::fmt::Display for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.best_bid_offer() {
            Some(bo) => write!(
                f,
                "Book({} bid={}x{} offer={}x{} depth={}/{})",
                self.product_id(),
                bo.bid.price,
                bo.bid.quantity,
                bo.offer.price,
                bo.offer.quantity,
                self.bid_stack.len(),
                self.offer_stack.len()
            ),
            None => write!(f, "Book({} one-sided)", self.product_id()),
        }
    }
}
