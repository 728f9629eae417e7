//! Order book store fed by the shared-memory market data queue.

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use bm_core::{
    BidOffer, MeshError, Order, OrderBook, Result,
    soa::{Notify, Service, ServiceCore, ServiceListener, lock},
};

/// Latest full-depth book per product, plus a best bid/offer cache.
#[derive(Default)]
pub struct MarketDataService {
    core: ServiceCore<OrderBook>,
    best: Mutex<AHashMap<String, BidOffer>>,
}

impl MarketDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top of book as of the last two-sided update for `product_id`.
    pub fn best_bid_offer(&self, product_id: &str) -> Result<BidOffer> {
        lock(&self.best)
            .get(product_id)
            .copied()
            .ok_or_else(|| MeshError::UnknownKey(product_id.to_string()))
    }

    /// Book for `product_id` with equal-priced levels merged, keeping the
    /// producer's best-first order.
    pub fn aggregate_depth(&self, product_id: &str) -> Result<OrderBook> {
        let book = self.core.get(product_id)?;
        Ok(OrderBook::new(book.product.clone(), merge_levels(&book.bid_stack), merge_levels(&book.offer_stack)))
    }
}

fn merge_levels(stack: &[Order]) -> Vec<Order> {
    let mut out: Vec<Order> = Vec::with_capacity(stack.len());
    for level in stack {
        match out.iter_mut().find(|o| o.price == level.price) {
            Some(existing) => existing.quantity += level.quantity,
            None => out.push(*level),
        }
    }
    out
}

impl Service<str, OrderBook> for MarketDataService {
    fn get_data(&self, key: &str) -> Result<OrderBook> {
        self.core.get(key)
    }

    fn on_message(&self, book: OrderBook) {
        // A one-sided book keeps the previous top of book.
        if let Some(bo) = book.best_bid_offer() {
            lock(&self.best).insert(book.product_id().to_string(), bo);
        }
        self.core.replace(book.product_id().to_string(), book, Notify::Update);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<OrderBook>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<OrderBook>>> {
        self.core.listeners()
    }
}
