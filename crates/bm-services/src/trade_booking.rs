//! Booked trades keyed by trade id.
//!
//! Trades arrive from the TCP trade feed and from filled execution orders;
//! both paths report to listeners through `process_add`.

use std::sync::Arc;

use bm_core::{
    Result, Trade,
    soa::{Notify, Service, ServiceCore, ServiceListener},
};
use tracing::debug;

#[derive(Default)]
pub struct TradeBookingService {
    core: ServiceCore<Trade>,
}

impl TradeBookingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book_trade(&self, trade: Trade) {
        debug!("[trade_booking] {} {} {} {} in {}", trade.trade_id, trade.product_id(), trade.side, trade.quantity, trade.book);
        self.core.replace(trade.trade_id.clone(), trade, Notify::Add);
    }

    /// Number of distinct trade ids booked so far.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }
}

impl Service<str, Trade> for TradeBookingService {
    fn get_data(&self, key: &str) -> Result<Trade> {
        self.core.get(key)
    }

    fn on_message(&self, trade: Trade) {
        self.book_trade(trade);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<Trade>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<Trade>>> {
        self.core.listeners()
    }
}
