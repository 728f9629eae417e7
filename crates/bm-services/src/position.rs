//! Per-product positions built from booked trades, with incremental
//! sector totals.

use std::sync::{Arc, Mutex};

use bm_core::{
    BucketedPosition, Position, Result, SectorMap, Trade,
    soa::{Notify, Service, ServiceCore, ServiceListener, lock},
};

use crate::sector::SectorBook;

/// Trades arrive from the TCP feed and from the shm execution chain at the
/// same time. `changes` is held from the store update until the last
/// listener has seen it, so listeners observe changes in commit order.
pub struct PositionService {
    core: ServiceCore<Position>,
    buckets: SectorBook<i64>,
    changes: Mutex<()>,
}

impl PositionService {
    pub fn new(sectors: Arc<SectorMap>) -> Self {
        Self { core: ServiceCore::new(), buckets: SectorBook::new(sectors), changes: Mutex::new(()) }
    }

    /// Apply a trade to its book: BUY adds the quantity, SELL subtracts it.
    pub fn add_trade(&self, trade: &Trade) {
        let _change = lock(&self.changes);
        let mut bucket = None;
        let position = self.core.update_with(
            trade.product_id(),
            || Position::new(trade.product.clone()),
            |p| {
                p.add_position(&trade.book, trade.signed_quantity());
                bucket = self.buckets.apply(p.product_id(), p.aggregate());
            },
        );
        self.core.notify(&position, Notify::Update);
        if let Some(b) = bucket {
            self.buckets.publish(&b);
        }
    }

    /// Aggregate position of every product in `sector`.
    pub fn bucketed_position(&self, sector: &str) -> Result<BucketedPosition> {
        self.buckets.bucket(sector)
    }

    /// Listeners added here receive every bucket total change.
    pub fn add_bucket_listener(&self, listener: Arc<dyn ServiceListener<BucketedPosition>>) {
        self.buckets.add_listener(listener);
    }
}

impl Service<str, Position> for PositionService {
    fn get_data(&self, key: &str) -> Result<Position> {
        self.core.get(key)
    }

    /// Replace a product's position wholesale.
    fn on_message(&self, position: Position) {
        let _change = lock(&self.changes);
        let mut bucket = None;
        let stored = self.core.update_with(
            position.product_id(),
            || position.clone(),
            |p| {
                *p = position.clone();
                bucket = self.buckets.apply(p.product_id(), p.aggregate());
            },
        );
        self.core.notify(&stored, Notify::Update);
        if let Some(b) = bucket {
            self.buckets.publish(&b);
        }
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<Position>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<Position>>> {
        self.core.listeners()
    }
}

impl ServiceListener<Trade> for PositionService {
    fn process_add(&self, trade: &Trade) {
        self.add_trade(trade);
    }

    fn process_update(&self, trade: &Trade) {
        self.add_trade(trade);
    }
}
