//! Aggress the book whenever its spread is at the tight threshold.
//!
//! One global flag alternates the aggressed side across every product:
//! OFFER (buy), then BID (sell), then OFFER again. Books with any other
//! spread, or with an empty side, are skipped.

use std::sync::{Arc, Mutex};

use bm_core::{
    ExecutionOrder, OrderBook, OrderType, PricingSide, Result,
    soa::{Notify, Service, ServiceCore, ServiceListener, lock},
};
use tracing::debug;

/// An execution order produced by the algo, keyed by product id.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgoExecution {
    pub order: ExecutionOrder,
}

struct AlgoState {
    next_side: PricingSide,
    seq: u64,
}

pub struct AlgoExecutionService {
    core: ServiceCore<AlgoExecution>,
    tight_spread: f64,
    tolerance: f64,
    state: Mutex<AlgoState>,
}

impl AlgoExecutionService {
    pub fn new(tight_spread: f64, tolerance: f64) -> Self {
        Self {
            core: ServiceCore::new(),
            tight_spread,
            tolerance,
            state: Mutex::new(AlgoState { next_side: PricingSide::Offer, seq: 1 }),
        }
    }

    /// Emit at most one order for `book`.
    pub fn on_book(&self, book: &OrderBook) -> Option<AlgoExecution> {
        let bo = book.best_bid_offer()?;
        if (bo.spread() - self.tight_spread).abs() > self.tolerance {
            return None;
        }

        let (side, seq) = {
            let mut st = lock(&self.state);
            let side = st.next_side;
            st.next_side = match side {
                PricingSide::Offer => PricingSide::Bid,
                PricingSide::Bid => PricingSide::Offer,
            };
            let seq = st.seq;
            st.seq += 1;
            (side, seq)
        };
        let level = match side {
            PricingSide::Offer => bo.offer,
            PricingSide::Bid => bo.bid,
        };

        let pid = book.product_id();
        let algo = AlgoExecution {
            order: ExecutionOrder {
                product: book.product.clone(),
                side,
                order_id: format!("{pid}_EXE_{seq}"),
                order_type: OrderType::Market,
                price: level.price,
                visible_quantity: level.quantity,
                hidden_quantity: 0,
                parent_order_id: None,
                is_child_order: false,
            },
        };
        debug!("[algo_exec] {} aggress {} {}x{}", algo.order.order_id, side, level.price, level.quantity);
        self.core.replace(pid.to_string(), algo.clone(), Notify::Add);
        Some(algo)
    }
}

impl Service<str, AlgoExecution> for AlgoExecutionService {
    fn get_data(&self, key: &str) -> Result<AlgoExecution> {
        self.core.get(key)
    }

    fn on_message(&self, algo: AlgoExecution) {
        self.core.replace(algo.order.product_id().to_string(), algo, Notify::Update);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<AlgoExecution>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<AlgoExecution>>> {
        self.core.listeners()
    }
}

impl ServiceListener<OrderBook> for AlgoExecutionService {
    fn process_add(&self, book: &OrderBook) {
        self.on_book(book);
    }

    fn process_update(&self, book: &OrderBook) {
        self.on_book(book);
    }
}
