//! Listener edges that carry one service's output into the next service.
//!
//! Each bridge owns a handle to the downstream service only, so the graph
//! holds no ownership cycle even where the data flow loops back.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bm_core::{
    ExecutionOrder, Market, MeshError, Result, Trade,
    soa::ServiceListener,
};
use tracing::debug;

use crate::{
    algo_execution::AlgoExecution, algo_streaming::AlgoStream, execution::ExecutionService,
    streaming::StreamingService, trade_booking::TradeBookingService,
};

// ---------------------------------------------------------------------------
// Algo execution -> execution
// ---------------------------------------------------------------------------

/// Routes every new algo order to the execution service on `market`.
pub struct AlgoExecutionToExecution {
    execution: Arc<ExecutionService>,
    market: Market,
}

impl AlgoExecutionToExecution {
    pub fn new(execution: Arc<ExecutionService>, market: Market) -> Self {
        Self { execution, market }
    }
}

impl ServiceListener<AlgoExecution> for AlgoExecutionToExecution {
    fn process_add(&self, algo: &AlgoExecution) {
        self.execution.execute_order(algo.order.clone(), self.market);
    }

    fn process_update(&self, _algo: &AlgoExecution) {}
}

// ---------------------------------------------------------------------------
// Algo streaming -> streaming
// ---------------------------------------------------------------------------

pub struct AlgoStreamToStreaming {
    streaming: Arc<StreamingService>,
}

impl AlgoStreamToStreaming {
    pub fn new(streaming: Arc<StreamingService>) -> Self {
        Self { streaming }
    }
}

impl ServiceListener<AlgoStream> for AlgoStreamToStreaming {
    fn process_add(&self, algo: &AlgoStream) {
        self.streaming.publish_price(algo.price_stream.clone());
    }

    fn process_update(&self, _algo: &AlgoStream) {}
}

// ---------------------------------------------------------------------------
// Execution -> trade booking
// ---------------------------------------------------------------------------

/// Books every executed order as a trade.
///
/// Trade ids run `EXEC_TRADE_1`, `EXEC_TRADE_2`, ...; books are used round
/// robin. Aggressing the offer books a BUY, hitting the bid a SELL, for the
/// order's visible quantity.
pub struct ExecutionToTradeBooking {
    trade_booking: Arc<TradeBookingService>,
    books: Vec<String>,
    seq: AtomicU64,
}

impl ExecutionToTradeBooking {
    pub fn new(trade_booking: Arc<TradeBookingService>, books: Vec<String>) -> Result<Self> {
        if books.is_empty() {
            return Err(MeshError::Config("execution bridge needs at least one book".into()));
        }
        Ok(Self { trade_booking, books, seq: AtomicU64::new(0) })
    }

    fn to_trade(&self, order: &ExecutionOrder) -> Trade {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let book = &self.books[(n % self.books.len() as u64) as usize];
        Trade {
            product: order.product.clone(),
            trade_id: format!("EXEC_TRADE_{}", n + 1),
            price: order.price,
            book: book.clone(),
            quantity: order.visible_quantity,
            side: order.side.aggressor_side(),
        }
    }
}

impl ServiceListener<ExecutionOrder> for ExecutionToTradeBooking {
    fn process_add(&self, order: &ExecutionOrder) {
        let trade = self.to_trade(order);
        debug!("[exec_bridge] {} -> {} {} {}", order.order_id, trade.trade_id, trade.side, trade.book);
        self.trade_booking.book_trade(trade);
    }

    /// Re-stored orders were already booked when first executed.
    fn process_update(&self, _order: &ExecutionOrder) {}
}

#[cfg(test)]
mod tests {
    use bm_core::{OrderType, PricingSide, ProductRepository, Side, config::default_products, soa::Service};

    use super::*;

    fn order(repo: &ProductRepository, side: PricingSide, qty: i64) -> ExecutionOrder {
        ExecutionOrder {
            product: repo.get("3Y").unwrap(),
            side,
            order_id: "3Y_EXE_1".into(),
            order_type: OrderType::Market,
            price: 99.75,
            visible_quantity: qty,
            hidden_quantity: 0,
            parent_order_id: None,
            is_child_order: false,
        }
    }

    #[test]
    fn executions_become_trades_round_robin() {
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        let tb = Arc::new(TradeBookingService::new());
        let bridge = ExecutionToTradeBooking::new(tb.clone(), vec!["TRSY1".into(), "TRSY2".into()]).unwrap();

        bridge.process_add(&order(&repo, PricingSide::Offer, 10));
        bridge.process_add(&order(&repo, PricingSide::Bid, 20));
        bridge.process_add(&order(&repo, PricingSide::Offer, 30));
        bridge.process_update(&order(&repo, PricingSide::Offer, 40));

        assert_eq!(tb.len(), 3);
        let t1 = tb.get_data("EXEC_TRADE_1").unwrap();
        assert_eq!((t1.side, t1.book.as_str(), t1.quantity), (Side::Buy, "TRSY1", 10));
        let t2 = tb.get_data("EXEC_TRADE_2").unwrap();
        assert_eq!((t2.side, t2.book.as_str(), t2.quantity), (Side::Sell, "TRSY2", 20));
        assert_eq!(tb.get_data("EXEC_TRADE_3").unwrap().book, "TRSY1");
    }

    #[test]
    fn empty_book_list_rejected() {
        let tb = Arc::new(TradeBookingService::new());
        assert!(matches!(ExecutionToTradeBooking::new(tb, Vec::new()), Err(MeshError::Config(_))));
    }
}
