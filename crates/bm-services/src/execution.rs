//! Execution orders routed to a venue and published downstream.

use std::sync::{Arc, PoisonError, RwLock};

use bm_core::{
    ExecutionOrder, Market, Result,
    soa::{Connector, Notify, Service, ServiceCore, ServiceListener},
};
use tracing::{info, warn};

/// Latest execution order per product, with an optional outbound connector.
#[derive(Default)]
pub struct ExecutionService {
    core: ServiceCore<ExecutionOrder>,
    connector: RwLock<Option<Arc<dyn Connector<ExecutionOrder>>>>,
}

impl ExecutionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connector(&self, connector: Arc<dyn Connector<ExecutionOrder>>) {
        *self.connector.write().unwrap_or_else(PoisonError::into_inner) = Some(connector);
    }

    /// Store the order, notify listeners with `process_add`, then publish.
    pub fn execute_order(&self, order: ExecutionOrder, market: Market) {
        info!(
            "[execution] {} {} {} {}x{} on {}",
            order.order_id,
            order.product_id(),
            order.side,
            order.price,
            order.visible_quantity,
            market
        );
        self.core.replace(order.product_id().to_string(), order.clone(), Notify::Add);

        let connector = self.connector.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(c) = connector
            && let Err(e) = c.publish(&order)
        {
            warn!("[execution] publish {} failed: {e}", order.order_id);
        }
    }
}

impl Service<str, ExecutionOrder> for ExecutionService {
    fn get_data(&self, key: &str) -> Result<ExecutionOrder> {
        self.core.get(key)
    }

    /// Store without routing; orders are only ever sent via `execute_order`.
    fn on_message(&self, order: ExecutionOrder) {
        self.core.replace(order.product_id().to_string(), order, Notify::Update);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<ExecutionOrder>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<ExecutionOrder>>> {
        self.core.listeners()
    }
}
