//! Internal mid/spread prices, one per product.

use std::sync::Arc;

use bm_core::{
    Price, Result,
    soa::{Notify, Service, ServiceCore, ServiceListener},
};

#[derive(Default)]
pub struct PricingService {
    core: ServiceCore<Price>,
}

impl PricingService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<str, Price> for PricingService {
    fn get_data(&self, key: &str) -> Result<Price> {
        self.core.get(key)
    }

    fn on_message(&self, price: Price) {
        self.core.replace(price.product_id().to_string(), price, Notify::Update);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<Price>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<Price>>> {
        self.core.listeners()
    }
}
