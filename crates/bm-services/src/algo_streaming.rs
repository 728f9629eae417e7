//! Turn each internal price into a two-sided stream.
//!
//! bid = mid - spread/2, offer = mid + spread/2. The visible size alternates
//! between two configured sizes on every update, whatever the product;
//! hidden size is always twice the visible.

use std::sync::{Arc, Mutex};

use bm_core::{
    Price, PriceStream, PriceStreamOrder, PricingSide, Result,
    soa::{Notify, Service, ServiceCore, ServiceListener, lock},
};

/// A price stream produced by the algo, keyed by product id.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgoStream {
    pub price_stream: PriceStream,
}

pub struct AlgoStreamingService {
    core: ServiceCore<AlgoStream>,
    sizes: [i64; 2],
    next: Mutex<usize>,
}

impl AlgoStreamingService {
    pub fn new(sizes: [i64; 2]) -> Self {
        Self { core: ServiceCore::new(), sizes, next: Mutex::new(0) }
    }

    pub fn on_price(&self, price: &Price) -> AlgoStream {
        let visible = {
            let mut next = lock(&self.next);
            let v = self.sizes[*next];
            *next ^= 1;
            v
        };
        let half = price.bid_offer_spread / 2.0;
        let order = |px: f64, side: PricingSide| PriceStreamOrder {
            price: px,
            visible_quantity: visible,
            hidden_quantity: 2 * visible,
            side,
        };

        let stream = AlgoStream {
            price_stream: PriceStream {
                product: price.product.clone(),
                bid_order: order(price.mid - half, PricingSide::Bid),
                offer_order: order(price.mid + half, PricingSide::Offer),
            },
        };
        self.core.replace(price.product_id().to_string(), stream.clone(), Notify::Add);
        stream
    }
}

impl Service<str, AlgoStream> for AlgoStreamingService {
    fn get_data(&self, key: &str) -> Result<AlgoStream> {
        self.core.get(key)
    }

    fn on_message(&self, stream: AlgoStream) {
        self.core.replace(stream.price_stream.product_id().to_string(), stream, Notify::Update);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<AlgoStream>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<AlgoStream>>> {
        self.core.listeners()
    }
}

impl ServiceListener<Price> for AlgoStreamingService {
    fn process_add(&self, price: &Price) {
        self.on_price(price);
    }

    fn process_update(&self, price: &Price) {
        self.on_price(price);
    }
}

#[cfg(test)]
mod tests {
    use bm_core::{ProductRepository, config::default_products};

    use super::*;

    #[test]
    fn two_sided_with_alternating_size() {
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        let algo = AlgoStreamingService::new([1_000_000, 2_000_000]);

        let s1 = algo.on_price(&Price::new(repo.get("2Y").unwrap(), 100.0, 1.0 / 64.0)).price_stream;
        let s2 = algo.on_price(&Price::new(repo.get("30Y").unwrap(), 99.5, 1.0 / 128.0)).price_stream;
        let s3 = algo.on_price(&Price::new(repo.get("2Y").unwrap(), 100.0, 1.0 / 64.0)).price_stream;

        assert_eq!(s1.bid_order.price, 100.0 - 1.0 / 128.0);
        assert_eq!(s1.offer_order.price, 100.0 + 1.0 / 128.0);
        assert_eq!(s1.bid_order.side, PricingSide::Bid);
        assert_eq!(s1.offer_order.side, PricingSide::Offer);

        assert_eq!(s1.bid_order.visible_quantity, 1_000_000);
        assert_eq!(s2.offer_order.visible_quantity, 2_000_000);
        assert_eq!(s3.bid_order.visible_quantity, 1_000_000);
        assert_eq!(s2.bid_order.hidden_quantity, 4_000_000);
        assert_eq!(algo.get_data("30Y").unwrap().price_stream, s2);
    }
}
