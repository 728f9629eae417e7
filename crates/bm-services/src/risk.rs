//! PV01 risk per product, recomputed from each position change, with
//! incremental sector totals.

use std::sync::{Arc, Mutex};

use bm_core::{
    BucketedRisk, PV01, Position, Result, SectorMap,
    soa::{Notify, Service, ServiceCore, ServiceListener, lock},
};

use crate::sector::{RiskContribution, SectorBook};

pub struct RiskService {
    core: ServiceCore<PV01>,
    buckets: SectorBook<RiskContribution>,
    /// Held across store update, notify and bucket publish.
    changes: Mutex<()>,
}

fn contribution(risk: &PV01) -> RiskContribution {
    RiskContribution { pv01: risk.total(), quantity: risk.quantity }
}

impl RiskService {
    pub fn new(sectors: Arc<SectorMap>) -> Self {
        Self { core: ServiceCore::new(), buckets: SectorBook::new(sectors), changes: Mutex::new(()) }
    }

    /// Rebuild the product's PV01 from its aggregate position.
    pub fn add_position(&self, position: &Position) {
        self.on_message(PV01 {
            product: position.product.clone(),
            pv01: position.product.pv01,
            quantity: position.aggregate(),
        });
    }

    /// Summed dollar PV01 and quantity of every product in `sector`.
    pub fn bucketed_risk(&self, sector: &str) -> Result<BucketedRisk> {
        self.buckets.bucket(sector)
    }

    pub fn add_bucket_listener(&self, listener: Arc<dyn ServiceListener<BucketedRisk>>) {
        self.buckets.add_listener(listener);
    }
}

impl Service<str, PV01> for RiskService {
    fn get_data(&self, key: &str) -> Result<PV01> {
        self.core.get(key)
    }

    fn on_message(&self, risk: PV01) {
        let _change = lock(&self.changes);
        let mut bucket = None;
        let stored = self.core.update_with(
            risk.product_id(),
            || risk.clone(),
            |r| {
                *r = risk.clone();
                bucket = self.buckets.apply(r.product_id(), contribution(r));
            },
        );
        self.core.notify(&stored, Notify::Update);
        if let Some(b) = bucket {
            self.buckets.publish(&b);
        }
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<PV01>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<PV01>>> {
        self.core.listeners()
    }
}

impl ServiceListener<Position> for RiskService {
    fn process_add(&self, position: &Position) {
        self.add_position(position);
    }

    fn process_update(&self, position: &Position) {
        self.add_position(position);
    }
}

#[cfg(test)]
mod tests {
    use bm_core::{ProductRepository, config::{default_products, default_sectors}};

    use super::*;

    #[test]
    fn pv01_follows_aggregate_position() {
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        let risk = RiskService::new(Arc::new(SectorMap::from_config(&default_sectors())));

        let mut p10 = Position::new(repo.get("10Y").unwrap());
        p10.add_position("TRSY1", 2_000_000);
        p10.add_position("TRSY2", -500_000);
        p10.add_position("TRSY4", 100_000);
        risk.add_position(&p10);

        let r = risk.get_data("10Y").unwrap();
        assert_eq!(r.pv01, 0.085);
        assert_eq!(r.quantity, 1_600_000);

        let mut p5 = Position::new(repo.get("5Y").unwrap());
        p5.add_position("TRSY1", 1_000_000);
        risk.add_position(&p5);

        let belly = risk.bucketed_risk("Belly").unwrap();
        assert_eq!(belly.quantity, 2_600_000);
        assert!((belly.pv01 - (0.085 * 1_600_000.0 + 0.045 * 1_000_000.0)).abs() < 1e-6);

        // A later position replaces, not adds to, the product's contribution.
        p10.set_position("TRSY1", 0);
        risk.add_position(&p10);
        let belly = risk.bucketed_risk("Belly").unwrap();
        assert_eq!(belly.quantity, 1_000_000 - 400_000);
    }
}
