//! Bond reference data and the product registry.
//!
//! The registry is built once at process start from the `products` config
//! section and is immutable afterwards. Workers share it as
//! `Arc<ProductRepository>`; nothing reaches it through a global.

use std::sync::Arc;

use ahash::AHashMap;

use super::enums::BondIdType;
use crate::{
    config::ProductConfig,
    error::{MeshError, Result},
};

/// Static description of one tradable bond.
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub product_id: String,
    pub id_type: BondIdType,
    pub ticker: String,
    pub coupon: f64,
    /// ISO date, e.g. `2035-12-31`.
    pub maturity: String,
    /// PV01 per unit of face, used by the risk service.
    pub pv01: f64,
}

impl From<&ProductConfig> for Bond {
    fn from(c: &ProductConfig) -> Self {
        Self {
            product_id: c.product_id.clone(),
            id_type: c.id_type,
            ticker: c.ticker.clone(),
            coupon: c.coupon,
            maturity: c.maturity.clone(),
            pv01: c.pv01,
        }
    }
}

/// Product lookup by id.
///
/// Bonds are handed out as `Arc<Bond>` so records can carry their product
/// without copying reference data on every tick.
#[derive(Debug, Default)]
pub struct ProductRepository {
    bonds: AHashMap<String, Arc<Bond>>,
}

impl ProductRepository {
    /// Build the registry from config entries. Duplicate ids are rejected.
    pub fn from_config(products: &[ProductConfig]) -> Result<Self> {
        let mut bonds = AHashMap::with_capacity(products.len());
        for p in products {
            if bonds.insert(p.product_id.clone(), Arc::new(Bond::from(p))).is_some() {
                return Err(MeshError::Config(format!("duplicate product id '{}'", p.product_id)));
            }
        }
        Ok(Self { bonds })
    }

    /// Look up a bond; fails with [`MeshError::UnknownProduct`] if unregistered.
    pub fn get(&self, product_id: &str) -> Result<Arc<Bond>> {
        self.bonds
            .get(product_id)
            .cloned()
            .ok_or_else(|| MeshError::UnknownProduct(product_id.to_string()))
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.bonds.contains_key(product_id)
    }

    /// Registered ids, sorted for stable iteration.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bonds.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_products;

    #[test]
    fn default_universe() {
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        assert_eq!(repo.len(), 7);
        assert_eq!(repo.get("10Y").unwrap().pv01, 0.085);
        assert!(repo.contains("30Y"));
    }

    #[test]
    fn unknown_product() {
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        match repo.get("40Y") {
            Err(MeshError::UnknownProduct(id)) => assert_eq!(id, "40Y"),
            other => panic!("expected UnknownProduct, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_rejected() {
        let mut products = default_products();
        products.push(products[0].clone());
        assert!(matches!(ProductRepository::from_config(&products), Err(MeshError::Config(_))));
    }
}
