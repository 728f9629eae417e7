//! Positions, PV01 risk, and bucketed sectors.

use std::{collections::BTreeMap, sync::Arc};

use ahash::AHashMap;

use super::product::Bond;
use crate::config::SectorConfig;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Signed position in one product, split by trading book.
///
/// Only mutated through [`add_position`](Position::add_position) and
/// [`set_position`](Position::set_position).
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub product: Arc<Bond>,
    books: BTreeMap<String, i64>,
}

impl Position {
    pub fn new(product: Arc<Bond>) -> Self {
        Self { product, books: BTreeMap::new() }
    }

    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }

    /// Position in `book`, zero if the book has never traded.
    pub fn position(&self, book: &str) -> i64 {
        self.books.get(book).copied().unwrap_or(0)
    }

    pub fn add_position(&mut self, book: &str, delta: i64) {
        *self.books.entry(book.to_string()).or_insert(0) += delta;
    }

    pub fn set_position(&mut self, book: &str, quantity: i64) {
        self.books.insert(book.to_string(), quantity);
    }

    /// Per-book positions, ordered by book name.
    pub fn books(&self) -> &BTreeMap<String, i64> {
        &self.books
    }

    /// Sum over every book.
    pub fn aggregate(&self) -> i64 {
        self.books.values().sum()
    }
}

// ---------------------------------------------------------------------------
// PV01
// ---------------------------------------------------------------------------

/// PV01 risk of one product: per-unit PV01 and the quantity it applies to.
///
/// Rebuilt wholesale on every position change.
#[derive(Debug, Clone, PartialEq)]
pub struct PV01 {
    pub product: Arc<Bond>,
    pub pv01: f64,
    pub quantity: i64,
}

impl PV01 {
    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }

    /// Dollar PV01 of the whole quantity.
    #[inline]
    pub fn total(&self) -> f64 {
        self.pv01 * self.quantity as f64
    }
}

// ---------------------------------------------------------------------------
// Bucketed sectors
// ---------------------------------------------------------------------------

/// A named group of products (e.g. front end, belly, long end).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketedSector {
    pub name: String,
    pub products: Vec<String>,
}

/// Aggregate position of a sector.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedPosition {
    pub sector: String,
    pub quantity: i64,
}

/// Aggregate risk of a sector: summed dollar PV01 and summed quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedRisk {
    pub sector: String,
    pub pv01: f64,
    pub quantity: i64,
}

/// Product id → sector lookup.
///
/// Membership is decided once from config and never changes, so
/// [`sector_of`](SectorMap::sector_of) is a pure function of the product id.
#[derive(Debug, Clone, Default)]
pub struct SectorMap {
    sectors: Vec<BucketedSector>,
    by_product: AHashMap<String, usize>,
}

impl SectorMap {
    pub fn new(sectors: Vec<BucketedSector>) -> Self {
        let mut by_product = AHashMap::new();
        for (idx, sector) in sectors.iter().enumerate() {
            for pid in &sector.products {
                by_product.insert(pid.clone(), idx);
            }
        }
        Self { sectors, by_product }
    }

    pub fn from_config(sectors: &[SectorConfig]) -> Self {
        Self::new(
            sectors
                .iter()
                .map(|s| BucketedSector { name: s.name.clone(), products: s.products.clone() })
                .collect(),
        )
    }

    /// Name of the sector holding `product_id`, if any.
    #[inline]
    pub fn sector_of(&self, product_id: &str) -> Option<&str> {
        self.by_product.get(product_id).map(|&i| self.sectors[i].name.as_str())
    }

    pub fn sectors(&self) -> &[BucketedSector] {
        &self.sectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_sectors;

    fn bond(id: &str) -> Arc<Bond> {
        Arc::new(Bond {
            product_id: id.to_string(),
            id_type: Default::default(),
            ticker: "T".into(),
            coupon: 0.045,
            maturity: "2035-12-31".into(),
            pv01: 0.085,
        })
    }

    #[test]
    fn position_books() {
        let mut p = Position::new(bond("10Y"));
        p.add_position("TRSY1", 1_000_000);
        p.add_position("TRSY2", -3_000_000);
        p.add_position("TRSY1", 500_000);
        assert_eq!(p.position("TRSY1"), 1_500_000);
        assert_eq!(p.position("TRSY3"), 0);
        assert_eq!(p.aggregate(), -1_500_000);

        p.set_position("TRSY2", 0);
        assert_eq!(p.aggregate(), 1_500_000);
    }

    #[test]
    fn pv01_total() {
        let r = PV01 { product: bond("10Y"), pv01: 0.085, quantity: 2_000_000 };
        assert!((r.total() - 170_000.0).abs() < 1e-6);
    }

    #[test]
    fn default_sector_membership() {
        let map = SectorMap::from_config(&default_sectors());
        assert_eq!(map.sector_of("2Y"), Some("FrontEnd"));
        assert_eq!(map.sector_of("10Y"), Some("Belly"));
        assert_eq!(map.sector_of("30Y"), Some("LongEnd"));
        assert_eq!(map.sector_of("40Y"), None);
    }
}
