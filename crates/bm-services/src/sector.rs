//! Incremental per-sector aggregation of position and risk.
//!
//! Each product's last contribution is remembered. A new value is applied
//! as `total += new - last` to its sector's running total, so an update
//! costs O(1) regardless of universe size. `last_seen` and `totals` sit
//! behind one mutex and always move together.

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use ahash::AHashMap;
use bm_core::{
    BucketedPosition, BucketedRisk, MeshError, Result, SectorMap,
    soa::{ServiceListener, lock},
};

/// A value that can be summed into a sector total.
pub trait Contribution:
    Copy + Default + Add<Output = Self> + Sub<Output = Self> + Send + Sync + 'static
{
    /// Record reported to bucket listeners.
    type Record: Clone + Send + Sync + 'static;

    fn record(sector: &str, total: Self) -> Self::Record;
}

impl Contribution for i64 {
    type Record = BucketedPosition;

    fn record(sector: &str, total: Self) -> BucketedPosition {
        BucketedPosition { sector: sector.to_string(), quantity: total }
    }
}

/// Dollar PV01 (`pv01 × quantity`) plus quantity of one product.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskContribution {
    pub pv01: f64,
    pub quantity: i64,
}

impl Add for RiskContribution {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { pv01: self.pv01 + rhs.pv01, quantity: self.quantity + rhs.quantity }
    }
}

impl Sub for RiskContribution {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self { pv01: self.pv01 - rhs.pv01, quantity: self.quantity - rhs.quantity }
    }
}

impl Contribution for RiskContribution {
    type Record = BucketedRisk;

    fn record(sector: &str, total: Self) -> BucketedRisk {
        BucketedRisk { sector: sector.to_string(), pv01: total.pv01, quantity: total.quantity }
    }
}

struct BookState<C> {
    last_seen: AHashMap<String, C>,
    totals: AHashMap<String, C>,
}

/// Running sector totals plus the listeners that persist them.
pub struct SectorBook<C: Contribution> {
    sectors: Arc<SectorMap>,
    state: Mutex<BookState<C>>,
    listeners: RwLock<Vec<Arc<dyn ServiceListener<C::Record>>>>,
}

impl<C: Contribution> SectorBook<C> {
    pub fn new(sectors: Arc<SectorMap>) -> Self {
        Self {
            sectors,
            state: Mutex::new(BookState { last_seen: AHashMap::new(), totals: AHashMap::new() }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Replace `product_id`'s contribution with `value`.
    ///
    /// Returns the sector's new total as a record, or `None` for a product
    /// outside every sector. Does not notify; see [`publish`](Self::publish).
    pub fn apply(&self, product_id: &str, value: C) -> Option<C::Record> {
        let sector = self.sectors.sector_of(product_id)?;
        let mut state = lock(&self.state);
        let previous = state.last_seen.insert(product_id.to_string(), value).unwrap_or_default();
        let total = state.totals.entry(sector.to_string()).or_default();
        *total = *total + (value - previous);
        Some(C::record(sector, *total))
    }

    /// Current total of a configured sector (zero before any update).
    pub fn total(&self, sector: &str) -> Result<C> {
        if !self.sectors.sectors().iter().any(|s| s.name == sector) {
            return Err(MeshError::UnknownKey(sector.to_string()));
        }
        Ok(lock(&self.state).totals.get(sector).copied().unwrap_or_default())
    }

    pub fn bucket(&self, sector: &str) -> Result<C::Record> {
        Ok(C::record(sector, self.total(sector)?))
    }

    /// Report a bucket total returned by [`apply`](Self::apply).
    pub fn publish(&self, record: &C::Record) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for l in listeners {
            l.process_update(record);
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ServiceListener<C::Record>>) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    pub fn sectors(&self) -> &SectorMap {
        &self.sectors
    }
}
