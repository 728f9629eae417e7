//! Historical persistence taps.
//!
//! A [`HistoricalDataService`] listens to an upstream service, keeps the last
//! record per persist key, and appends each record to its connector
//! (normally a [`FileSink`](crate::connectors::file::FileSink)).

use std::sync::Arc;

use bm_core::{
    BucketedPosition, BucketedRisk, ExecutionOrder, Inquiry, PV01, Position, PriceStream, Result,
    soa::{Connector, Service, ServiceCore, ServiceListener},
};
use tracing::warn;

/// Key a record is persisted under.
pub trait PersistKey {
    fn persist_key(&self) -> &str;
}

impl PersistKey for Position {
    fn persist_key(&self) -> &str {
        self.product_id()
    }
}

impl PersistKey for PV01 {
    fn persist_key(&self) -> &str {
        self.product_id()
    }
}

impl PersistKey for ExecutionOrder {
    fn persist_key(&self) -> &str {
        self.product_id()
    }
}

impl PersistKey for PriceStream {
    fn persist_key(&self) -> &str {
        self.product_id()
    }
}

impl PersistKey for Inquiry {
    fn persist_key(&self) -> &str {
        &self.inquiry_id
    }
}

impl PersistKey for BucketedPosition {
    fn persist_key(&self) -> &str {
        &self.sector
    }
}

impl PersistKey for BucketedRisk {
    fn persist_key(&self) -> &str {
        &self.sector
    }
}

pub struct HistoricalDataService<V> {
    label: &'static str,
    core: ServiceCore<V>,
    connector: Arc<dyn Connector<V>>,
}

impl<V: Clone> HistoricalDataService<V> {
    pub fn new(label: &'static str, connector: Arc<dyn Connector<V>>) -> Self {
        Self { label, core: ServiceCore::new(), connector }
    }

    /// Remember `data` under `key` and append it to the connector.
    pub fn persist_data(&self, key: &str, data: &V) {
        self.core.store(key.to_string(), data.clone());
        if let Err(e) = self.connector.publish(data) {
            warn!("[{}] persist {key} failed: {e}", self.label);
        }
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }
}

impl<V: PersistKey + Clone + Send + Sync> Service<str, V> for HistoricalDataService<V> {
    fn get_data(&self, key: &str) -> Result<V> {
        self.core.get(key)
    }

    fn on_message(&self, data: V) {
        self.persist_data(data.persist_key(), &data);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<V>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<V>>> {
        self.core.listeners()
    }
}

impl<V: PersistKey + Clone + Send + Sync> ServiceListener<V> for HistoricalDataService<V> {
    fn process_add(&self, data: &V) {
        self.persist_data(data.persist_key(), data);
    }

    fn process_remove(&self, data: &V) {
        self.persist_data(data.persist_key(), data);
    }

    fn process_update(&self, data: &V) {
        self.persist_data(data.persist_key(), data);
    }
}
