//! In-memory connector that records every published value.

use std::sync::Mutex;

use bm_core::{
    Result,
    soa::{Connector, lock},
};

pub struct RecordingConnector<V> {
    items: Mutex<Vec<V>>,
}

impl<V> Default for RecordingConnector<V> {
    fn default() -> Self {
        Self { items: Mutex::new(Vec::new()) }
    }
}

impl<V: Clone> RecordingConnector<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn snapshot(&self) -> Vec<V> {
        lock(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send> Connector<V> for RecordingConnector<V> {
    fn publish(&self, data: &V) -> Result<()> {
        lock(&self.items).push(data.clone());
        Ok(())
    }
}
