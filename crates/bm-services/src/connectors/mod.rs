//! Connectors: the edges that move records in and out of the service graph.
//!
//! - [`tcp`]: inbound line listeners and outbound line writers
//! - [`shm`]: order book queue subscriber and publisher
//! - [`file`]: timestamped append-only history files
//! - [`loopback`]: inquiry quote responder that feeds back into its service
//! - [`memory`]: in-process recorder, used where no real sink is wanted

pub mod file;
pub mod loopback;
pub mod memory;
pub mod shm;
pub mod tcp;

use std::sync::Arc;

use bm_core::soa::{Connector, ServiceListener};
use tracing::warn;

/// Listener that publishes every record it hears about on a connector.
pub struct PublishListener<V> {
    label: &'static str,
    connector: Arc<dyn Connector<V>>,
}

impl<V> PublishListener<V> {
    pub fn new(label: &'static str, connector: Arc<dyn Connector<V>>) -> Self {
        Self { label, connector }
    }

    fn forward(&self, data: &V) {
        if let Err(e) = self.connector.publish(data) {
            warn!("[{}] publish failed: {e}", self.label);
        }
    }
}

impl<V: Send + Sync> ServiceListener<V> for PublishListener<V> {
    fn process_add(&self, data: &V) {
        self.forward(data);
    }

    fn process_remove(&self, data: &V) {
        self.forward(data);
    }

    fn process_update(&self, data: &V) {
        self.forward(data);
    }
}
