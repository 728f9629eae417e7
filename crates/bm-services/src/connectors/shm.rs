//! Shared-memory queue connectors.
//!
//! The subscriber runs on a dedicated OS thread because `pop` blocks with no
//! timeout. A queue with no producer parks that thread forever; shutdown is
//! process-level.

use std::sync::Arc;

use bm_core::{
    ProductRepository, Result,
    codec::{FromLine, ToLine},
    cpu_affinity::pin_current_thread,
    shm::BoundedTextQueue,
    soa::{Connector, Service},
};
use tracing::{debug, error, info, warn};

/// Pop, decode and ingest until the queue itself fails.
///
/// Malformed lines are logged and dropped. Returns only on a queue error.
pub fn run_shm_subscriber<V: FromLine>(
    queue: BoundedTextQueue,
    products: Arc<ProductRepository>,
    service: Arc<dyn Service<str, V>>,
    cpu_core: Option<usize>,
    label: &str,
) {
    pin_current_thread(cpu_core, label);
    info!("[{label}] consuming '{}' (capacity {})", queue.name(), queue.capacity());

    let mut accepted = 0u64;
    loop {
        let line = match queue.pop() {
            Ok(line) => line,
            Err(e) => {
                error!("[{label}] queue failed after {accepted} messages: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match V::from_line(&line, &products) {
            Ok(record) => {
                service.on_message(record);
                accepted += 1;
            }
            Err(e) => warn!("[{label}] skipping '{line}': {e}"),
        }
    }
}

/// Producer side: each published record becomes one queue message.
///
/// `publish` blocks while the queue is full.
pub struct ShmPublisher {
    queue: BoundedTextQueue,
}

impl ShmPublisher {
    /// Open the named queue, creating it if the consumer has not yet.
    pub fn open(name: &str, capacity: u32, max_message_size: u32) -> Result<Self> {
        let queue = BoundedTextQueue::open_or_create(name, capacity, max_message_size)?;
        info!("[shm_pub] opened '{name}' ({capacity} x {max_message_size} bytes)");
        Ok(Self { queue })
    }

    pub fn queue(&self) -> &BoundedTextQueue {
        &self.queue
    }
}

impl<V: ToLine> Connector<V> for ShmPublisher {
    fn publish(&self, data: &V) -> Result<()> {
        let line = data.to_line();
        self.queue.push(&line)?;
        debug!("[shm_pub] pushed {} bytes", line.len());
        Ok(())
    }
}
