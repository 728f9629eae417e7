//! Throttled price feed for a GUI.
//!
//! Writes at most one price per throttle interval and stops for good after
//! `max_lines` rows. The first price is written immediately.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bm_core::{
    Price,
    config::GuiConfig,
    soa::{Connector, ServiceListener, lock},
};
use tracing::{debug, info, warn};

struct GuiState {
    last_emit: Option<Instant>,
    emitted: usize,
}

pub struct GuiService {
    sink: Arc<dyn Connector<Price>>,
    throttle: Duration,
    max_lines: usize,
    state: Mutex<GuiState>,
}

impl GuiService {
    pub fn new(config: &GuiConfig, sink: Arc<dyn Connector<Price>>) -> Self {
        Self {
            sink,
            throttle: Duration::from_millis(config.throttle_ms),
            max_lines: config.max_lines,
            state: Mutex::new(GuiState { last_emit: None, emitted: 0 }),
        }
    }

    /// Write `price` if the throttle and line budget allow. Returns whether
    /// a row was written.
    pub fn on_price(&self, price: &Price) -> bool {
        let mut st = lock(&self.state);
        if st.emitted >= self.max_lines {
            return false;
        }
        let now = Instant::now();
        if st.last_emit.is_some_and(|t| now.duration_since(t) < self.throttle) {
            debug!("[gui] throttled {}", price.product_id());
            return false;
        }

        if let Err(e) = self.sink.publish(price) {
            warn!("[gui] write failed: {e}");
            return false;
        }
        st.last_emit = Some(now);
        st.emitted += 1;
        if st.emitted == self.max_lines {
            info!("[gui] {} rows written, feed closed", self.max_lines);
        }
        true
    }

    pub fn emitted(&self) -> usize {
        lock(&self.state).emitted
    }
}

impl ServiceListener<Price> for GuiService {
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
    use crate::connectors::memory::RecordingConnector;

    fn price(mid: f64) -> Price {
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        Price::new(repo.get("7Y").unwrap(), mid, 0.0078125)
    }

    #[test]
    fn first_row_immediate_then_throttled() {
        let rec = Arc::new(RecordingConnector::<Price>::new());
        let gui = GuiService::new(&GuiConfig { throttle_ms: 60_000, max_lines: 100 }, rec.clone());

        assert!(gui.on_price(&price(99.0)));
        assert!(!gui.on_price(&price(99.5)));
        assert!(!gui.on_price(&price(100.0)));
        assert_eq!(rec.snapshot().iter().map(|p| p.mid).collect::<Vec<_>>(), vec![99.0]);
    }

    #[test]
    fn stops_after_max_lines() {
        let rec = Arc::new(RecordingConnector::<Price>::new());
        let gui = GuiService::new(&GuiConfig { throttle_ms: 0, max_lines: 3 }, rec.clone());

        let written = (0..10).filter(|i| gui.on_price(&price(99.0 + *i as f64 / 256.0))).count();
        assert_eq!(written, 3);
        assert_eq!(gui.emitted(), 3);
        assert_eq!(rec.len(), 3);
    }
}
