//! Price streams published to the market.

use std::sync::{Arc, PoisonError, RwLock};

use bm_core::{
    PriceStream, Result,
    soa::{Connector, Notify, Service, ServiceCore, ServiceListener},
};
use tracing::warn;

#[derive(Default)]
pub struct StreamingService {
    core: ServiceCore<PriceStream>,
    connector: RwLock<Option<Arc<dyn Connector<PriceStream>>>>,
}

impl StreamingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connector(&self, connector: Arc<dyn Connector<PriceStream>>) {
        *self.connector.write().unwrap_or_else(PoisonError::into_inner) = Some(connector);
    }

    /// Store the stream, notify with `process_add`, then publish.
    pub fn publish_price(&self, stream: PriceStream) {
        self.core.replace(stream.product_id().to_string(), stream.clone(), Notify::Add);

        let connector = self.connector.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(c) = connector
            && let Err(e) = c.publish(&stream)
        {
            warn!("[streaming] publish {} failed: {e}", stream.product_id());
        }
    }
}

impl Service<str, PriceStream> for StreamingService {
    fn get_data(&self, key: &str) -> Result<PriceStream> {
        self.core.get(key)
    }

    fn on_message(&self, stream: PriceStream) {
        self.core.replace(stream.product_id().to_string(), stream, Notify::Update);
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<PriceStream>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<PriceStream>>> {
        self.core.listeners()
    }
}
