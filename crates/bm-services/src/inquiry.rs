//! Client inquiries (request for quote) and their state machine.
//!
//! `on_message` is a plain replace. When the incoming record is RECEIVED and
//! a connector is attached, a copy priced at the configured quote price is
//! published; the loopback connector answers by feeding QUOTED and then DONE
//! back through `on_message`.

use std::sync::{Arc, PoisonError, RwLock};

use bm_core::{
    Inquiry, InquiryState, MeshError, Result,
    soa::{Connector, Notify, Service, ServiceCore, ServiceListener},
};
use tracing::{debug, warn};

pub struct InquiryService {
    core: ServiceCore<Inquiry>,
    connector: RwLock<Option<Arc<dyn Connector<Inquiry>>>>,
    quote_price: f64,
}

impl InquiryService {
    pub fn new(quote_price: f64) -> Self {
        Self { core: ServiceCore::new(), connector: RwLock::new(None), quote_price }
    }

    pub fn set_connector(&self, connector: Arc<dyn Connector<Inquiry>>) {
        *self.connector.write().unwrap_or_else(PoisonError::into_inner) = Some(connector);
    }

    /// Quote a RECEIVED inquiry at `price` (RECEIVED → QUOTED).
    pub fn send_quote(&self, inquiry_id: &str, price: f64) -> Result<()> {
        let current = self.checked(inquiry_id, InquiryState::Quoted)?;
        self.on_message(current.with_state(price, InquiryState::Quoted));
        Ok(())
    }

    /// Reject a RECEIVED inquiry (RECEIVED → REJECTED).
    pub fn reject_inquiry(&self, inquiry_id: &str) -> Result<()> {
        let current = self.checked(inquiry_id, InquiryState::Rejected)?;
        self.on_message(current.with_state(current.price, InquiryState::Rejected));
        Ok(())
    }

    fn checked(&self, inquiry_id: &str, to: InquiryState) -> Result<Inquiry> {
        let current = self.core.get(inquiry_id)?;
        if !current.state.can_transition_to(to) {
            return Err(MeshError::InvalidTransition { id: inquiry_id.to_string(), from: current.state, to });
        }
        Ok(current)
    }
}

impl Service<str, Inquiry> for InquiryService {
    fn get_data(&self, key: &str) -> Result<Inquiry> {
        self.core.get(key)
    }

    fn on_message(&self, inquiry: Inquiry) {
        debug!("[inquiry] {} -> {}", inquiry.inquiry_id, inquiry.state);
        self.core.replace(inquiry.inquiry_id.clone(), inquiry.clone(), Notify::Update);

        if inquiry.state != InquiryState::Received {
            return;
        }
        let connector = self.connector.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(c) = connector {
            let request = inquiry.with_state(self.quote_price, InquiryState::Received);
            if let Err(e) = c.publish(&request) {
                warn!("[inquiry] quote request for {} failed: {e}", inquiry.inquiry_id);
            }
        }
    }

    fn add_listener(&self, listener: Arc<dyn ServiceListener<Inquiry>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn ServiceListener<Inquiry>>> {
        self.core.listeners()
    }
}
