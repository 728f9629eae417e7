//! Inquiry quote loopback.
//!
//! Stands in for a client: a published quote request is answered at once by
//! feeding QUOTED and then DONE back into the inquiry service.

use std::sync::{Arc, Weak};

use bm_core::{
    Inquiry, InquiryState, MeshError, Result,
    soa::{Connector, Service},
};

use crate::inquiry::InquiryService;

/// Holds only a weak handle, so the service may own this connector.
pub struct InquiryLoopback {
    service: Weak<InquiryService>,
}

impl InquiryLoopback {
    pub fn new(service: &Arc<InquiryService>) -> Self {
        Self { service: Arc::downgrade(service) }
    }
}

impl Connector<Inquiry> for InquiryLoopback {
    fn publish(&self, request: &Inquiry) -> Result<()> {
        let service = self
            .service
            .upgrade()
            .ok_or_else(|| MeshError::Transport("inquiry service is gone".into()))?;
        service.on_message(request.with_state(request.price, InquiryState::Quoted));
        service.on_message(request.with_state(request.price, InquiryState::Done));
        Ok(())
    }
}
