use std::sync::Arc;

use lectern_sessions::SessionRegistry;

use crate::observers::ObserverHub;

/// Shared gateway state, cloned into every handler.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub hub: Arc<ObserverHub>,
    pub registry: SessionRegistry,
}

impl GatewayState {
    pub fn new(hub: Arc<ObserverHub>, registry: SessionRegistry) -> Arc<Self> {
        Arc::new(Self { hub, registry })
    }

    pub fn observer_count(&self) -> usize {
        self.hub.len()
    }
}
