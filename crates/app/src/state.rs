//! Shared application state.

use std::sync::Arc;

use services::{BridgeServices, ProgressService};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: BridgeServices,
}

impl AppState {
    #[must_use]
    pub fn new(services: BridgeServices) -> Self {
        Self { services }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        self.services.progress()
    }
}
