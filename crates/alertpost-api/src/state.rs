use std::sync::Arc;

use alertpost_core::{AlertPostService, EndpointConfig};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AlertPostService>,
}

impl AppState {
    pub fn new(service: AlertPostService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn from_endpoints(endpoints: Vec<EndpointConfig>) -> Self {
        Self::new(AlertPostService::new(endpoints))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_endpoints(Vec::new())
    }
}
