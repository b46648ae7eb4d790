use rewardpub_store::PublishStateStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PublishStateStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn PublishStateStore>) -> Self {
        AppState { store }
    }
}
