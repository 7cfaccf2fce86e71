//! State shared by every request handler.
//!
//! Built once after the model has loaded. Both fields are read-only for
//! the rest of the process, so handlers clone the `Arc`s without locking.
use std::sync::Arc;

use crate::config::Config;
use crate::model_runtime::registry::ModelRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(registry: ModelRegistry, config: Config) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }
}
