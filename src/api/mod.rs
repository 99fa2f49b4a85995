pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::Config;
use crate::ml::PredictorService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictorService>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<PredictorService>, config: Config) -> Self {
        Self {
            service,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
