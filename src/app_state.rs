use std::sync::Arc;

use crate::db::{JobStore, StampStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub stamps: Arc<dyn StampStore>,
}

impl AppState {
    pub fn new(jobs: Arc<dyn JobStore>, stamps: Arc<dyn StampStore>) -> Self {
        Self { jobs, stamps }
    }
}
