//! Shared application state for the Axum API server.

use std::sync::Arc;

use relay_engine::supervisor::PipelineSupervisor;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<PipelineSupervisor>,
}

impl AppState {
    pub fn new(supervisor: Arc<PipelineSupervisor>) -> Self {
        Self { supervisor }
    }
}
