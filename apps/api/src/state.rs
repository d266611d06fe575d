use std::sync::Arc;

use crate::workflow::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Listing size used when a request does not ask for one.
    pub history_limit: u32,
    pub max_upload_bytes: usize,
}
