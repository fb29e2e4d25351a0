//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::inference::InferenceClient;
use crate::sandbox::SandboxProvider;

/// Collaborators and settings for every request.
///
/// Requests share nothing mutable; each chat request builds its own dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<dyn InferenceClient>,
    pub sandboxes: Arc<dyn SandboxProvider>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        sandboxes: Arc<dyn SandboxProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            inference,
            sandboxes,
            config: Arc::new(config),
        }
    }
}
