use std::sync::Arc;

use hooktail_core::registry::DeploymentRegistry;
use hooktail_pipeline::DeploymentLauncher;

use crate::config::Settings;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`. The registry is built
/// once from the configuration and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<DeploymentRegistry>,
    pub launcher: Arc<DeploymentLauncher>,
}

impl AppState {
    pub fn new(settings: Settings, launcher: Arc<DeploymentLauncher>) -> Self {
        let registry = DeploymentRegistry::new(settings.targets.clone());
        Self {
            settings: Arc::new(settings),
            registry: Arc::new(registry),
            launcher,
        }
    }
}
