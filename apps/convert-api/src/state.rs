//! Application state for the conversion API

use std::sync::Arc;

use anyhow::Result;

use convert_core::{ConversionClient, JobRegistry, OrchestratorConfig};

use crate::adobe::{AdobeClient, AdobeCredentials};

#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
    pub client: Arc<dyn ConversionClient>,
    pub config: OrchestratorConfig,
}

impl AppState {
    /// Build the state from the environment. Fails fast when provider
    /// credentials are missing; that is the one unrecoverable error class.
    pub fn from_env() -> Result<Self> {
        let credentials = AdobeCredentials::from_env()?;
        Ok(Self {
            registry: JobRegistry::new(),
            client: Arc::new(AdobeClient::new(credentials)),
            config: OrchestratorConfig::default(),
        })
    }
}
