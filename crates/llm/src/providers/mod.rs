pub mod gemini;
pub mod offline;

use std::sync::Arc;

use keaa_core::Config;
use tracing::{info, warn};

use crate::provider::LlmProvider;

/// Create the backend selected by config.
///
/// A missing `GEMINI_API_KEY` is not an error: it degrades to the offline
/// provider with a warning, exactly like an explicit `--offline`.
pub fn create_provider(config: &Config) -> Arc<dyn LlmProvider> {
    create_provider_with(config, false)
}

/// Like [`create_provider`], asking Gemini for `application/json` replies when `json_mode` is set.
pub fn create_provider_with(config: &Config, json_mode: bool) -> Arc<dyn LlmProvider> {
    if config.workspace.offline {
        info!("Offline mode forced, using mock responses");
        return Arc::new(offline::OfflineProvider::new(config.workspace.input_dir.clone()));
    }

    match config.gemini.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            info!(model = %config.gemini.model_name, json_mode, "Using Gemini backend");
            Arc::new(
                gemini::GeminiProvider::from_config(&config.gemini, key.to_string()).with_json_mode(json_mode),
            )
        }
        None => {
            warn!("GEMINI_API_KEY not found, switching to offline mode");
            Arc::new(offline::OfflineProvider::new(config.workspace.input_dir.clone()))
        }
    }
}
