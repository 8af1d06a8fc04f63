//! Application configuration from the environment.

use crate::generator::GeminiConfig;
use crate::storage::StorageConfig;
use crate::sync::ViewRole;

const DEFAULT_STORAGE_PATH: &str = "./data/quizcast.sled";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    /// View attached at startup
    pub view: ViewRole,
    /// `None` disables question generation
    pub generator: Option<GeminiConfig>,
}

impl AppConfig {
    /// Read the process environment. A fragment argument overrides `QUIZCAST_VIEW`.
    pub fn from_env(fragment: Option<String>) -> Self {
        let mut config = Self::from_vars(|key| std::env::var(key).ok(), fragment);
        config.generator = GeminiConfig::from_env();
        config
    }

    fn from_vars<F>(var: F, fragment: Option<String>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = var("STORAGE_PATH").unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string());
        let mut storage = StorageConfig::new(path);
        if let Some(ms) = var("STORAGE_FLUSH_MS").and_then(|v| v.parse().ok()) {
            storage = storage.with_flush_interval(ms);
        }

        let fragment = fragment.or_else(|| var("QUIZCAST_VIEW"));
        Self {
            storage,
            view: ViewRole::from_fragment(fragment.as_deref()),
            generator: None,
        }
    }
}
