//! Provider router - selects the completion provider for a model family.
//!
//! The orchestrator never branches on provider identity; callers resolve a
//! `ModelKind` here once and hand the resulting `Arc<dyn Provider>` down.

use std::collections::HashMap;
use std::sync::Arc;

use aegent_config::AppConfig;
use aegent_core::error::ProviderError;
use aegent_core::provider::{ModelKind, Provider};
use tracing::debug;

use crate::anthropic::ClaudeProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;

/// Routes requests to the provider registered for each model family.
pub struct ProviderRouter {
    providers: HashMap<ModelKind, Arc<dyn Provider>>,
    default_model: ModelKind,
}

impl ProviderRouter {
    pub fn new(default_model: ModelKind) -> Self {
        Self {
            providers: HashMap::new(),
            default_model,
        }
    }

    /// Register a provider.
    pub fn register(&mut self, kind: ModelKind, provider: Arc<dyn Provider>) {
        self.providers.insert(kind, provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.get(self.default_model)
    }

    pub fn default_model(&self) -> ModelKind {
        self.default_model
    }

    /// Get the provider for a model family.
    pub fn get(&self, kind: ModelKind) -> Option<Arc<dyn Provider>> {
        self.providers.get(&kind).cloned()
    }

    /// Like [`get`](Self::get) but reports a missing key as a provider error.
    pub fn resolve(&self, kind: ModelKind) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(kind).ok_or_else(|| {
            ProviderError::NotConfigured(format!("no API key configured for {kind}"))
        })
    }

    /// Registered model families, in declaration order.
    pub fn list(&self) -> Vec<ModelKind> {
        ModelKind::ALL
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }
}

/// Build one provider per model family that has an API key.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(config.default_model);

    for kind in ModelKind::ALL {
        let provider_config = config.providers.get(kind);
        let Some(api_key) = provider_config.api_key.clone() else {
            debug!(model = %kind, "Skipping provider without API key");
            continue;
        };
        let model = config.model_id(kind);
        let base_url = provider_config.api_url.clone();

        let provider: Arc<dyn Provider> = match kind {
            ModelKind::Gemini => {
                let mut p = GeminiProvider::new(api_key, model);
                if let Some(url) = base_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            ModelKind::OpenAi => {
                let mut p = OpenAiProvider::new(api_key, model);
                if let Some(url) = base_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            ModelKind::Claude => {
                let mut p = ClaudeProvider::new(api_key, model);
                if let Some(url) = base_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
        };

        router.register(kind, provider);
    }

    router
}
