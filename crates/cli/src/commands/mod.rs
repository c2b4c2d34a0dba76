pub mod ask;
pub mod catalog;
pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod providers;

use aegent_config::AppConfig;
use aegent_core::provider::{ModelKind, Provider};
use aegent_tools::HttpSearchProvider;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn load_config() -> anyhow::Result<AppConfig> {
    AppConfig::load().context("Failed to load config")
}

/// Provider for `kind`, or a setup hint if its key is missing.
pub(crate) fn provider_for(config: &AppConfig, kind: ModelKind) -> anyhow::Result<Arc<dyn Provider>> {
    let router = aegent_providers::build_from_config(config);
    router.resolve(kind).map_err(|e| {
        eprintln!();
        eprintln!("  ERROR: No API key configured for {kind}.");
        eprintln!();
        eprintln!("  Set {} or add it to:", key_env(kind));
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        anyhow::anyhow!(e)
    })
}

pub(crate) fn search_backend(config: &AppConfig) -> HttpSearchProvider {
    HttpSearchProvider::with_timeouts(
        &config.search.url,
        Duration::from_secs(config.search.timeout_secs),
        Duration::from_secs(config.search.health_timeout_secs),
    )
}

pub(crate) fn key_env(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Gemini => "GEMINI_API_KEY",
        ModelKind::OpenAi => "OPENAI_API_KEY",
        ModelKind::Claude => "ANTHROPIC_API_KEY",
    }
}
