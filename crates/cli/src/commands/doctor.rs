//! `aegent doctor` - Diagnose configuration and collaborator health.

use aegent_config::AppConfig;
use aegent_core::provider::ModelKind;
use aegent_core::search::SearchProvider;
use aegent_tools::{HttpActionExecutor, resolve_catalog};

pub async fn run() -> anyhow::Result<()> {
    println!("aegent doctor — system diagnostics");
    println!("==================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ok    Config file: {}", config_path.display());
    } else {
        println!("  warn  No config file, using defaults (run `aegent onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("  FAIL  Config invalid: {e}");
            return Ok(());
        }
    };

    // Provider keys
    let mut any_key = false;
    for kind in ModelKind::ALL {
        if config.has_api_key(kind) {
            any_key = true;
            println!("  ok    {kind}: key configured ({})", config.model_id(kind));
        } else {
            println!("  --    {kind}: no key (set {})", super::key_env(kind));
        }
    }
    if !any_key {
        println!("  FAIL  No provider has an API key");
        issues += 1;
    } else if !config.has_api_key(config.default_model) {
        println!("  warn  Default model {} has no key", config.default_model);
        issues += 1;
    }

    // Tool catalog
    let catalog = match resolve_catalog(config.bridge.catalog_path.as_deref()) {
        Ok(catalog) => {
            println!("  ok    Tool catalog: {} tools", catalog.len());
            catalog
        }
        Err(e) => {
            println!("  FAIL  Tool catalog: {e}");
            issues += 1;
            aegent_core::tool::ToolCatalog::new()
        }
    };

    // Collaborators
    let search = super::search_backend(&config);
    if search.health_check().await {
        println!("  ok    Documentation search at {}", search.base_url());
    } else {
        println!("  warn  Documentation search offline at {}", search.base_url());
        issues += 1;
    }

    let bridge = HttpActionExecutor::new(&config.bridge.url, catalog);
    if bridge.health_check().await {
        println!("  ok    Host bridge at {}", bridge.base_url());
    } else {
        println!("  warn  Host bridge unreachable at {} (use --dry-run to test without it)", bridge.base_url());
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
