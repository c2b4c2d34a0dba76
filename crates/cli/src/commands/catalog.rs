//! `aegent catalog` - List the host tool catalog.

use aegent_agent::STOP_TOOL;
use aegent_tools::resolve_catalog;
use anyhow::Context;

pub fn run() -> anyhow::Result<()> {
    let config = super::load_config()?;
    let catalog = resolve_catalog(config.bridge.catalog_path.as_deref())
        .context("Failed to load tool catalog")?;

    match &config.bridge.catalog_path {
        Some(path) => println!("Tool catalog ({} tools, from {}):\n", catalog.len(), path.display()),
        None => println!("Tool catalog ({} tools, built in):\n", catalog.len()),
    }
    for spec in catalog.specs() {
        println!("  {}", spec.signature());
        println!("      {}", spec.description);
    }
    println!();
    println!("  {STOP_TOOL}(reason?)");
    println!("      Reserved: ends the request. Handled by aegent itself.");
    Ok(())
}
