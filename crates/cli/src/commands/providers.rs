//! `aegent providers` - List model families and configured models.

use aegent_config::default_model_id;
use aegent_core::provider::ModelKind;

pub fn run() -> anyhow::Result<()> {
    let config = super::load_config()?;

    println!("Model families");
    println!("==============");
    println!();
    println!("  {:<8} {:<28} {:<28} {:<8}", "kind", "model", "default model", "key");
    for kind in ModelKind::ALL {
        let marker = if kind == config.default_model { "*" } else { " " };
        let key = if config.has_api_key(kind) { "set" } else { "missing" };
        println!(
            "{marker} {:<8} {:<28} {:<28} {:<8}",
            kind.key(),
            config.model_id(kind),
            default_model_id(kind),
            key
        );
    }
    println!();
    println!("  * = default (change with default_model or AEGENT_MODEL)");
    println!();
    println!("  Environment variables:");
    println!("    GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, AEGENT_MODEL");

    Ok(())
}
