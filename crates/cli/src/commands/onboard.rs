//! `aegent onboard` - Write a default configuration file.

use aegent_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    println!("aegent — setup\n");

    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\n  Next steps:");
    println!("    1. Add an API key under [providers.gemini], [providers.openai] or [providers.claude]");
    println!("       (or set GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY)");
    println!("    2. Start the host bridge and documentation search backend");
    println!("    3. Run: aegent doctor, then aegent chat\n");

    Ok(())
}
