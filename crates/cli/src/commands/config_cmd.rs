//! `ticketforge config` — configuration inspection commands.

use ticketforge_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_redacted_toml());
    if !config.has_api_key() {
        eprintln!("No API key set (set ANTHROPIC_API_KEY or TICKETFORGE_API_KEY)");
    }
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
