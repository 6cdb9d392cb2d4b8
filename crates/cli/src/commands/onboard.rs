//! `memweave onboard` — First-time setup.

use memweave_config::AppConfig;
use memweave_memory::ensure_initialized;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Memweave — First-Time Setup");
    println!("===========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("Config directory exists: {}", config_dir.display());
    }

    // Create config file
    let config = if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.");
        AppConfig::load_from(&config_path).map_err(|e| format!("Failed to load config: {e}"))?
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        AppConfig::default()
    };

    ensure_initialized(&config.memory.journal_path(), &config.memory.knowledge_path())?;
    println!("Memory stores ready in: {}", config.memory.dir.display());

    if !config.tools.workspace_dir.exists() {
        std::fs::create_dir_all(&config.tools.workspace_dir)?;
        println!("Created workspace directory: {}", config.tools.workspace_dir.display());
    }

    println!("\nNext steps:");
    println!("  1. Set GEMINI_API_KEY (or add api_key to {})", config_path.display());
    println!("  2. Run: memweave chat");
    println!();

    Ok(())
}
