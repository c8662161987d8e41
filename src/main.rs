use std::sync::Arc;

use rwatermark::{
    logger::{self, LoggerConfig},
    server::{self, AppState},
    Config, GeminiClient, GithubClient,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(LoggerConfig::from_env())?;
    if env_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = Arc::new(Config::from_env());
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &config);
    logger::log_config_info(&config);

    let gemini = GeminiClient::new(config.gemini.clone())?;
    if config.validate_api_key {
        if gemini.validate_api_key().await {
            log::info!("✅ Gemini API key accepted");
        } else {
            log::error!("❌ Gemini API key rejected, generation requests will fail");
        }
    }

    let github = GithubClient::new(config.github.clone())?;
    let state = AppState::new(config, Arc::new(gemini), github);

    server::run(state).await?;
    Ok(())
}
