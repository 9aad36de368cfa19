use rgenai_edit::{BedrockClient, Config, EditHandler, ImageClient, UsageSinkManager};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    rgenai_edit::logger::init()?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = Config::from_env()?;
    rgenai_edit::logger::log_config_info(&config);

    for (id, name, provider) in ImageClient::supported_models() {
        log::debug!("  {} - {} ({})", id, name, provider);
    }

    log::info!("🔄 Creating Bedrock client...");
    let backend = BedrockClient::new(config.bedrock.clone())
        .await
        .into_image_client();

    let sinks = UsageSinkManager::new(&config).await?;
    let sink = sinks.sink();
    match sink.health_check().await {
        Ok(true) => log::info!("✅ Usage sink '{}' is reachable", sink.name()),
        Ok(false) => log::warn!("⚠️  Usage sink '{}' reported unhealthy", sink.name()),
        Err(e) => log::warn!("⚠️  Usage sink '{}' health check failed: {}", sink.name(), e),
    }

    let handler = EditHandler::new(Arc::new(backend), sink, config.generation.clone())?;
    rgenai_edit::server::run(config, handler).await?;

    log::info!("👋 Server stopped");
    Ok(())
}
