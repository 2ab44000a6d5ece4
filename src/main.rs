use std::sync::Arc;

use portrait_studio::{
    config::AppConfig, errors::Result, studio::PortraitStudio, util::LocalTimer, web,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;
    let bind_addr = config.server.bind_addr;

    let (broadcaster, _bus_rx) = web::message_bus();
    let studio = Arc::new(PortraitStudio::from_config(&config, Some(broadcaster.clone()))?);

    let app = web::router(studio, broadcaster, config.server.max_upload_bytes);
    web::run_server(bind_addr, app).await?;

    info!("写真馆服务已关闭");
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_timer(LocalTimer)
        .init();

    info!("tracing initialized");
}
