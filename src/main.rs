use env_logger::Builder;
use log::LevelFilter;
use toyshop_seed::config::AppConfig;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    Builder::new()
        .filter_level(config.log_level.filter())
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    match toyshop_seed::run(&config).await {
        Ok(report) => log::info!("👋 Done: {}", report.summary()),
        // Already logged
        Err(_) => {
            std::process::exit(1);
        }
    }
}
