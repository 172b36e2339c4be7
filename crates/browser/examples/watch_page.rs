use settle_browser::{LaunchConfig, PageLoader};
use settle_core::WatchConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://example.com".to_string());

    let loader = PageLoader::with_config(LaunchConfig::default(), WatchConfig::default());
    let loaded_url = url.clone();
    let result = loader
        .load(&url, move || {
            tracing::info!(url = %loaded_url, "Page finished loading");
            Ok(())
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
