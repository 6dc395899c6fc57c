use anyhow::Context;
use ghostmark::GhostmarkConfig;
use ghostmark_api::{app_with_state, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghostmark_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("GHOSTMARK_CONFIG") {
        Ok(path) => GhostmarkConfig::from_path(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        Err(_) => GhostmarkConfig::default(),
    };
    let bind = std::env::var("GHOSTMARK_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let app = app_with_state(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    info!("ghostmark API listening on http://{bind}");

    axum::serve(listener, app).await?;
    Ok(())
}
