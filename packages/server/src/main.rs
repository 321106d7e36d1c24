use anyhow::Context;
use clap::Parser;
use dve_server::{build_router, AppState, Cli, DveConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dve_server=info,dve_publish=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = DveConfig::resolve(&cli)?;
    let state = AppState::from_config(&config).context("failed to open overlay store")?;

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        web_root = %config.web_root.display(),
        store = ?config.store_path,
        "dve server listening"
    );

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
