use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = chirpy::config::Cli::parse();
    let cmd = cli.command.clone().unwrap_or(chirpy::config::Command::Run);

    match cmd {
        chirpy::config::Command::Run => run_server(cli.config).await,
        chirpy::config::Command::HashPassword(args) => hash_password(&cli.config, &args.password),
    }
}

fn hash_password(config: &chirpy::config::Config, password: &str) -> Result<()> {
    let hash = config.password_hasher()?.hash(password)?;
    println!("{hash}");
    Ok(())
}

async fn run_server(config: chirpy::config::Config) -> Result<()> {
    if config.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET (or --jwt-secret) must be set");
    }

    let hasher = config.password_hasher()?;
    let db_path = config.db_path.clone();
    let store = Arc::new(tokio::task::spawn_blocking(move || {
        chirpy::state::ChirpStore::open_with_hasher(db_path, hasher)
    })
    .await??);

    let app = chirpy::http::build_router(config.clone(), store.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!(
        bind = %config.bind,
        db_path = %store.path().display(),
        "starting chirpy"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("chirpy stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
