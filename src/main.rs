mod config;
mod context;
mod cookies;
mod csrf;
mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod session;
mod state;
mod validator;
mod views;

use std::time::Duration;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::database::setup_database;
use crate::routes::router;
use crate::state::AppState;

const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    let addr = config.socket_addr()?;

    let pool = setup_database(&config.dsn)
        .await
        .with_context(|| format!("failed to open database {}", config.dsn))?;
    tracing::info!(dsn = %config.dsn, "database ready");

    let state = AppState::new(pool, config);
    session::spawn_cleanup(state.sessions.clone(), SESSION_CLEANUP_PERIOD);

    let tls = match state.config.tls_files() {
        Some((cert, key)) => Some(
            RustlsConfig::from_pem_file(cert, key)
                .await
                .with_context(|| format!("failed to load TLS files {}", cert.display()))?,
        ),
        None => None,
    };
    let app = router(state).into_make_service();

    match tls {
        Some(tls) => {
            tracing::info!(%addr, "starting HTTPS server");
            axum_server::bind_rustls(addr, tls)
                .serve(app)
                .await
                .context("server error")?;
        }
        None => {
            tracing::info!(%addr, "starting server");
            axum::Server::bind(&addr)
                .serve(app)
                .await
                .context("server error")?;
        }
    }

    Ok(())
}
