mod api;
mod app_state;
mod config;
mod error;
mod kpi;
mod notify;
mod objective;
mod progress;
mod session;
mod storage;

use anyhow::Context;
use log::info;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::notify::LogSink;
use crate::storage::establish_connection;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    dotenv::dotenv().ok();

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("okr_cascade", log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Error)
        .filter_module("sea_orm", log::LevelFilter::Error)
        .parse_env("RUST_LOG")
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let db = establish_connection(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, db, Arc::new(LogSink)));
    info!(
        "Recalculate on review: {}, approved kpis only: {}",
        state.config.recalc_on_review, state.config.progress_approved_only
    );

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
