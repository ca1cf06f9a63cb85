//! Entry point: loads the configuration and the record store, then serves the
//! API until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{error, info};

use clinic::{backend, config::Config, db::Database, email::Outbox, services::Service};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = Config::from_env()?;
    let db = Database::open(config.db_path.clone())
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    let outbox = Arc::new(Outbox::open(config.outbox_path.clone()));
    let service = Arc::new(Service::new(db, outbox));

    let app = backend::router::get_router(service.clone());

    let addr = config.listen_addr();
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to open web server listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to bind Axum to listener")?;

    if let Err(e) = service.save() {
        error!("Failed to save the database on shutdown: {}", e);
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
