//! CivicDesk server binary.

use std::net::SocketAddr;

use civicdesk_db::DbManager;
use civicdesk_server::{AppState, ServerConfig, logging, router};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    if let Err(err) = run().await {
        error!(error = %err, "Server exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    info!(url = %config.db.url, "Connecting to SurrealDB");
    let db = DbManager::connect(&config.db).await?;

    let state = AppState::new(db.client().clone(), config.auth.clone(), config.lifecycle)
        .with_trusted_proxy(config.trust_proxy);
    let app = router(state, &config.cors_origins);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, policy = ?config.lifecycle.transition_policy, "CivicDesk listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("CivicDesk stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
