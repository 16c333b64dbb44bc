mod config;
mod db;
mod hub;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::fleet::FleetStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env();

    let store: Arc<dyn FleetStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(services::fleet_pg::PgFleetStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory fleet store");
            Arc::new(services::fleet_memory::MemoryFleetStore::new())
        }
    };

    // One hub per process; handlers and the live listener share this handle.
    let hub = hub::HubHandle::pending();
    let state = state::AppState::new(store, hub.clone());
    hub.install(hub::Hub::new(config.hub_client_buffer));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "fleet server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await
        .expect("server failed");
}

async fn shutdown_signal(hub: hub::HubHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested; closing hub");
    hub.shutdown().await;
}
