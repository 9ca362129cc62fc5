//! services/api/src/bin/api.rs

use case_desk_api_lib::{
    adapters::{BusyTracker, HttpBackendAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, AppState},
};
use case_desk_core::CaseFlow;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting gateway...");

    // --- 2. Initialize the Backend Adapter ---
    let busy = BusyTracker::new();
    let backend = HttpBackendAdapter::new(&config.backend_url, config.backend_timeout, busy.clone())?;
    info!(backend_url = %config.backend_url, "Lending backend adapter ready");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        flow: CaseFlow::new(Arc::new(backend)),
        busy,
        config: config.clone(),
    });

    // --- 4. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
