pub mod cors;
pub mod handlers;
pub mod types;

use crate::{
    Error, Result, config::Config, inference::InferenceService, model::ModelSession,
};
use axum::{Router, routing::post};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Builds the HTTP surface: `POST /chat` behind request tracing and CORS.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Loads the model session, then binds and serves. Nothing listens until the
/// model is ready, so a failed load never exposes the endpoint.
pub async fn run(config: Config) -> Result<()> {
    let cors = cors::cors_layer(&config.server.cors)?;
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let model_config = config.model.clone();
    let session = tokio::task::spawn_blocking(move || ModelSession::load(&model_config))
        .await
        .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))??;

    let service = InferenceService::new(Arc::new(session), &config.generation);
    let app_state = AppState {
        service: Arc::new(service),
    };
    let app = router(app_state, cors);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
