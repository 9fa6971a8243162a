//! HTTP surface: `POST /calculate`, `GET /suggest`, `GET /health`.

mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::{ConfigError, Settings};
pub use state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/calculate", post(handlers::calculate))
        .route("/suggest", get(handlers::suggest))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(settings: &Settings) -> Result<(), ServerError> {
    let state = Arc::new(AppState {
        pipeline: settings.build_pipeline()?,
        offline: settings.offline,
    });
    let app = build_router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(%addr, offline = settings.offline, "cab-compare server listening");

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}
