use application::GatewayApp;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod streaming;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayApp>,
}

pub fn router(gateway: Arc<GatewayApp>) -> Router {
    let app_state = AppState { gateway };

    Router::new()
        // Session lifecycle
        .route("/add", post(handlers::add_magnet))
        .route("/sessions", get(handlers::list_sessions).delete(handlers::drop_all))
        .route("/session/:hash", delete(handlers::drop_session))
        .route("/session/:hash/status", get(handlers::session_status))
        .route("/debug/session/:hash", get(handlers::debug_session))
        // Byte streaming (GET also answers HEAD)
        .route("/stream/:hash/:index", get(handlers::stream_file))
        .route("/health", get(handlers::health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serves the gateway on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, gateway: Arc<GatewayApp>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("🌐 Torrent gateway listening on http://{}", addr);
    }
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await
}
