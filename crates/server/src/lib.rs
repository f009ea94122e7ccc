//! HTTP surface of the shortlink service: admission middleware in front of
//! the redirect handler, plus health and metrics endpoints.

pub mod context;
pub mod routes;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;

pub use context::RequestContext;
pub use state::{build_state, AppState, ServerMetrics, SharedState};

/// Build the router. Only redirects pass through the admission gate; health
/// and metrics stay reachable for probes and scrapers.
pub fn build_router(state: SharedState) -> Router {
    let redirects = Router::new()
        .route("/{code}", get(routes::redirect::follow_link))
        .route_layer(from_fn_with_state(state.clone(), routes::admission::admission));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::get_metrics))
        .merge(redirects)
        .with_state(state)
}

/// Serve the router on `listen_addr` until `shutdown` resolves.
pub async fn run_server<F>(state: SharedState, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("shortlink server listening on {}", listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}
