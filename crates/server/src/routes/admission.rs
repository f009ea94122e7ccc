use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::context::RequestContext;
use crate::state::SharedState;

/// Admission middleware: requests over their client's limit get a 429 and
/// never reach the handler.
pub async fn admission(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    state.metrics.requests_total.inc();

    let Some(ref gate) = state.gate else {
        return next.run(request).await;
    };

    let identity = RequestContext::from_request(&request, state.trust_proxy_headers).identity();
    if gate.check(&identity) {
        return next.run(request).await;
    }

    info!(client_ip = %identity, "request rate limited");
    state.metrics.requests_rate_limited.inc();
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("retry-after", "1")],
        Json(json!({ "error": "Rate limit exceeded. Please try again later." })),
    )
        .into_response()
}
