use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shortlink_common::RESERVED_PATHS;
use tracing::debug;

use crate::context::RequestContext;
use crate::state::SharedState;

/// GET /{code}
///
/// Redirects to the link's target and records the click in the background.
pub async fn follow_link(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    request: Request,
) -> Response {
    let link = match state.links.get(&code) {
        Some(link) if !RESERVED_PATHS.contains(&code.as_str()) => link,
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Short URL not found" })),
            )
                .into_response()
        }
    };

    if let Some(ref recorder) = state.recorder {
        let ctx = RequestContext::from_request(&request, state.trust_proxy_headers);
        // Detached: the handle is dropped and the redirect does not wait.
        recorder.record_click(link.id, ctx.click_metadata());
    }

    state.metrics.redirects_total.inc();
    debug!(code = %code, target = %link.target, "redirecting");
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, link.target.clone())],
    )
        .into_response()
}
