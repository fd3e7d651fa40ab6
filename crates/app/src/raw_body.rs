use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::Request,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::problem::ProblemResponse;

/// Request body captured verbatim as UTF-8 text before routing.
///
/// Signature checks hash exactly these bytes; handlers parse JSON from it.
#[derive(Debug, Clone)]
pub struct RawBody(Arc<str>);

impl RawBody {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Buffers the whole body (no size limit), stores it as a [`RawBody`]
/// extension and hands the same bytes on to the route.
pub async fn capture(request: Request, next: Next) -> Result<Response, ProblemResponse> {
    let (mut parts, incoming) = request.into_parts();
    let bytes = body::to_bytes(incoming, usize::MAX).await.map_err(|err| {
        warn!(stage = "ingress", path = %parts.uri.path(), error = %err, "failed to read request body");
        ProblemResponse::bad_request("unreadable_body", "failed to read request body")
    })?;

    let text = std::str::from_utf8(&bytes).map_err(|_| {
        warn!(stage = "ingress", path = %parts.uri.path(), "request body is not valid UTF-8");
        ProblemResponse::bad_request("invalid_body_encoding", "request body must be valid UTF-8")
    })?;

    parts.extensions.insert(RawBody(Arc::from(text)));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
