use std::any::Any;
use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::ApiError;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Propagates the caller's `x-request-id` or assigns a fresh UUID, and
/// echoes it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = match req.headers().get(&REQUEST_ID) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            // Visible to the access-log span built from request headers
            req.headers_mut().insert(REQUEST_ID, generated.clone());
            generated
        }
    };

    let mut res = next.run(req).await;
    res.headers_mut().insert(REQUEST_ID, id);
    res
}

/// Records request count and latency, labelled by the matched route template
/// so ids in paths do not explode label cardinality.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let res = next.run(req).await;

    crate::metrics::record_http_request(&method, &route, res.status().as_u16(), start.elapsed());
    res
}

/// Turns a handler panic into the standard 500 body so the connection
/// is answered instead of dropped.
pub fn catch_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(message = %message, "handler panicked");
    ApiError::Internal(message).into_response()
}
