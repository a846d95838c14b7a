use axum::{
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::app::errors;
use crate::context::{self, REQUEST_ID_HEADER};

/// Attach a request id, a tracing span and the call deadline to every request.
///
/// The id is taken from an incoming `x-request-id` header when present, otherwise a
/// UUIDv7 is generated. It is echoed on the response.
pub async fn request_context(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = match context::call_context(req.headers()) {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            async move {
                let response = next.run(req).await;
                info!(status = response.status().as_u16(), "request completed");
                response
            }
            .instrument(span)
            .await
        }
        Err(msg) => errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
