use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Longest caller-supplied request ID we pass through unchanged.
const MAX_INCOMING_LEN: usize = 128;

/// Attach a request ID to each request, reusing the caller's `x-request-id` when it is sane.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= MAX_INCOMING_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, header_value);
    }

    response
}

/// Request ID wrapper type for extension
#[derive(Debug, Clone)]
pub struct RequestId(pub String);
