use std::str::FromStr;

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use shared::config::Config;
use uuid::Uuid;

use crate::http::error::{ApiError, AppResult};

/// Per-request context threaded through handlers via extensions.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Option<Uuid>,
}

/// Extractor for the authenticated user set by the auth middleware.
/// Rejects with 401 when the request carries no identity.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|context| context.user_id)
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

#[derive(Clone, Debug)]
pub struct RequestIdState {
    header: HeaderName,
}

impl RequestIdState {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let header = HeaderName::from_str(&config.server.request_id_header)
            .unwrap_or_else(|_| HeaderName::from_static("x-request-id"));
        Self { header }
    }
}

/// Assigns a request identifier (honoring an inbound one) and seeds the
/// [`RequestContext`] extension; authentication fills in the user later.
pub async fn assign_request_id(
    State(state): State<RequestIdState>,
    mut request: Request<Body>,
    next: Next,
) -> AppResult<Response> {
    let header_name = state.header.clone();
    let request_id = extract_request_id(request.headers(), &header_name)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
        user_id: None,
    });

    let header_value = HeaderValue::from_str(&request_id)
        .map_err(|_| ApiError::internal_server_error("failed to encode request id"))?;
    request
        .headers_mut()
        .insert(header_name.clone(), header_value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(header_name, header_value);
    Ok(response)
}

fn extract_request_id(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
