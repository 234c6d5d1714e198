use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{self, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use shared::config::Config;
use tracing::instrument;
use uuid::Uuid;

use crate::middleware::request_context::RequestContext;

const DEFAULT_SESSION_COOKIE: &str = "pigeon_session";

/// Resolves the authenticated user from the session cookie.
///
/// Credential management is an external collaborator: the cookie value
/// either carries the user identifier directly or an opaque session token
/// that is mapped to a stable identifier. Requests without a session are
/// rejected before reaching any handler.
#[instrument(skip_all, fields(path = %req.uri().path()))]
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let cookie_name = req
        .extensions()
        .get::<Arc<Config>>()
        .map_or_else(
            || DEFAULT_SESSION_COOKIE.to_string(),
            |config| config.session.session_cookie_name.clone(),
        );

    let session_id = extract_session_cookie(req.headers(), &cookie_name)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = Uuid::parse_str(&session_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_URL, session_id.as_bytes()));

    if let Some(context) = req.extensions_mut().get_mut::<RequestContext>() {
        context.user_id = Some(user_id);
    } else {
        req.extensions_mut().insert(RequestContext {
            request_id: String::new(),
            user_id: Some(user_id),
        });
    }

    Ok(next.run(req).await)
}

fn extract_session_cookie(headers: &http::HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(value)
        .flatten()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
