use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use shared::models::{
    ErrorResponse, MarkSeenRequest, MarkSeenResponse, Message, MessagePage, MessagesSeenEvent,
    NewMessageEvent, OnlineSetChangedEvent, PushEvent, SendMessageRequest,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pigeon API",
        version = "1.0.0",
        description = "Direct-messaging API: history, send, seen receipts, and the push stream"
    ),
    paths(
        crate::handlers::messages::fetch_messages,
        crate::handlers::messages::send_message,
        crate::handlers::messages::mark_seen,
    ),
    components(
        schemas(
            Message,
            MessagePage,
            SendMessageRequest,
            MarkSeenRequest,
            MarkSeenResponse,
            PushEvent,
            OnlineSetChangedEvent,
            NewMessageEvent,
            MessagesSeenEvent,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Messages", description = "Message history and delivery endpoints")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn openapi_yaml() -> impl IntoResponse {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => (StatusCode::OK, yaml),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("YAML error: {e}"),
        ),
    }
}

pub fn openapi_routes() -> Router {
    Router::new()
        .route("/openapi/pigeon.json", get(openapi_json))
        .route("/openapi/pigeon.yaml", get(openapi_yaml))
}
