use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::http::error::{ApiError, AppResult};
use crate::middleware::request_context::CurrentUser;
use crate::services::message_store::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use shared::models::{
    ErrorResponse, MarkSeenRequest, MarkSeenResponse, Message, MessagePage, SendMessageRequest,
};

pub fn routes() -> Router {
    Router::new()
        .route("/api/messages/{peer_id}", get(fetch_messages))
        .route("/api/messages/send/{peer_id}", post(send_message))
        .route("/api/messages/{peer_id}/mark-seen", post(mark_seen))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub cursor: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Paginated history between the caller and `peer_id`, newest first.
///
/// Opening a conversation counts as reading it: unseen messages addressed
/// to the caller inside the returned page are marked seen with the fetch,
/// and the peer gets a live seen receipt when connected.
#[utoipa::path(
    get,
    path = "/api/messages/{peer_id}",
    params(
        ("peer_id" = Uuid, Path, description = "Conversation partner"),
        ("cursor" = Option<String>, Query, description = "Exclusive upper bound: created_at of the oldest message already loaded"),
        ("limit" = Option<usize>, Query, description = "Page size, capped at 50")
    ),
    responses(
        (status = 200, description = "One page of history", body = MessagePage),
        (status = 401, description = "Missing session", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(state, query))]
pub async fn fetch_messages(
    Extension(state): Extension<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<MessagePage>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    let paged = state.store.page(user_id, peer_id, query.cursor, limit).await?;
    metrics::counter!("pigeon_history_pages_total").increment(1);

    if !paged.newly_seen.is_empty() {
        state
            .delivery
            .push_seen_receipt(peer_id, user_id, paged.newly_seen)
            .await;
    }

    Ok(Json(paged.page))
}

/// Persists a message to `peer_id` and pushes it to their live session.
#[utoipa::path(
    post,
    path = "/api/messages/send/{peer_id}",
    params(("peer_id" = Uuid, Path, description = "Recipient")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message persisted", body = Message),
        (status = 400, description = "Neither text nor media present", body = ErrorResponse),
        (status = 401, description = "Missing session", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(state, payload))]
pub async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(peer_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let media_url = match payload.media.as_deref() {
        Some(media) => Some(state.media.put(media).await?),
        None => None,
    };

    let message = state
        .store
        .append(user_id, peer_id, payload.text, media_url)
        .await?;
    metrics::counter!("pigeon_messages_sent_total").increment(1);

    // Push after durable persistence; an offline recipient simply finds the
    // message on their next fetch.
    state.delivery.push_new_message(&message).await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Explicit seen transition for messages from `peer_id` to the caller.
///
/// Without a body every unseen message from that peer is marked. The
/// response carries only identifiers that genuinely transitioned, and the
/// peer is notified for exactly that set.
#[utoipa::path(
    post,
    path = "/api/messages/{peer_id}/mark-seen",
    params(("peer_id" = Uuid, Path, description = "Original sender")),
    request_body = MarkSeenRequest,
    responses(
        (status = 200, description = "Transitioned identifiers", body = MarkSeenResponse),
        (status = 401, description = "Missing session", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(state, body))]
pub async fn mark_seen(
    Extension(state): Extension<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(peer_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<MarkSeenResponse>> {
    // The body is optional; absence means "everything unseen from peer".
    let payload: MarkSeenRequest = if body.is_empty() {
        MarkSeenRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::validation(format!("malformed mark-seen body: {err}")))?
    };

    let ids = match payload.message_ids {
        Some(ids) => ids,
        None => state.store.unseen_from(peer_id, user_id).await?,
    };

    if ids.is_empty() {
        return Ok(Json(MarkSeenResponse {
            message_ids: Vec::new(),
        }));
    }

    let transitioned = state.store.mark_seen(user_id, &ids).await?;

    if !transitioned.is_empty() {
        state
            .delivery
            .push_seen_receipt(peer_id, user_id, transitioned.clone())
            .await;
    }

    Ok(Json(MarkSeenResponse {
        message_ids: transitioned,
    }))
}
