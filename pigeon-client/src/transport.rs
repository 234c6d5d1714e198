use async_trait::async_trait;
use shared::models::{Message, MessagePage, Timestamp};
use thiserror::Error;
use uuid::Uuid;

/// Client-side error taxonomy.
///
/// Validation failures are rejected before any network call where possible;
/// network failures surface as a `failed` status on the specific optimistic
/// message without touching fetched history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("validation rejected: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network failure: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no conversation selected")]
    NoConversation,
}

/// What the user asked to send: text, a media reference, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundPayload {
    pub text: Option<String>,
    pub media: Option<String>,
}

impl OutboundPayload {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            media: None,
        }
    }

    /// True when neither trimmed text nor media is present; such payloads
    /// never reach the send queue.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        !has_text && self.media.is_none()
    }
}

/// The server API as the client engine sees it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// `GET /api/messages/{peer_id}` with optional cursor and limit.
    async fn fetch_page(
        &self,
        peer_id: Uuid,
        cursor: Option<Timestamp>,
        limit: Option<u32>,
    ) -> Result<MessagePage, TransportError>;

    /// `POST /api/messages/send/{peer_id}`; resolves to the server-assigned
    /// message on acknowledgement.
    async fn send_message(
        &self,
        peer_id: Uuid,
        payload: OutboundPayload,
    ) -> Result<Message, TransportError>;

    /// `POST /api/messages/{peer_id}/mark-seen` for an explicit identifier
    /// set; returns the identifiers that transitioned.
    async fn mark_seen(
        &self,
        peer_id: Uuid,
        message_ids: Vec<Uuid>,
    ) -> Result<Vec<Uuid>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_payloads_are_detected() {
        assert!(OutboundPayload::default().is_blank());
        assert!(OutboundPayload::text("   ").is_blank());
        assert!(!OutboundPayload::text("hello").is_blank());
        assert!(
            !OutboundPayload {
                text: None,
                media: Some("https://cdn.example/cat.png".into()),
            }
            .is_blank()
        );
    }
}
