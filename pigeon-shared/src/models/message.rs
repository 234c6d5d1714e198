use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;

/// A single direct message between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Message {
    /// Server-assigned identifier. Generated as a UUIDv7 so identifier order
    /// follows creation order closely enough for tie-breaking.
    pub id: Uuid,

    /// ID of the user who sent the message.
    pub sender_id: Uuid,

    /// ID of the user the message is addressed to.
    pub receiver_id: Uuid,

    /// Text body. Absent for media-only messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Durable URL of an externally stored media attachment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,

    /// Whether the receiver has viewed the message. Flips false→true exactly
    /// once and never reverts.
    pub seen: bool,

    /// When the receiver viewed the message, if they have.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<Timestamp>,

    /// Authoritative ordering key, assigned at persistence time.
    pub created_at: Timestamp,
}

/// One page of conversation history, newest first.
///
/// `next_cursor` is the `created_at` of the oldest message in the page and is
/// passed back verbatim to fetch the next older page. Clients reverse the
/// page to ascending order for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub next_cursor: Option<Timestamp>,
}

/// Body of `POST /api/messages/send/{peer_id}`.
///
/// At least one of `text` (non-blank) or `media` must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SendMessageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

/// Body of `POST /api/messages/{peer_id}/mark-seen`.
///
/// With no explicit identifiers, every unseen message from that peer to the
/// caller is marked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MarkSeenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ids: Option<Vec<Uuid>>,
}

/// Identifiers that actually transitioned false→true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MarkSeenResponse {
    pub message_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_message() -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            text: Some("Hello, world!".to_string()),
            media_url: None,
            seen: false,
            seen_at: None,
            created_at: Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_message_serialization_round_trip() {
        let message = sample_message();

        let serialized = serde_json::to_string(&message).unwrap();
        let deserialized: Message = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized, message);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let message = sample_message();
        let json = serde_json::to_string(&message).unwrap();

        assert!(!json.contains("media_url"));
        assert!(!json.contains("seen_at"));
        assert!(json.contains("\"seen\":false"));
    }

    #[test]
    fn test_page_serialization() {
        let page = MessagePage {
            messages: vec![sample_message()],
            has_more: true,
            next_cursor: Some(Timestamp(
                Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap(),
            )),
        };

        let json = serde_json::to_string(&page).unwrap();
        assert!(json.contains("\"has_more\":true"));
        assert!(json.contains("\"next_cursor\":\"2025-03-08T14:30:00"));
    }

    #[test]
    fn test_mark_seen_request_without_ids() {
        let request: MarkSeenRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.message_ids, None);
    }
}
