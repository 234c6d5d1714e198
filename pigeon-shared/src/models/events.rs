use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Message;

/// Full set of currently online user identifiers, broadcast to every
/// connected session whenever membership changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct OnlineSetChangedEvent {
    pub user_ids: Vec<Uuid>,
}

/// A freshly persisted message pushed to its receiver's live session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct NewMessageEvent {
    pub message: Message,
}

/// Seen receipt routed back to the original sender. `user_id` is the user
/// who viewed the messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessagesSeenEvent {
    pub message_ids: Vec<Uuid>,
    pub user_id: Uuid,
}

/// Events carried on the per-user push stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type")]
pub enum PushEvent {
    #[serde(rename = "online-set-changed")]
    OnlineSetChanged { payload: OnlineSetChangedEvent },
    #[serde(rename = "new-message")]
    NewMessage { payload: NewMessageEvent },
    #[serde(rename = "messages-seen")]
    MessagesSeen { payload: MessagesSeenEvent },
}

impl PushEvent {
    /// SSE event name matching the serde tag.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            PushEvent::OnlineSetChanged { .. } => "online-set-changed",
            PushEvent::NewMessage { .. } => "new-message",
            PushEvent::MessagesSeen { .. } => "messages-seen",
        }
    }
}
