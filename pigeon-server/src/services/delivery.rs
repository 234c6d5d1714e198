use std::sync::Arc;

use shared::models::{Message, MessagesSeenEvent, NewMessageEvent, PushEvent};
use tracing::{instrument, trace};
use uuid::Uuid;

use super::presence::PresenceRegistry;

/// Routes message and receipt events to the recipient's live session.
///
/// Lookup misses are not errors: the message is already durably stored and
/// the recipient finds it on their next history fetch. Events for a single
/// session are forwarded in the order the store side effects issue them;
/// no reordering buffer exists.
#[derive(Debug)]
pub struct DeliveryRouter {
    presence: Arc<PresenceRegistry>,
}

impl DeliveryRouter {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Pushes a freshly persisted message to its receiver, if connected.
    #[instrument(name = "delivery.new_message", skip(self, message), fields(message_id = %message.id))]
    pub async fn push_new_message(&self, message: &Message) {
        let event = PushEvent::NewMessage {
            payload: NewMessageEvent {
                message: message.clone(),
            },
        };
        self.forward(message.receiver_id, event).await;
    }

    /// Notifies the original sender that `seen_by` viewed the listed
    /// messages. Only genuinely transitioned identifiers should be passed
    /// here so offline receipts are never fabricated.
    #[instrument(name = "delivery.seen_receipt", skip(self, message_ids))]
    pub async fn push_seen_receipt(&self, sender_id: Uuid, seen_by: Uuid, message_ids: Vec<Uuid>) {
        if message_ids.is_empty() {
            return;
        }
        let event = PushEvent::MessagesSeen {
            payload: MessagesSeenEvent {
                message_ids,
                user_id: seen_by,
            },
        };
        self.forward(sender_id, event).await;
    }

    async fn forward(&self, user_id: Uuid, event: PushEvent) {
        match self.presence.lookup(user_id).await {
            Some((session_id, sender)) => {
                if sender.send(event).await.is_err() {
                    // Receiver already dropped; clear the dead mapping so the
                    // user stops appearing online.
                    self.presence.disconnect(session_id).await;
                }
            }
            None => {
                trace!(%user_id, "recipient offline, event discoverable on next fetch");
            }
        }
    }
}
