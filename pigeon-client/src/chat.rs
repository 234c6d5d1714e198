use std::collections::HashSet;
use std::sync::Arc;

use shared::models::{PushEvent, Timestamp};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::reconciler::{ConversationState, PendingMessage, PushOutcome, SendStatus};
use crate::send_queue::{QueuedSend, SendQueue};
use crate::transport::{ChatTransport, ClientError, OutboundPayload, TransportError};

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Drives one user's chat session on a single logical thread of control.
///
/// Suspension points are the network calls themselves; push events may be
/// merged between them, which is why the underlying state dedups by
/// identifier rather than position.
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    state: ConversationState,
    queue: SendQueue,
    online: HashSet<Uuid>,
    page_size: u32,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("state", &self.state)
            .field("online", &self.online)
            .finish()
    }
}

impl ChatClient {
    #[must_use]
    pub fn new(me: Uuid, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            state: ConversationState::new(me),
            queue: SendQueue::new(),
            online: HashSet::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    #[must_use]
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online.contains(&user_id)
    }

    #[must_use]
    pub fn online_users(&self) -> &HashSet<Uuid> {
        &self.online
    }

    /// Opens a conversation with `peer`, dropping the previous view.
    pub fn select_conversation(&mut self, peer: Uuid) {
        self.state.select(peer);
    }

    /// Fetches the latest page for the open conversation. No-op when a load
    /// is already in flight; an error leaves the prior view untouched.
    pub async fn load_initial(&mut self) -> Result<(), ClientError> {
        if self.state.peer().is_none() {
            return Err(ClientError::NoConversation);
        }
        let Some(peer) = self.state.begin_initial() else {
            return Ok(());
        };

        match self
            .transport
            .fetch_page(peer, None, Some(self.page_size))
            .await
        {
            Ok(page) => {
                self.state.apply_initial(peer, &page);
                Ok(())
            }
            Err(err) => {
                self.state.fail_initial(peer);
                Err(err.into())
            }
        }
    }

    /// Fetches the next older page. Returns false when there was nothing to
    /// do (no more history, or a fetch already running).
    pub async fn load_older(&mut self) -> Result<bool, ClientError> {
        let Some((peer, cursor)) = self.state.begin_older() else {
            return Ok(false);
        };

        match self
            .transport
            .fetch_page(peer, Some(cursor), Some(self.page_size))
            .await
        {
            Ok(page) => Ok(self.state.apply_older(peer, &page)),
            Err(err) => {
                self.state.fail_older(peer);
                Err(err.into())
            }
        }
    }

    /// Queues a send and materializes its optimistic entry immediately.
    ///
    /// Blank payloads are rejected here, before any network traffic, and
    /// never enter the queue.
    pub fn enqueue(&mut self, payload: OutboundPayload) -> Result<Uuid, ClientError> {
        let peer = self.state.peer().ok_or(ClientError::NoConversation)?;
        if payload.is_blank() {
            return Err(TransportError::Validation(
                "message requires text or media".to_string(),
            )
            .into());
        }

        let local_id = Uuid::new_v4();
        self.state.insert_pending(PendingMessage {
            local_id,
            text: payload.text.clone(),
            media: payload.media.clone(),
            status: SendStatus::Sending,
            queued_at: Timestamp::now(),
        });
        self.queue.push(QueuedSend {
            local_id,
            peer_id: peer,
            payload,
        });
        Ok(local_id)
    }

    /// Drains the send queue, one submission in flight at a time.
    ///
    /// A failed submission marks only its own entry `failed` and the drain
    /// moves on; later entries still get their attempt. Every queued send
    /// ends up user-visible as `sent` or `failed`.
    pub async fn pump_sends(&mut self) {
        if !self.queue.begin_drain() {
            return;
        }

        while let Some(item) = self.queue.pop() {
            match self
                .transport
                .send_message(item.peer_id, item.payload.clone())
                .await
            {
                Ok(message) => {
                    debug!(message_id = %message.id, "send acknowledged");
                    self.state.resolve_pending(item.local_id, message);
                }
                Err(err) => {
                    warn!(local_id = %item.local_id, error = %err, "send failed");
                    self.state.fail_pending(item.local_id);
                }
            }
        }

        self.queue.end_drain();
    }

    /// Re-queues a failed entry for another attempt. Retries are always
    /// user-triggered, never automatic, to avoid duplicate sends.
    pub fn retry(&mut self, local_id: Uuid) -> bool {
        let Some(peer) = self.state.peer() else {
            return false;
        };
        let Some(pending) = self.state.retry_pending(local_id) else {
            return false;
        };

        self.queue.push(QueuedSend {
            local_id,
            peer_id: peer,
            payload: OutboundPayload {
                text: pending.text,
                media: pending.media,
            },
        });
        true
    }

    /// Feeds one push event through the client: presence updates the online
    /// set, conversation events reconcile into the view, and an accepted
    /// inbound message is acknowledged as seen right away so the sender's
    /// receipt does not wait for the next fetch.
    pub async fn handle_event(&mut self, event: PushEvent) {
        if let PushEvent::OnlineSetChanged { payload } = &event {
            self.online = payload.user_ids.iter().copied().collect();
            return;
        }

        match self.state.apply_push(&event) {
            PushOutcome::Appended {
                message_id,
                needs_seen_ack: true,
            } => {
                if let Some(peer) = self.state.peer()
                    && let Err(err) = self.transport.mark_seen(peer, vec![message_id]).await
                {
                    // Best effort: the receipt also flows on the next fetch.
                    debug!(error = %err, "seen acknowledgement failed");
                }
            }
            PushOutcome::Appended { .. } | PushOutcome::SeenApplied(_) | PushOutcome::Ignored => {}
        }
    }
}
