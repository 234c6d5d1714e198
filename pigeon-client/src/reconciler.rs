use std::collections::HashSet;

use shared::models::{Message, MessagePage, PushEvent, Timestamp};
use uuid::Uuid;

/// Load state of the open conversation.
///
/// `Idle → Loading → Ready`, then `Ready ↔ LoadingMore` for backward
/// pagination. Fetch failures are non-destructive: the prior sequence is
/// kept and the phase returns to where it can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Ready,
    LoadingMore,
}

/// User-visible fate of an outbound message. Every enqueue terminates in
/// `Sent` or `Failed`; nothing is dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sending,
    Sent,
    Failed,
}

/// A locally displayed message not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub local_id: Uuid,
    pub text: Option<String>,
    pub media: Option<String>,
    pub status: SendStatus,
    pub queued_at: Timestamp,
}

/// One slot in the conversation sequence: either a server-confirmed message
/// or an optimistic outbound one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEntry {
    Confirmed(Message),
    Pending(PendingMessage),
}

impl ChatEntry {
    #[must_use]
    pub fn status(&self) -> SendStatus {
        match self {
            ChatEntry::Confirmed(_) => SendStatus::Sent,
            ChatEntry::Pending(pending) => pending.status,
        }
    }

    fn timestamp(&self) -> &Timestamp {
        match self {
            ChatEntry::Confirmed(message) => &message.created_at,
            ChatEntry::Pending(pending) => &pending.queued_at,
        }
    }
}

/// What a push event did to the local sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Not for the open conversation, already known, or handled elsewhere.
    Ignored,
    /// Message appended; `needs_seen_ack` asks the driver to issue the
    /// explicit mark-seen call for an inbound message in the open chat.
    Appended {
        message_id: Uuid,
        needs_seen_ack: bool,
    },
    /// Seen flags flipped on this many local messages.
    SeenApplied(usize),
}

/// Client-held ordered view of one conversation.
///
/// Invariant: the sequence stays sorted ascending by timestamp with no
/// duplicate server identifiers, no matter how REST responses and push
/// events interleave. Deduplication is by identifier, never by position,
/// because pushes may land while a fetch is suspended.
#[derive(Debug)]
pub struct ConversationState {
    me: Uuid,
    peer: Option<Uuid>,
    entries: Vec<ChatEntry>,
    known_ids: HashSet<Uuid>,
    has_more: bool,
    next_cursor: Option<Timestamp>,
    phase: LoadPhase,
}

impl ConversationState {
    #[must_use]
    pub fn new(me: Uuid) -> Self {
        Self {
            me,
            peer: None,
            entries: Vec::new(),
            known_ids: HashSet::new(),
            has_more: true,
            next_cursor: None,
            phase: LoadPhase::Idle,
        }
    }

    #[must_use]
    pub fn me(&self) -> Uuid {
        self.me
    }

    #[must_use]
    pub fn peer(&self) -> Option<Uuid> {
        self.peer
    }

    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Server-confirmed messages in display order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            ChatEntry::Confirmed(message) => Some(message),
            ChatEntry::Pending(_) => None,
        })
    }

    /// Opens a conversation, discarding the previous view. Interest in the
    /// old peer's pushes ends here; late fetch results for it are discarded
    /// by the peer guard on `apply_*`.
    pub fn select(&mut self, peer: Uuid) {
        self.peer = Some(peer);
        self.entries.clear();
        self.known_ids.clear();
        self.has_more = true;
        self.next_cursor = None;
        self.phase = LoadPhase::Idle;
    }

    pub fn clear_selection(&mut self) {
        self.peer = None;
        self.entries.clear();
        self.known_ids.clear();
        self.has_more = true;
        self.next_cursor = None;
        self.phase = LoadPhase::Idle;
    }

    /// Guarded entry into the initial load. Returns the peer to fetch for,
    /// or `None` when nothing should be fetched (no selection, or a load
    /// already in flight).
    pub fn begin_initial(&mut self) -> Option<Uuid> {
        let peer = self.peer?;
        if matches!(self.phase, LoadPhase::Loading | LoadPhase::LoadingMore) {
            return None;
        }
        self.phase = LoadPhase::Loading;
        Some(peer)
    }

    /// Installs the latest page, replacing confirmed history. Pending
    /// outbound entries survive: they are still owned by the send queue.
    /// Returns false when the response is stale (conversation changed).
    pub fn apply_initial(&mut self, peer: Uuid, page: &MessagePage) -> bool {
        if self.peer != Some(peer) {
            return false;
        }

        let pending: Vec<ChatEntry> = self
            .entries
            .drain(..)
            .filter(|entry| matches!(entry, ChatEntry::Pending(_)))
            .collect();

        self.known_ids.clear();
        self.entries = Vec::with_capacity(page.messages.len() + pending.len());
        // The wire page is newest-first; display order is ascending.
        for message in page.messages.iter().rev() {
            if self.known_ids.insert(message.id) {
                self.entries.push(ChatEntry::Confirmed(message.clone()));
            }
        }
        self.entries.extend(pending);

        self.has_more = page.has_more;
        self.next_cursor = page.next_cursor.clone();
        self.phase = LoadPhase::Ready;
        true
    }

    /// Failure path for the initial load: prior state is kept untouched.
    pub fn fail_initial(&mut self, peer: Uuid) {
        if self.peer == Some(peer) && self.phase == LoadPhase::Loading {
            self.phase = if self.entries.is_empty() {
                LoadPhase::Idle
            } else {
                LoadPhase::Ready
            };
        }
    }

    /// Guarded entry into backward pagination. No-op unless the view is
    /// `Ready` with more history and a cursor — this is what prevents two
    /// concurrent requests racing on the same cursor.
    pub fn begin_older(&mut self) -> Option<(Uuid, Timestamp)> {
        let peer = self.peer?;
        if self.phase != LoadPhase::Ready || !self.has_more {
            return None;
        }
        let cursor = self.next_cursor.clone()?;
        self.phase = LoadPhase::LoadingMore;
        Some((peer, cursor))
    }

    /// Prepends the older page. Boundary rows already present are skipped
    /// by identifier.
    pub fn apply_older(&mut self, peer: Uuid, page: &MessagePage) -> bool {
        if self.peer != Some(peer) || self.phase != LoadPhase::LoadingMore {
            return false;
        }

        let mut merged: Vec<ChatEntry> = Vec::with_capacity(page.messages.len() + self.entries.len());
        for message in page.messages.iter().rev() {
            if self.known_ids.insert(message.id) {
                merged.push(ChatEntry::Confirmed(message.clone()));
            }
        }
        merged.append(&mut self.entries);
        self.entries = merged;

        self.has_more = page.has_more;
        self.next_cursor = page.next_cursor.clone();
        self.phase = LoadPhase::Ready;
        true
    }

    pub fn fail_older(&mut self, peer: Uuid) {
        if self.peer == Some(peer) && self.phase == LoadPhase::LoadingMore {
            self.phase = LoadPhase::Ready;
        }
    }

    /// Merges a push event into the view.
    pub fn apply_push(&mut self, event: &PushEvent) -> PushOutcome {
        match event {
            PushEvent::NewMessage { payload } => self.apply_new_message(&payload.message),
            PushEvent::MessagesSeen { payload } => {
                let Some(peer) = self.peer else {
                    return PushOutcome::Ignored;
                };
                if payload.user_id != peer {
                    return PushOutcome::Ignored;
                }
                let wanted: HashSet<Uuid> = payload.message_ids.iter().copied().collect();
                let mut flipped = 0;
                for entry in &mut self.entries {
                    if let ChatEntry::Confirmed(message) = entry
                        && wanted.contains(&message.id)
                        && !message.seen
                    {
                        message.seen = true;
                        flipped += 1;
                    }
                }
                PushOutcome::SeenApplied(flipped)
            }
            // Presence is tracked at the client level, not per conversation.
            PushEvent::OnlineSetChanged { .. } => PushOutcome::Ignored,
        }
    }

    fn apply_new_message(&mut self, message: &Message) -> PushOutcome {
        let Some(peer) = self.peer else {
            return PushOutcome::Ignored;
        };

        let belongs = (message.sender_id == peer && message.receiver_id == self.me)
            || (message.sender_id == self.me && message.receiver_id == peer);
        if !belongs || self.known_ids.contains(&message.id) {
            return PushOutcome::Ignored;
        }

        self.insert_confirmed(message.clone());
        PushOutcome::Appended {
            message_id: message.id,
            needs_seen_ack: message.sender_id == peer && !message.seen,
        }
    }

    /// Materializes an optimistic outbound message at the tail of the
    /// sequence so the UI shows it instantly.
    pub fn insert_pending(&mut self, pending: PendingMessage) {
        self.entries.push(ChatEntry::Pending(pending));
    }

    /// Replaces the optimistic entry with the server's message, preserving
    /// its position. If a push already delivered the same identifier, the
    /// optimistic entry is dropped instead of duplicated.
    pub fn resolve_pending(&mut self, local_id: Uuid, message: Message) -> bool {
        let Some(index) = self.entries.iter().position(
            |entry| matches!(entry, ChatEntry::Pending(p) if p.local_id == local_id),
        ) else {
            return false;
        };

        if self.known_ids.contains(&message.id) {
            self.entries.remove(index);
            return true;
        }

        self.known_ids.insert(message.id);
        self.entries[index] = ChatEntry::Confirmed(message);
        true
    }

    /// Marks the optimistic entry failed; it stays visible for explicit
    /// user retry.
    pub fn fail_pending(&mut self, local_id: Uuid) -> bool {
        for entry in &mut self.entries {
            if let ChatEntry::Pending(pending) = entry
                && pending.local_id == local_id
            {
                pending.status = SendStatus::Failed;
                return true;
            }
        }
        false
    }

    /// Flips a failed entry back to `Sending` and hands its payload back
    /// for resubmission.
    pub fn retry_pending(&mut self, local_id: Uuid) -> Option<PendingMessage> {
        for entry in &mut self.entries {
            if let ChatEntry::Pending(pending) = entry
                && pending.local_id == local_id
                && pending.status == SendStatus::Failed
            {
                pending.status = SendStatus::Sending;
                return Some(pending.clone());
            }
        }
        None
    }

    fn insert_confirmed(&mut self, message: Message) {
        self.known_ids.insert(message.id);

        // Almost always an append; walk from the back for the rare
        // out-of-order arrival.
        let mut index = self.entries.len();
        while index > 0 && self.entries[index - 1].timestamp() > &message.created_at {
            index -= 1;
        }
        self.entries.insert(index, ChatEntry::Confirmed(message));
    }
}
