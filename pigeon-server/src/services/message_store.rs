use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::models::{Message, MessagePage, Timestamp};
use thiserror::Error;
use uuid::Uuid;

/// Default page size when the caller does not supply a limit.
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Hard ceiling on a single history page.
pub const MAX_PAGE_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum ChatStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type ChatStoreResult<T> = Result<T, ChatStoreError>;

/// One fetched page plus the identifiers the fetch itself transitioned to
/// seen (read-implies-seen for the open conversation).
#[derive(Debug, Clone)]
pub struct PagedMessages {
    pub page: MessagePage,
    pub newly_seen: Vec<Uuid>,
}

/// Durable, time-ordered persistence of messages between pairs of users.
///
/// Implementations must make `page` and `mark_seen` transactionally
/// consistent per call: the seen transition is a conditional update
/// ("set seen only where currently false") so concurrent callers never
/// double-report a transition.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a new message. Fails with [`ChatStoreError::Validation`]
    /// when both text (after trimming) and media are absent.
    async fn append(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: Option<String>,
        media_url: Option<String>,
    ) -> ChatStoreResult<Message>;

    /// Returns up to `limit` messages between the two users, newest first,
    /// strictly older than `cursor` when one is supplied. Messages in the
    /// page addressed to `caller_id` and not yet seen are marked seen
    /// atomically with the read; their identifiers come back in
    /// [`PagedMessages::newly_seen`].
    async fn page(
        &self,
        caller_id: Uuid,
        peer_id: Uuid,
        cursor: Option<DateTime<Utc>>,
        limit: usize,
    ) -> ChatStoreResult<PagedMessages>;

    /// Bulk, idempotent seen transition. Returns only the identifiers that
    /// actually moved false→true; marking an already-seen message is a
    /// no-op, not an error.
    async fn mark_seen(&self, receiver_id: Uuid, message_ids: &[Uuid]) -> ChatStoreResult<Vec<Uuid>>;

    /// Identifiers of unseen messages from `sender_id` to `receiver_id`,
    /// oldest first.
    async fn unseen_from(&self, sender_id: Uuid, receiver_id: Uuid) -> ChatStoreResult<Vec<Uuid>>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> ChatStoreResult<()>;
}

pub(crate) fn validate_body(
    text: &Option<String>,
    media_url: &Option<String>,
) -> ChatStoreResult<()> {
    let has_text = text.as_deref().is_some_and(|t| !t.trim().is_empty());
    if !has_text && media_url.is_none() {
        return Err(ChatStoreError::Validation(
            "message requires text or media".to_string(),
        ));
    }
    Ok(())
}

/// In-memory [`MessageStore`].
///
/// Backs tests and database-less local runs. Assigned timestamps are forced
/// strictly increasing so the timestamp cursor never splits a page across
/// equal keys.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    messages: Vec<Message>,
    last_created_at: Option<DateTime<Utc>>,
}

impl MemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn is_between(message: &Message, user_a: Uuid, user_b: Uuid) -> bool {
    (message.sender_id == user_a && message.receiver_id == user_b)
        || (message.sender_id == user_b && message.receiver_id == user_a)
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: Option<String>,
        media_url: Option<String>,
    ) -> ChatStoreResult<Message> {
        validate_body(&text, &media_url)?;

        let mut inner = self.lock();
        let mut created_at = Utc::now();
        if let Some(last) = inner.last_created_at
            && created_at <= last
        {
            created_at = last + Duration::microseconds(1);
        }
        inner.last_created_at = Some(created_at);

        let message = Message {
            id: Uuid::now_v7(),
            sender_id,
            receiver_id,
            text,
            media_url,
            seen: false,
            seen_at: None,
            created_at: Timestamp(created_at),
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn page(
        &self,
        caller_id: Uuid,
        peer_id: Uuid,
        cursor: Option<DateTime<Utc>>,
        limit: usize,
    ) -> ChatStoreResult<PagedMessages> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let mut indices: Vec<usize> = inner
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| is_between(m, caller_id, peer_id))
            .filter(|(_, m)| cursor.is_none_or(|c| m.created_at.0 < c))
            .map(|(i, _)| i)
            .collect();

        // Newest first; identifier order breaks timestamp ties so page
        // boundaries stay stable.
        indices.sort_by(|&a, &b| {
            let (ma, mb) = (&inner.messages[a], &inner.messages[b]);
            mb.created_at
                .cmp(&ma.created_at)
                .then_with(|| mb.id.cmp(&ma.id))
        });

        let has_more = indices.len() > limit;
        indices.truncate(limit);

        let seen_at = Utc::now();
        let mut newly_seen = Vec::new();
        for &i in &indices {
            let message = &mut inner.messages[i];
            if message.receiver_id == caller_id && !message.seen {
                message.seen = true;
                message.seen_at = Some(Timestamp(seen_at));
                newly_seen.push(message.id);
            }
        }

        let messages: Vec<Message> = indices.iter().map(|&i| inner.messages[i].clone()).collect();
        let next_cursor = if has_more {
            messages.last().map(|m| m.created_at.clone())
        } else {
            None
        };

        Ok(PagedMessages {
            page: MessagePage {
                messages,
                has_more,
                next_cursor,
            },
            newly_seen,
        })
    }

    async fn mark_seen(
        &self,
        receiver_id: Uuid,
        message_ids: &[Uuid],
    ) -> ChatStoreResult<Vec<Uuid>> {
        let wanted: HashSet<Uuid> = message_ids.iter().copied().collect();
        let seen_at = Utc::now();

        let mut inner = self.lock();
        let mut transitioned = Vec::new();
        for message in &mut inner.messages {
            if wanted.contains(&message.id) && message.receiver_id == receiver_id && !message.seen {
                message.seen = true;
                message.seen_at = Some(Timestamp(seen_at));
                transitioned.push(message.id);
            }
        }
        Ok(transitioned)
    }

    async fn unseen_from(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> ChatStoreResult<Vec<Uuid>> {
        let inner = self.lock();
        let mut unseen: Vec<&Message> = inner
            .messages
            .iter()
            .filter(|m| m.sender_id == sender_id && m.receiver_id == receiver_id && !m.seen)
            .collect();
        unseen.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(unseen.into_iter().map(|m| m.id).collect())
    }

    async fn ping(&self) -> ChatStoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    async fn seed(store: &MemoryMessageStore, sender: Uuid, receiver: Uuid, count: usize) {
        for i in 0..count {
            store
                .append(sender, receiver, Some(format!("message {i}")), None)
                .await
                .expect("append");
        }
    }

    #[tokio::test]
    async fn append_requires_text_or_media() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();

        let err = store
            .append(alice, bob, Some("   ".into()), None)
            .await
            .expect_err("blank text without media must be rejected");
        assert!(matches!(err, ChatStoreError::Validation(_)));

        let media_only = store
            .append(alice, bob, None, Some("https://cdn.example/cat.png".into()))
            .await
            .expect("media-only message is valid");
        assert_eq!(media_only.media_url.as_deref(), Some("https://cdn.example/cat.png"));
        assert!(!media_only.seen);
    }

    #[tokio::test]
    async fn assigned_timestamps_are_strictly_increasing() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        seed(&store, alice, bob, 50).await;

        let paged = store.page(alice, bob, None, 50).await.expect("page");
        let mut previous: Option<DateTime<Utc>> = None;
        for message in paged.page.messages.iter().rev() {
            if let Some(prev) = previous {
                assert!(message.created_at.0 > prev, "timestamps must not collide");
            }
            previous = Some(message.created_at.0);
        }
    }

    #[tokio::test]
    async fn repeated_paging_reconstructs_full_history() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        seed(&store, alice, bob, 25).await;

        let mut collected = Vec::new();
        let mut cursor = None;
        loop {
            let paged = store
                .page(alice, bob, cursor, 7)
                .await
                .expect("page");
            collected.extend(paged.page.messages.clone());
            match paged.page.next_cursor {
                Some(next) => cursor = Some(next.0),
                None => break,
            }
        }

        // Descending pages concatenated then reversed give chronological
        // order with no duplicates and no gaps.
        collected.reverse();
        assert_eq!(collected.len(), 25);
        let texts: Vec<&str> = collected.iter().filter_map(|m| m.text.as_deref()).collect();
        let expected: Vec<String> = (0..25).map(|i| format!("message {i}")).collect();
        assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());

        let ids: HashSet<Uuid> = collected.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 25);
    }

    #[tokio::test]
    async fn page_limit_and_cursor_boundaries() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        seed(&store, alice, bob, 25).await;

        let first = store.page(alice, bob, None, 20).await.expect("first page");
        assert_eq!(first.page.messages.len(), 20);
        assert!(first.page.has_more);
        let boundary = first.page.messages.last().expect("oldest in page");
        assert_eq!(
            first.page.next_cursor.as_ref().expect("cursor"),
            &boundary.created_at
        );

        let second = store
            .page(alice, bob, first.page.next_cursor.map(|c| c.0), 20)
            .await
            .expect("second page");
        assert_eq!(second.page.messages.len(), 5);
        assert!(!second.page.has_more);
        assert!(second.page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn page_marks_inbound_messages_seen_atomically() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();

        let sent = store
            .append(alice, bob, Some("hi".into()), None)
            .await
            .expect("append");
        assert!(!sent.seen);

        // Bob opens the conversation: the fetch itself flips seen.
        let paged = store.page(bob, alice, None, 20).await.expect("page");
        assert_eq!(paged.newly_seen, vec![sent.id]);
        let fetched = &paged.page.messages[0];
        assert!(fetched.seen);
        assert!(fetched.seen_at.is_some());

        // A second fetch reports no new transitions.
        let again = store.page(bob, alice, None, 20).await.expect("page");
        assert!(again.newly_seen.is_empty());
        assert!(again.page.messages[0].seen);
    }

    #[tokio::test]
    async fn page_does_not_mark_own_sent_messages() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        seed(&store, alice, bob, 3).await;

        // Alice paging her own conversation must not flip bob's unseen flags.
        let paged = store.page(alice, bob, None, 20).await.expect("page");
        assert!(paged.newly_seen.is_empty());
        assert!(paged.page.messages.iter().all(|m| !m.seen));
    }

    #[tokio::test]
    async fn mark_seen_is_idempotent_and_reports_transitions() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        seed(&store, alice, bob, 3).await;

        let ids = store.unseen_from(alice, bob).await.expect("unseen");
        assert_eq!(ids.len(), 3);

        let first = store.mark_seen(bob, &ids).await.expect("mark seen");
        assert_eq!(first.len(), 3);

        let second = store.mark_seen(bob, &ids).await.expect("mark seen again");
        assert!(second.is_empty(), "second call must report no transitions");

        assert!(store.unseen_from(alice, bob).await.expect("unseen").is_empty());
    }

    #[tokio::test]
    async fn mark_seen_ignores_messages_addressed_to_others() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        let eve = Uuid::new_v4();
        seed(&store, alice, bob, 2).await;

        let ids = store.unseen_from(alice, bob).await.expect("unseen");
        // Eve cannot mark messages addressed to bob.
        let transitioned = store.mark_seen(eve, &ids).await.expect("mark seen");
        assert!(transitioned.is_empty());
    }

    #[tokio::test]
    async fn page_is_scoped_to_the_conversation_pair() {
        let store = MemoryMessageStore::new();
        let (alice, bob) = users();
        let eve = Uuid::new_v4();

        seed(&store, alice, bob, 2).await;
        seed(&store, alice, eve, 3).await;

        let paged = store.page(bob, alice, None, 20).await.expect("page");
        assert_eq!(paged.page.messages.len(), 2);
        assert!(
            paged
                .page
                .messages
                .iter()
                .all(|m| is_between(m, alice, bob))
        );
    }
}
