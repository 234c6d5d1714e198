use std::collections::HashMap;

use shared::models::{OnlineSetChangedEvent, PushEvent};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

/// A live push session handed to the transport layer.
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub receiver: mpsc::Receiver<PushEvent>,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    session_id: Uuid,
    sender: mpsc::Sender<PushEvent>,
}

/// Maps each user to their currently connected push session.
///
/// One active session per user: a new connection silently supersedes the
/// old mapping. The registry is volatile, in-memory state owned by the
/// server process and rebuilt empty on restart — after a restart everyone
/// appears offline until their client reconnects, which is the intended
/// degraded mode, not an error.
#[derive(Debug)]
pub struct PresenceRegistry {
    capacity: usize,
    inner: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl PresenceRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a session for `user_id`, superseding any previous one, and
    /// broadcasts the updated online set to every connected session —
    /// including the new one, which therefore receives a snapshot on
    /// connect.
    pub async fn connect(&self, user_id: Uuid) -> SessionHandle {
        let session_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.capacity);

        {
            let mut inner = self.inner.lock().await;
            inner.insert(user_id, SessionEntry { session_id, sender });
        }
        debug!(%user_id, %session_id, "presence connect");

        self.broadcast_online_set().await;
        SessionHandle {
            session_id,
            receiver,
        }
    }

    /// Removes the entry for exactly this session and broadcasts the
    /// updated online set.
    ///
    /// Matching on session identity, not user identity, means an
    /// out-of-order disconnect from a superseded session cannot evict the
    /// user's newer live session.
    pub async fn disconnect(&self, session_id: Uuid) -> bool {
        let removed = {
            let mut inner = self.inner.lock().await;
            let user_id = inner
                .iter()
                .find(|(_, entry)| entry.session_id == session_id)
                .map(|(user_id, _)| *user_id);
            match user_id {
                Some(user_id) => {
                    inner.remove(&user_id);
                    debug!(%user_id, %session_id, "presence disconnect");
                    true
                }
                None => false,
            }
        };

        if removed {
            self.broadcast_online_set().await;
        }
        removed
    }

    /// Live session for `user_id`, if any. Absence means "deliver nothing
    /// now"; the recipient discovers pending messages on their next fetch.
    pub async fn lookup(&self, user_id: Uuid) -> Option<(Uuid, mpsc::Sender<PushEvent>)> {
        let inner = self.inner.lock().await;
        inner
            .get(&user_id)
            .map(|entry| (entry.session_id, entry.sender.clone()))
    }

    /// Currently online user identifiers, sorted for deterministic output.
    pub async fn online_set(&self) -> Vec<Uuid> {
        let inner = self.inner.lock().await;
        let mut users: Vec<Uuid> = inner.keys().copied().collect();
        users.sort();
        users
    }

    async fn broadcast_online_set(&self) {
        let (senders, user_ids) = {
            let inner = self.inner.lock().await;
            let senders: Vec<mpsc::Sender<PushEvent>> =
                inner.values().map(|entry| entry.sender.clone()).collect();
            let mut user_ids: Vec<Uuid> = inner.keys().copied().collect();
            user_ids.sort();
            (senders, user_ids)
        };

        metrics::gauge!("pigeon_online_users").set(user_ids.len() as f64);

        let event = PushEvent::OnlineSetChanged {
            payload: OnlineSetChangedEvent { user_ids },
        };
        for sender in senders {
            // A closed receiver just means that session is on its way out;
            // its exact-match disconnect will clean the entry up.
            let _ = sender.send(event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    async fn next_online_set(handle: &mut SessionHandle) -> Vec<Uuid> {
        let event = timeout(Duration::from_secs(1), handle.receiver.recv())
            .await
            .expect("event within deadline")
            .expect("channel open");
        match event {
            PushEvent::OnlineSetChanged { payload } => payload.user_ids,
            other => panic!("expected online-set-changed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_broadcasts_snapshot_to_new_session() {
        let registry = PresenceRegistry::new(8);
        let alice = Uuid::new_v4();

        let mut handle = registry.connect(alice).await;
        let online = next_online_set(&mut handle).await;
        assert_eq!(online, vec![alice]);
    }

    #[tokio::test]
    async fn membership_changes_reach_existing_sessions() {
        let registry = PresenceRegistry::new(8);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut alice_handle = registry.connect(alice).await;
        let _ = next_online_set(&mut alice_handle).await;

        let _bob_handle = registry.connect(bob).await;
        let online = next_online_set(&mut alice_handle).await;
        assert_eq!(online.len(), 2);
        assert!(online.contains(&alice) && online.contains(&bob));
    }

    #[tokio::test]
    async fn disconnect_removes_only_the_exact_session() {
        let registry = PresenceRegistry::new(8);
        let alice = Uuid::new_v4();

        let stale = registry.connect(alice).await;
        // Reconnect before the old transport notices it is gone.
        let live = registry.connect(alice).await;

        // The stale session's late disconnect must not evict the new one.
        assert!(!registry.disconnect(stale.session_id).await);
        assert!(registry.lookup(alice).await.is_some());
        assert_eq!(registry.online_set().await, vec![alice]);

        assert!(registry.disconnect(live.session_id).await);
        assert!(registry.lookup(alice).await.is_none());
        assert!(registry.online_set().await.is_empty());
    }

    #[tokio::test]
    async fn lookup_miss_for_unknown_user() {
        let registry = PresenceRegistry::new(8);
        assert!(registry.lookup(Uuid::new_v4()).await.is_none());
    }
}
