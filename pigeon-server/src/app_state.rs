use std::fmt;
use std::sync::Arc;

use crate::services::delivery::DeliveryRouter;
use crate::services::media::{MediaStorage, PassthroughMediaStorage};
use crate::services::message_store::{MemoryMessageStore, MessageStore};
use crate::services::presence::PresenceRegistry;

/// Application state shared across all routes.
///
/// The presence registry inside is volatile: it is rebuilt from scratch on
/// process restart and every user appears offline until their client
/// reconnects.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub presence: Arc<PresenceRegistry>,
    pub delivery: Arc<DeliveryRouter>,
    pub media: Arc<dyn MediaStorage>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MessageStore>,
        presence: Arc<PresenceRegistry>,
        media: Arc<dyn MediaStorage>,
    ) -> Self {
        let delivery = Arc::new(DeliveryRouter::new(presence.clone()));
        Self {
            store,
            presence,
            delivery,
            media,
        }
    }

    /// State backed by the in-memory store. Used by tests and by local
    /// development without a database.
    #[must_use]
    pub fn in_memory(stream_capacity: usize) -> Self {
        Self::new(
            Arc::new(MemoryMessageStore::new()),
            Arc::new(PresenceRegistry::new(stream_capacity)),
            Arc::new(PassthroughMediaStorage),
        )
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish()
    }
}
