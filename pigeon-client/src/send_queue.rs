use std::collections::VecDeque;

use uuid::Uuid;

use crate::transport::OutboundPayload;

/// One queued submission, tied to its optimistic entry by `local_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSend {
    pub local_id: Uuid,
    pub peer_id: Uuid,
    pub payload: OutboundPayload,
}

/// Client-side FIFO serializing message submission.
///
/// `Empty ↔ Draining`: while draining, exactly one submission is in flight;
/// concurrent submit attempts enqueue instead of interleaving, so the
/// per-conversation send order matches the order the user hit send —
/// whatever the network latency does.
#[derive(Debug, Default)]
pub struct SendQueue {
    items: VecDeque<QueuedSend>,
    draining: bool,
}

impl SendQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: QueuedSend) {
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<QueuedSend> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Claims the drain loop. Returns false when another drain is already
    /// running; the caller must then leave the queue alone.
    pub fn begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    pub fn end_drain(&mut self) {
        self.draining = false;
    }
}
