use shared::models::PushEvent;

/// Discriminant of a [`PushEvent`] used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    OnlineSetChanged,
    NewMessage,
    MessagesSeen,
}

impl EventKind {
    #[must_use]
    pub fn of(event: &PushEvent) -> Self {
        match event {
            PushEvent::OnlineSetChanged { .. } => EventKind::OnlineSetChanged,
            PushEvent::NewMessage { .. } => EventKind::NewMessage,
            PushEvent::MessagesSeen { .. } => EventKind::MessagesSeen,
        }
    }
}

type Callback = Box<dyn FnMut(&PushEvent) + Send>;

struct RouteEntry {
    key: String,
    kind: Option<EventKind>,
    callback: Callback,
}

/// Handle returned by [`PushRouter::subscribe`]; passing it back removes
/// the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    key: String,
}

/// Dispatches push events to typed handlers.
///
/// Subscriptions are keyed: subscribing again under the same key replaces
/// the previous handler instead of stacking a duplicate, so re-entering a
/// screen cannot double-register its callbacks.
#[derive(Default)]
pub struct PushRouter {
    entries: Vec<RouteEntry>,
}

impl std::fmt::Debug for PushRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRouter")
            .field("subscriptions", &self.entries.len())
            .finish()
    }
}

impl PushRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under `key`, optionally filtered to one event
    /// kind (`None` receives everything).
    pub fn subscribe(
        &mut self,
        key: impl Into<String>,
        kind: Option<EventKind>,
        callback: impl FnMut(&PushEvent) + Send + 'static,
    ) -> Subscription {
        let key = key.into();
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(RouteEntry {
            key: key.clone(),
            kind,
            callback: Box::new(callback),
        });
        Subscription { key }
    }

    /// Removes the subscription; returns false if it was already gone.
    pub fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != subscription.key);
        self.entries.len() != before
    }

    /// Delivers `event` to every matching handler; returns how many ran.
    pub fn dispatch(&mut self, event: &PushEvent) -> usize {
        let kind = EventKind::of(event);
        let mut delivered = 0;
        for entry in &mut self.entries {
            if entry.kind.is_none_or(|wanted| wanted == kind) {
                (entry.callback)(event);
                delivered += 1;
            }
        }
        delivered
    }
}
