use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Extension;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use shared::config::Config;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::http::error::AppResult;
use crate::middleware::request_context::CurrentUser;
use crate::services::presence::PresenceRegistry;

/// Removes the session from the registry once the event stream is dropped,
/// i.e. when the client disconnects.
struct PresenceGuard {
    presence: Arc<PresenceRegistry>,
    session_id: Uuid,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        let presence = self.presence.clone();
        let session_id = self.session_id;
        // Disconnect needs the runtime; without one the process is exiting
        // and the registry dies with it.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                presence.disconnect(session_id).await;
            });
        }
    }
}

/// Per-user push stream.
///
/// Connecting registers the session with the presence registry (replacing
/// any previous session for the same user) and immediately delivers an
/// online-set snapshot. Dropping the connection deregisters exactly this
/// session.
pub async fn stream_events(
    Extension(state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    info!(%user_id, "establishing push stream");

    let handle = state.presence.connect(user_id).await;
    let guard = PresenceGuard {
        presence: state.presence.clone(),
        session_id: handle.session_id,
    };

    let stream = ReceiverStream::new(handle.receiver).map(move |event| {
        let _keep = &guard;
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, Infallible>(Event::default().event(event.event_name()).data(data))
    });

    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(config.stream.heartbeat_seconds.max(5)))
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keepalive))
}
