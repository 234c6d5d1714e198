use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use shared::models::{
    ErrorResponse, MarkSeenRequest, MarkSeenResponse, Message, MessagePage, PushEvent,
    SendMessageRequest, Timestamp,
};
use tracing::trace;
use uuid::Uuid;

use crate::transport::{ChatTransport, OutboundPayload, TransportError};

/// HTTP implementation of [`ChatTransport`] plus the push-stream reader.
///
/// Session authentication rides on the cookie store; the identity service
/// that issues the cookie is outside this crate.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport against `base_url` (e.g. `http://localhost:8080`).
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ErrorResponse>().await.ok();
        Err(error_from(status, body))
    }

    /// Opens the per-user push stream (`GET /api/stream`).
    ///
    /// # Errors
    /// Fails when the stream cannot be established; once open, transport
    /// errors surface through [`EventStream::next_event`].
    pub async fn events(&self) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .get(self.api_url("stream"))
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let response = Self::check(response).await?;

        let chunks = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| TransportError::Network(err.to_string()))
        });
        Ok(EventStream::new(Box::pin(chunks)))
    }
}

fn error_from(status: StatusCode, body: Option<ErrorResponse>) -> TransportError {
    let message = body.map_or_else(|| status.to_string(), |body| body.to_string());
    match status {
        StatusCode::BAD_REQUEST => TransportError::Validation(message),
        StatusCode::NOT_FOUND => TransportError::NotFound(message),
        _ => TransportError::Network(message),
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn fetch_page(
        &self,
        peer_id: Uuid,
        cursor: Option<Timestamp>,
        limit: Option<u32>,
    ) -> Result<MessagePage, TransportError> {
        let mut request = self.client.get(self.api_url(&format!("messages/{peer_id}")));
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor.0.to_rfc3339())]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))
    }

    async fn send_message(
        &self,
        peer_id: Uuid,
        payload: OutboundPayload,
    ) -> Result<Message, TransportError> {
        let body = SendMessageRequest {
            text: payload.text,
            media: payload.media,
        };
        let response = self
            .client
            .post(self.api_url(&format!("messages/send/{peer_id}")))
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))
    }

    async fn mark_seen(
        &self,
        peer_id: Uuid,
        message_ids: Vec<Uuid>,
    ) -> Result<Vec<Uuid>, TransportError> {
        let body = MarkSeenRequest {
            message_ids: Some(message_ids),
        };
        let response = self
            .client
            .post(self.api_url(&format!("messages/{peer_id}/mark-seen")))
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let marked: MarkSeenResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(marked.message_ids)
    }
}

/// Incremental decoder for the server's SSE frames.
///
/// Frames may be split across arbitrary chunk boundaries, so input is
/// buffered until a full line is available. The payload line carries the
/// tagged JSON event; undecodable payloads are skipped, not fatal.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    data: String,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and appends every completed event to `out`.
    pub fn feed(&mut self, chunk: &str, out: &mut Vec<PushEvent>) {
        self.buffer.push_str(chunk);

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let trimmed = line.trim_end_matches(['\n', '\r']);

            if let Some(value) = trimmed.strip_prefix("data:") {
                self.data.push_str(value.trim());
            } else if trimmed.is_empty() {
                if !self.data.is_empty() {
                    match serde_json::from_str::<PushEvent>(&self.data) {
                        Ok(event) => out.push(event),
                        Err(err) => trace!(error = %err, "skipping undecodable frame"),
                    }
                    self.data.clear();
                }
            }
            // `event:`/`id:`/comment lines carry nothing the tagged payload
            // does not already include.
        }
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Pull-based reader over the live push connection.
pub struct EventStream {
    chunks: ChunkStream,
    decoder: SseDecoder,
    ready: VecDeque<PushEvent>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("ready", &self.ready.len())
            .finish()
    }
}

impl EventStream {
    fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Next decoded event; `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Option<Result<PushEvent, TransportError>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }

            match self.chunks.next().await? {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    let mut decoded = Vec::new();
                    self.decoder.feed(&text, &mut decoded);
                    self.ready.extend(decoded);
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OnlineSetChangedEvent;

    fn frame(event: &PushEvent) -> String {
        format!(
            "event: {}\ndata: {}\n\n",
            event.event_name(),
            serde_json::to_string(event).unwrap()
        )
    }

    fn sample_event() -> PushEvent {
        PushEvent::OnlineSetChanged {
            payload: OnlineSetChangedEvent {
                user_ids: vec![Uuid::new_v4()],
            },
        }
    }

    #[test]
    fn decodes_a_complete_frame() {
        let event = sample_event();
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();

        decoder.feed(&frame(&event), &mut out);
        assert_eq!(out, vec![event]);
    }

    #[test]
    fn reassembles_frames_split_across_chunks() {
        let event = sample_event();
        let raw = frame(&event);
        let (head, tail) = raw.split_at(raw.len() / 2);

        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        decoder.feed(head, &mut out);
        assert!(out.is_empty(), "half a frame must not decode");
        decoder.feed(tail, &mut out);
        assert_eq!(out, vec![event]);
    }

    #[test]
    fn keepalives_and_garbage_are_skipped() {
        let event = sample_event();
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();

        decoder.feed(": keep-alive\n\n", &mut out);
        decoder.feed("data: not-json\n\n", &mut out);
        decoder.feed(&frame(&event), &mut out);
        assert_eq!(out, vec![event]);
    }

    #[test]
    fn multiple_frames_in_one_chunk_all_decode() {
        let first = sample_event();
        let second = sample_event();
        let chunk = format!("{}{}", frame(&first), frame(&second));

        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&chunk, &mut out);
        assert_eq!(out, vec![first, second]);
    }

    #[test]
    fn status_codes_map_to_the_error_taxonomy() {
        assert!(matches!(
            error_from(StatusCode::BAD_REQUEST, None),
            TransportError::Validation(_)
        ));
        assert!(matches!(
            error_from(StatusCode::NOT_FOUND, None),
            TransportError::NotFound(_)
        ));
        assert!(matches!(
            error_from(StatusCode::INTERNAL_SERVER_ERROR, None),
            TransportError::Network(_)
        ));

        let detailed = error_from(
            StatusCode::BAD_REQUEST,
            Some(ErrorResponse::new("validation_failed", "empty message")),
        );
        assert!(detailed.to_string().contains("empty message"));
    }
}
