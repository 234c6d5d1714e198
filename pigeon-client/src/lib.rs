#![cfg_attr(not(test), forbid(unsafe_code))]

//! Client engine for the Pigeon messaging platform.
//!
//! The pieces compose the way a UI needs them: a [`transport::ChatTransport`]
//! abstracts the HTTP API, the [`reconciler`] merges fetched history,
//! optimistic sends, and push events into one consistent conversation view,
//! the [`send_queue`] serializes outbound submissions, and [`chat::ChatClient`]
//! drives them together on a single logical thread.

pub mod chat;
pub mod events;
pub mod http;
pub mod reconciler;
pub mod send_queue;
pub mod transport;

pub use chat::ChatClient;
pub use transport::{ChatTransport, ClientError, OutboundPayload, TransportError};
