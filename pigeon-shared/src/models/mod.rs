pub mod errors;
pub mod events;
pub mod message;
pub mod timestamp;

pub use errors::ErrorResponse;
pub use events::{MessagesSeenEvent, NewMessageEvent, OnlineSetChangedEvent, PushEvent};
pub use message::{MarkSeenRequest, MarkSeenResponse, Message, MessagePage, SendMessageRequest};
pub use timestamp::Timestamp;
