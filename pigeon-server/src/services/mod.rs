pub mod delivery;
pub mod media;
pub mod message_store;
pub mod pg_message_store;
pub mod presence;
