pub mod server;

pub use server::{Config, LogFormat, Profile};
