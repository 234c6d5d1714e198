#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared wire models and configuration for the Pigeon messaging platform.
//!
//! Everything that crosses the HTTP or push-stream boundary between the
//! server and its clients lives here, so both sides agree on one schema.

pub mod config;
pub mod models;
