//! Reply logger plugin core: taps inbound chat messages, correlates them with the generated
//! reply for the same conversation, and records each pair in a Redis list and a per-agent
//! Redis stream.

pub mod config;
pub mod context;
pub mod cycle;
pub mod diagnostics;
pub mod events;
pub mod handlers;
pub mod init;
pub mod message;
pub mod plugin;
pub mod record;
pub mod sink;
