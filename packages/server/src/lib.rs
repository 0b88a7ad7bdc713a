// Secure Chat - core library
//
// Event-sourced chat engine: every state change is recorded as a chat event,
// rendered into room messages with per-member read states, then broadcast
// to the affected users' channels and fanned out as push notifications.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
