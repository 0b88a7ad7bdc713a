//! Chat domain - event ledger, rooms, invitations, read tracking and fan-out.
//!
//! Every state change is recorded as a `ChatEvent` by the event processor in
//! `actions::record_event`, together with the room messages it derives, in
//! one transaction. Effects (broadcast, push) run after the commit and never
//! fail the caller.

pub mod actions;
pub mod effects;
pub mod events;
pub mod models;
pub mod store;

pub use events::{BroadcastScope, ChatEventPayload, ChatEventType};
pub use models::*;
