//! Chat domain effects.
//!
//! Effects run after a change set has committed: broadcast to the real-time
//! transport and push fan-out on the job queue.

pub mod broadcaster;
pub mod push;
pub mod scope;

pub use broadcaster::{
    broadcast_event, broadcast_message, broadcast_recorded, event_frame, message_frame,
    CHAT_EVENT, CHAT_MESSAGE,
};
pub use push::{PushDispatcher, PushJob, PUSH_BODY};
pub use scope::{channels_for, resolve_channels, resolve_recipients};
