//! Post-commit publishing to the real-time transport.
//!
//! Nothing here returns an error. A failed resolution or publish is logged
//! and dropped; clients resynchronize through the pull endpoints.

use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::scope::{channels_for, resolve_channels};
use crate::common::DeliveryError;
use crate::domains::chat::actions::RecordedEvent;
use crate::domains::chat::models::{ChatEvent, ChatMessage};
use crate::kernel::ServerDeps;

pub const CHAT_EVENT: &str = "chat_event";
pub const CHAT_MESSAGE: &str = "chat_message";

/// `{user_id, type, data}`
pub fn event_frame(event: &ChatEvent) -> Value {
    json!({
        "user_id": event.user_id,
        "type": event.event_type,
        "data": event.data,
    })
}

/// `{chat_room_id, message_id, type}`. Content is fetched by id.
pub fn message_frame(message: &ChatMessage) -> Value {
    json!({
        "chat_room_id": message.chat_room_id,
        "message_id": message.id,
        "type": message.message_type,
    })
}

/// Publishes one event to its audience. Returns the number of channels that
/// accepted the frame.
pub async fn broadcast_event(event: &ChatEvent, deps: &ServerDeps) -> usize {
    let channels = match resolve_channels(event, deps).await {
        Ok(channels) => channels,
        Err(e) => {
            error!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "broadcast audience unresolved"
            );
            return 0;
        }
    };

    let delivered = publish_all(&channels, CHAT_EVENT, event_frame(event), deps).await;
    debug!(
        event_id = %event.id,
        event_type = %event.event_type,
        channels = channels.len(),
        delivered,
        "event broadcast"
    );
    delivered
}

/// Announces a message to the room's active members when enabled.
pub async fn broadcast_message(message: &ChatMessage, deps: &ServerDeps) -> usize {
    if !deps.settings.broadcast_messages {
        return 0;
    }

    let members = match deps.store.members(message.chat_room_id).await {
        Ok(members) => members,
        Err(e) => {
            error!(message_id = %message.id, error = %e, "message audience unresolved");
            return 0;
        }
    };
    let recipients: Vec<_> = members
        .into_iter()
        .filter(|m| m.is_active())
        .map(|m| m.user_id)
        .collect();

    let channels = channels_for(&recipients, deps.settings.channel_limit);
    publish_all(&channels, CHAT_MESSAGE, message_frame(message), deps).await
}

/// Everything a recorded change produced: the primary event, each secondary
/// event, and (when enabled) a message frame per derived message.
pub async fn broadcast_recorded(recorded: &RecordedEvent, deps: &ServerDeps) {
    for event in recorded.events() {
        broadcast_event(event, deps).await;
    }
    for message in &recorded.messages {
        broadcast_message(message, deps).await;
    }
}

async fn publish_all(channels: &[String], name: &str, payload: Value, deps: &ServerDeps) -> usize {
    let mut delivered = 0;
    for channel in channels {
        match deps.transport.publish(channel, name, payload.clone()).await {
            Ok(()) => delivered += 1,
            Err(source) => {
                let err = DeliveryError::Publish {
                    channel: channel.clone(),
                    source,
                };
                warn!(error = %err, "broadcast dropped");
            }
        }
    }
    delivered
}
