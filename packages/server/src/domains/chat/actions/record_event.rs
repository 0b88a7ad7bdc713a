//! Event processor - records one chat event with everything it derives.
//!
//! For an event type with a derivation rule the processor renders the
//! message text, picks the target rooms (the payload's room, or every room of
//! the acting user for USER_STATUS) and commits, as one unit:
//!
//! 1. the state changes behind the event (membership, invitation, profile)
//! 2. the primary `ChatEvent`
//! 3. one `ChatMessage` per target room, with a read state per active member
//! 4. one secondary MESSAGE event per derived message
//!
//! A failed commit persists nothing. A guarded state change that lost a race
//! surfaces as the matching `Rejected` error, anything else as
//! `ChatError::Transaction`.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::common::{ChatError, ChatRoomId, UserId};
use crate::domains::chat::effects::broadcast_recorded;
use crate::domains::chat::events::{ChatEventPayload, MessagePayload};
use crate::domains::chat::models::{ChatEvent, ChatMessage, ChatMessageType, ReadState};
use crate::domains::chat::store::{ChangeSet, StaleState, StateChange};
use crate::kernel::ServerDeps;

const UNKNOWN_USER: &str = "A user";

/// Rows written by one call to the processor.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// `None` for posted messages, which only have secondary events.
    pub event: Option<ChatEvent>,
    pub messages: Vec<ChatMessage>,
    /// `message_events[i]` announces `messages[i]`.
    pub message_events: Vec<ChatEvent>,
    pub read_states: Vec<ReadState>,
}

impl RecordedEvent {
    /// Primary event first, then the secondary events.
    pub fn events(&self) -> impl Iterator<Item = &ChatEvent> {
        self.event.iter().chain(self.message_events.iter())
    }
}

/// Records `payload` on behalf of `acting_user_id` without broadcasting.
/// `state` is committed in the same unit, ahead of the event.
pub async fn record_event(
    acting_user_id: UserId,
    payload: ChatEventPayload,
    state: Vec<StateChange>,
    deps: &ServerDeps,
) -> Result<RecordedEvent, ChatError> {
    let now = Utc::now();
    let event = ChatEvent::new(acting_user_id, &payload, now);

    let mut messages = Vec::new();
    if let Some(message_type) = payload.event_type().derived_message_type() {
        let content = render_content(acting_user_id, &payload, &state, deps).await?;
        for room_id in target_rooms(acting_user_id, &payload, deps).await? {
            messages.push(ChatMessage::new(
                acting_user_id,
                room_id,
                message_type,
                content.clone(),
                now,
            ));
        }
    }
    let message_events = announce(&messages, acting_user_id, now);

    let read_states = commit(
        ChangeSet {
            state,
            event: Some(event.clone()),
            messages: messages.clone(),
            message_events: message_events.clone(),
        },
        deps,
    )
    .await?;

    info!(
        event_id = %event.id,
        event_type = %event.event_type,
        user_id = %acting_user_id,
        messages = messages.len(),
        "chat event recorded"
    );

    Ok(RecordedEvent {
        event: Some(event),
        messages,
        message_events,
        read_states,
    })
}

/// Records a user-authored NEW_MESSAGE and its MESSAGE event.
pub async fn record_message(
    author_id: UserId,
    room_id: ChatRoomId,
    content: String,
    deps: &ServerDeps,
) -> Result<RecordedEvent, ChatError> {
    let now = Utc::now();
    let messages = vec![ChatMessage::new(
        author_id,
        room_id,
        ChatMessageType::NewMessage,
        content,
        now,
    )];
    let message_events = announce(&messages, author_id, now);

    let read_states = commit(
        ChangeSet {
            state: Vec::new(),
            event: None,
            messages: messages.clone(),
            message_events: message_events.clone(),
        },
        deps,
    )
    .await?;

    info!(
        message_id = %messages[0].id,
        chat_room_id = %room_id,
        user_id = %author_id,
        recipients = read_states.len(),
        "chat message recorded"
    );

    Ok(RecordedEvent {
        event: None,
        messages,
        message_events,
        read_states,
    })
}

/// Records the event with its state changes, then broadcasts everything it
/// produced.
pub async fn emit(
    acting_user_id: UserId,
    payload: ChatEventPayload,
    state: Vec<StateChange>,
    deps: &ServerDeps,
) -> Result<RecordedEvent, ChatError> {
    let recorded = record_event(acting_user_id, payload, state, deps).await?;
    broadcast_recorded(&recorded, deps).await;
    Ok(recorded)
}

/// Display name for rendered messages.
pub async fn display_name(user_id: UserId, deps: &ServerDeps) -> Result<String, ChatError> {
    let name = deps
        .users
        .find_user(user_id)
        .await?
        .map(|u| u.full_name())
        .filter(|n| !n.is_empty());
    Ok(name.unwrap_or_else(|| UNKNOWN_USER.to_string()))
}

async fn commit(changes: ChangeSet, deps: &ServerDeps) -> Result<Vec<ReadState>, ChatError> {
    deps.store
        .commit(changes)
        .await
        .map_err(|err| match err.downcast::<StaleState>() {
            Ok(StaleState::InvitationClosed(_)) => invitation_closed(),
            Ok(StaleState::NotAMember(..)) => not_in_room(),
            Err(err) => ChatError::Transaction(err),
        })
}

pub(super) fn invitation_closed() -> ChatError {
    ChatError::Rejected {
        error: "invitation_closed",
        description: "The invitation is no longer pending.",
    }
}

pub(super) fn not_in_room() -> ChatError {
    ChatError::Rejected {
        error: "remove_user_failure",
        description: "User is not in the chat room.",
    }
}

fn announce(messages: &[ChatMessage], acting_user_id: UserId, at: DateTime<Utc>) -> Vec<ChatEvent> {
    messages
        .iter()
        .map(|m| {
            let payload = ChatEventPayload::Message(MessagePayload {
                chat_message_id: m.id,
                chat_room_id: m.chat_room_id,
            });
            ChatEvent::new(acting_user_id, &payload, at)
        })
        .collect()
}

async fn render_content(
    acting_user_id: UserId,
    payload: &ChatEventPayload,
    state: &[StateChange],
    deps: &ServerDeps,
) -> Result<String, ChatError> {
    let name = display_name(acting_user_id, deps).await?;

    Ok(match payload {
        ChatEventPayload::RoomJoined(_) => format!("{} joined the room.", name),
        ChatEventPayload::RoomLeft(_) => format!("{} left the room.", name),
        ChatEventPayload::RoomRename(p) => {
            let renamed = state.iter().find_map(|change| match change {
                StateChange::RenameRoom {
                    chat_room_id,
                    name,
                    ..
                } if *chat_room_id == p.chat_room_id => Some(name.clone()),
                _ => None,
            });
            let room_name = match renamed {
                Some(room_name) => room_name,
                None => {
                    deps.store
                        .find_room(p.chat_room_id)
                        .await?
                        .ok_or(ChatError::NotFound("Chat room"))?
                        .name
                }
            };
            format!("{} changed the room name to '{}'.", name, room_name)
        }
        ChatEventPayload::InvitationSent(p) => format!(
            "{} has been invited to room.",
            p.invited_user.as_deref().unwrap_or(UNKNOWN_USER)
        ),
        ChatEventPayload::InvitationAccepted(_) => {
            format!("{} has accepted invitation to room.", name)
        }
        ChatEventPayload::InvitationDeclined(_) => {
            format!("{} has declined invitation to room.", name)
        }
        ChatEventPayload::InvitationCancelled(p) => format!(
            "{} has cancelled room invitation for {}.",
            name,
            p.invited_user.as_deref().unwrap_or("user")
        ),
        ChatEventPayload::UserStatus(p) => {
            format!("{} changed status to {}.", name, p.status.label())
        }
        ChatEventPayload::Message(_)
        | ChatEventPayload::UserAddedToPartner(_)
        | ChatEventPayload::UserRemovedFromPartner(_) => String::new(),
    })
}

async fn target_rooms(
    acting_user_id: UserId,
    payload: &ChatEventPayload,
    deps: &ServerDeps,
) -> Result<Vec<ChatRoomId>, ChatError> {
    if let ChatEventPayload::UserStatus(_) = payload {
        let rooms = deps.store.rooms_for_user(acting_user_id, None).await?;
        return Ok(rooms.into_iter().map(|r| r.id).collect());
    }
    Ok(payload.chat_room_id().into_iter().collect())
}
