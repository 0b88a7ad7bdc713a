//! Room creation, listing and renaming.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::directory::ChatUser;
use super::membership::{active_member_users, join_room, join_with, require_member};
use super::record_event::emit;
use crate::common::{ChatError, ChatRoomId, FieldErrors, PartnerId, UserId};
use crate::domains::chat::events::{ChatEventPayload, RoomPayload};
use crate::domains::chat::models::{ChatMessage, ChatRoom, UnreadScope};
use crate::domains::chat::store::StateChange;
use crate::kernel::ServerDeps;

const NAME_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRoom {
    pub name: Option<String>,
    pub partner_id: Option<PartnerId>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub invited_user_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenameRoom {
    pub name: Option<String>,
}

/// One entry of the caller's room list.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub users: Vec<ChatUser>,
    pub latest_message: Option<ChatMessage>,
    pub unread_count: i64,
}

fn validated_name(name: Option<&str>, errors: &mut FieldErrors) -> String {
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        errors
            .entry("name".to_string())
            .or_default()
            .push("The name field is required.".to_string());
    } else if name.chars().count() > NAME_MAX_CHARS {
        errors.entry("name".to_string()).or_default().push(format!(
            "The name may not be greater than {} characters.",
            NAME_MAX_CHARS
        ));
    }
    name.to_string()
}

// ============================================================================
// Entry Point: Create Room
// ============================================================================

/// Creates a room for one of the caller's partners. The owner joins first;
/// invited users with access to the partner join directly, others are
/// skipped.
pub async fn create_room(
    acting_user_id: UserId,
    input: CreateRoom,
    deps: &ServerDeps,
) -> Result<ChatRoom, ChatError> {
    let mut errors = FieldErrors::new();
    let name = validated_name(input.name.as_deref(), &mut errors);
    if input.partner_id.is_none() {
        errors
            .entry("partner_id".to_string())
            .or_default()
            .push("The partner id field is required.".to_string());
    }
    let Some(partner_id) = input.partner_id.filter(|_| errors.is_empty()) else {
        return Err(ChatError::Validation(errors));
    };

    let partner = deps
        .partners
        .find_partner(partner_id)
        .await?
        .filter(|p| p.active && p.chat_enabled)
        .ok_or_else(|| ChatError::invalid("partner_id", "The selected partner id is invalid."))?;

    let acting_partners = deps.users.partner_ids_for_user(acting_user_id).await?;
    if !acting_partners.contains(&partner.id) {
        return Err(ChatError::Unauthorized);
    }

    let room = ChatRoom::new(name, acting_user_id, partner.id, input.private, Utc::now());
    join_with(
        &room,
        acting_user_id,
        vec![StateChange::CreateRoom(room.clone())],
        deps,
    )
    .await?;
    info!(
        chat_room_id = %room.id,
        partner_id = %partner.id,
        owner = %acting_user_id,
        "chat room created"
    );

    let mut invited: Vec<UserId> = Vec::new();
    for user_id in input.invited_user_ids {
        if user_id != acting_user_id && !invited.contains(&user_id) {
            invited.push(user_id);
        }
    }
    for user_id in invited {
        let partners = deps.users.partner_ids_for_user(user_id).await?;
        if partners.contains(&partner.id) {
            join_room(&room, user_id, deps).await?;
        } else {
            debug!(
                chat_room_id = %room.id,
                %user_id,
                "invited user has no tie to the partner, skipped"
            );
        }
    }

    Ok(room)
}

// ============================================================================
// Entry Point: List Rooms
// ============================================================================

pub async fn list_rooms(
    acting_user_id: UserId,
    partner_id: Option<PartnerId>,
    deps: &ServerDeps,
) -> Result<Vec<RoomSummary>, ChatError> {
    let rooms = deps.store.rooms_for_user(acting_user_id, partner_id).await?;

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        let users = active_member_users(room.id, deps).await?;
        let latest_message = deps.store.latest_message(room.id).await?;
        let unread_count = deps
            .store
            .unread_count(acting_user_id, UnreadScope::Room(room.id))
            .await?;
        summaries.push(RoomSummary {
            room,
            users,
            latest_message,
            unread_count,
        });
    }
    Ok(summaries)
}

// ============================================================================
// Entry Point: Rename Room
// ============================================================================

pub async fn rename_room(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    input: RenameRoom,
    deps: &ServerDeps,
) -> Result<ChatRoom, ChatError> {
    require_member(room_id, acting_user_id, deps).await?;

    let mut errors = FieldErrors::new();
    let name = validated_name(input.name.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(ChatError::Validation(errors));
    }

    emit(
        acting_user_id,
        ChatEventPayload::RoomRename(RoomPayload {
            chat_room_id: room_id,
        }),
        vec![StateChange::RenameRoom {
            chat_room_id: room_id,
            name,
            at: Utc::now(),
        }],
        deps,
    )
    .await?;

    deps.store
        .find_room(room_id)
        .await?
        .ok_or(ChatError::NotFound("Chat room"))
}
