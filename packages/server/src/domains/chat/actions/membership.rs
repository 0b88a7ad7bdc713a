//! Room membership: access checks, joining, leaving, member listing.

use chrono::Utc;
use tracing::info;

use super::directory::{chat_users, ChatUser};
use super::record_event::{emit, not_in_room};
use crate::common::{ChatError, ChatRoomId, UserId};
use crate::domains::chat::events::{ChatEventPayload, RoomPayload};
use crate::domains::chat::models::ChatRoom;
use crate::domains::chat::store::StateChange;
use crate::kernel::ServerDeps;

/// The room, when `user_id` is an active member of it.
pub async fn require_member(
    room_id: ChatRoomId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<ChatRoom, ChatError> {
    let room = deps
        .store
        .find_room(room_id)
        .await?
        .ok_or(ChatError::NotFound("Chat room"))?;

    match deps.store.membership(room_id, user_id).await? {
        Some(member) if member.is_active() => Ok(room),
        _ => Err(ChatError::Unauthorized),
    }
}

/// Attaches the user and records ROOM_JOINED. History already in the room
/// counts as read for the newcomer. Returns false (and records nothing) when
/// the user already was an active member.
pub async fn join_room(
    room: &ChatRoom,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<bool, ChatError> {
    let active = deps
        .store
        .membership(room.id, user_id)
        .await?
        .is_some_and(|m| m.is_active());
    if active {
        info!(chat_room_id = %room.id, %user_id, "already a member, join skipped");
        return Ok(false);
    }
    join_with(room, user_id, Vec::new(), deps).await?;
    Ok(true)
}

/// Records ROOM_JOINED with the membership and read-state changes, after
/// `state`, in one commit.
pub(super) async fn join_with(
    room: &ChatRoom,
    user_id: UserId,
    mut state: Vec<StateChange>,
    deps: &ServerDeps,
) -> Result<(), ChatError> {
    let now = Utc::now();
    state.push(StateChange::AddMember {
        chat_room_id: room.id,
        user_id,
        at: now,
    });
    state.push(StateChange::MarkRoomRead {
        chat_room_id: room.id,
        user_id,
        at: now,
    });

    emit(
        user_id,
        ChatEventPayload::RoomJoined(RoomPayload {
            chat_room_id: room.id,
        }),
        state,
        deps,
    )
    .await?;
    Ok(())
}

/// Detaches `user_id` from the room. Only the user themself may leave.
pub async fn leave_room(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<(), ChatError> {
    if acting_user_id != user_id {
        return Err(ChatError::Unauthorized);
    }
    if deps.store.find_room(room_id).await?.is_none() {
        return Err(ChatError::NotFound("Chat room"));
    }
    if deps.store.membership(room_id, user_id).await?.is_none() {
        return Err(not_in_room());
    }

    emit(
        user_id,
        ChatEventPayload::RoomLeft(RoomPayload {
            chat_room_id: room_id,
        }),
        vec![StateChange::RemoveMember {
            chat_room_id: room_id,
            user_id,
        }],
        deps,
    )
    .await?;

    info!(chat_room_id = %room_id, %user_id, "left chat room");
    Ok(())
}

/// Active members, visible to active members only.
pub async fn room_users(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    deps: &ServerDeps,
) -> Result<Vec<ChatUser>, ChatError> {
    require_member(room_id, acting_user_id, deps).await?;
    active_member_users(room_id, deps).await
}

pub(super) async fn active_member_users(
    room_id: ChatRoomId,
    deps: &ServerDeps,
) -> Result<Vec<ChatUser>, ChatError> {
    let ids: Vec<UserId> = deps
        .store
        .members(room_id)
        .await?
        .into_iter()
        .filter(|m| m.is_active())
        .map(|m| m.user_id)
        .collect();
    chat_users(&ids, deps).await
}
