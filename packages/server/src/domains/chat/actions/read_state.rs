//! Read markers and unread counts.

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::membership::require_member;
use crate::common::{ChatError, ChatMessageId, ChatRoomId, UnreadCounts, UserId};
use crate::domains::chat::models::UnreadScope;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkMessagesRead {
    #[serde(default)]
    pub message_ids: Vec<ChatMessageId>,
}

/// Marks every message of the room read for the caller.
pub async fn mark_room_read(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    deps: &ServerDeps,
) -> Result<u64, ChatError> {
    require_member(room_id, acting_user_id, deps).await?;
    let marked = deps
        .store
        .mark_all_read_in_room(acting_user_id, room_id, Utc::now())
        .await?;
    debug!(chat_room_id = %room_id, user_id = %acting_user_id, marked, "room marked read");
    Ok(marked)
}

/// Marks the given messages read. Messages in rooms the caller is not an
/// active member of are ignored. Existing read times are kept.
pub async fn mark_messages_read(
    acting_user_id: UserId,
    input: MarkMessagesRead,
    deps: &ServerDeps,
) -> Result<u64, ChatError> {
    if input.message_ids.is_empty() {
        return Err(ChatError::invalid(
            "message_ids",
            "The message ids field is required.",
        ));
    }

    let mut readable = Vec::with_capacity(input.message_ids.len());
    for id in input.message_ids {
        let Some(message) = deps.store.find_message(id).await? else {
            continue;
        };
        let member = deps
            .store
            .membership(message.chat_room_id, acting_user_id)
            .await?;
        if member.is_some_and(|m| m.is_active()) && !readable.contains(&id) {
            readable.push(id);
        }
    }

    if readable.is_empty() {
        return Ok(0);
    }
    Ok(deps
        .store
        .mark_read(acting_user_id, &readable, Utc::now())
        .await?)
}

pub async fn unread_count(
    acting_user_id: UserId,
    scope: UnreadScope,
    deps: &ServerDeps,
) -> Result<i64, ChatError> {
    Ok(deps.store.unread_count(acting_user_id, scope).await?)
}

/// The `unread_counts` block attached to every response.
pub async fn unread_counts(
    acting_user_id: UserId,
    deps: &ServerDeps,
) -> Result<UnreadCounts, ChatError> {
    Ok(deps.store.unread_counts(acting_user_id).await?)
}
