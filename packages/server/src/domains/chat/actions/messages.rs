//! Posting, paging and showing room messages.

use serde::Deserialize;
use tracing::warn;

use super::membership::require_member;
use super::record_event::record_message;
use crate::common::{ChatError, ChatMessageId, ChatRoomId, UserId};
use crate::domains::chat::effects::{broadcast_recorded, PushJob};
use crate::domains::chat::models::{
    ChatMessage, MessagePage, PageDirection, PageQuery, DEFAULT_PER_PAGE,
};
use crate::kernel::ServerDeps;

const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMessage {
    pub content: Option<String>,
}

/// `?per_page&direction&latest_message_id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    pub per_page: Option<i64>,
    pub direction: Option<PageDirection>,
    pub latest_message_id: Option<ChatMessageId>,
}

impl MessagesQuery {
    fn into_page_query(self) -> Result<PageQuery, ChatError> {
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page < 1 {
            return Err(ChatError::invalid("per_page", "The per page must be at least 1."));
        }
        Ok(PageQuery {
            per_page: per_page.min(MAX_PER_PAGE),
            direction: self.direction.unwrap_or_default(),
            anchor: self.latest_message_id,
        })
    }
}

// ============================================================================
// Entry Point: Post Message
// ============================================================================

/// Writes the message with read states for every active member, broadcasts
/// the MESSAGE event, then queues the push fan-out.
pub async fn post_message(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    input: PostMessage,
    deps: &ServerDeps,
) -> Result<ChatMessage, ChatError> {
    require_member(room_id, acting_user_id, deps).await?;

    let content = input.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ChatError::invalid("content", "The content field is required."));
    }

    let recorded = record_message(acting_user_id, room_id, content, deps).await?;
    broadcast_recorded(&recorded, deps).await;

    let message = recorded
        .messages
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("message change set came back empty"))?;

    if let Err(e) = deps.push_jobs.enqueue(PushJob::for_message(&message)) {
        warn!(message_id = %message.id, error = %e, "push job not queued");
    }

    Ok(message)
}

// ============================================================================
// Entry Point: Page Messages
// ============================================================================

pub async fn page_messages(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    query: MessagesQuery,
    deps: &ServerDeps,
) -> Result<MessagePage, ChatError> {
    require_member(room_id, acting_user_id, deps).await?;
    let query = query.into_page_query()?;
    Ok(deps.store.page_messages(room_id, query).await?)
}

// ============================================================================
// Entry Point: Show Message
// ============================================================================

pub async fn show_message(
    acting_user_id: UserId,
    message_id: ChatMessageId,
    deps: &ServerDeps,
) -> Result<ChatMessage, ChatError> {
    let message = deps
        .store
        .find_message(message_id)
        .await?
        .ok_or(ChatError::NotFound("Chat message"))?;
    require_member(message.chat_room_id, acting_user_id, deps).await?;
    Ok(message)
}
