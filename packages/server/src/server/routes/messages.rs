use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Serialize;

use super::{respond, ApiResult};
use crate::common::{ChatMessageId, ChatRoomId};
use crate::domains::chat::actions::{self, MarkMessagesRead, MessagesQuery, PostMessage};
use crate::domains::chat::models::{ChatMessage, MessagePage};
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub marked: u64,
}

/// GET /chat-rooms/:room_id/messages?per_page&direction&latest_message_id
pub async fn list_messages_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(room_id): Path<ChatRoomId>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<MessagePage> {
    let page = actions::page_messages(user.user_id, room_id, query, &state.deps).await?;
    respond(user.user_id, page, &state.deps).await
}

/// POST /chat-rooms/:room_id/messages
pub async fn post_message_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(room_id): Path<ChatRoomId>,
    Json(input): Json<PostMessage>,
) -> ApiResult<ChatMessage> {
    let message = actions::post_message(user.user_id, room_id, input, &state.deps).await?;
    respond(user.user_id, message, &state.deps).await
}

/// PUT /chat-rooms/:room_id/messages/mark-as-read
pub async fn mark_room_read_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(room_id): Path<ChatRoomId>,
) -> ApiResult<MarkedRead> {
    let marked = actions::mark_room_read(user.user_id, room_id, &state.deps).await?;
    respond(user.user_id, MarkedRead { marked }, &state.deps).await
}

/// PUT /messages/mark-as-read
pub async fn mark_messages_read_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(input): Json<MarkMessagesRead>,
) -> ApiResult<MarkedRead> {
    let marked = actions::mark_messages_read(user.user_id, input, &state.deps).await?;
    respond(user.user_id, MarkedRead { marked }, &state.deps).await
}

/// GET /messages/:message_id
pub async fn show_message_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(message_id): Path<ChatMessageId>,
) -> ApiResult<ChatMessage> {
    let message = actions::show_message(user.user_id, message_id, &state.deps).await?;
    respond(user.user_id, message, &state.deps).await
}
