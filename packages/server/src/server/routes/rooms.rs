use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;

use super::{respond, ApiResult};
use crate::common::{ChatRoomId, PartnerId, UserId};
use crate::domains::chat::actions::{
    self, ChatUser, CreateRoom, CreateInvitation, RenameRoom, RoomSummary,
};
use crate::domains::chat::models::{ChatRoom, ChatRoomInvitation};
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct PartnerFilter {
    pub partner_id: Option<PartnerId>,
}

/// GET /chat-rooms?partner_id=
pub async fn list_rooms_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Query(filter): Query<PartnerFilter>,
) -> ApiResult<Vec<RoomSummary>> {
    let rooms = actions::list_rooms(user.user_id, filter.partner_id, &state.deps).await?;
    respond(user.user_id, rooms, &state.deps).await
}

/// POST /chat-rooms
pub async fn create_room_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(input): Json<CreateRoom>,
) -> ApiResult<ChatRoom> {
    let room = actions::create_room(user.user_id, input, &state.deps).await?;
    respond(user.user_id, room, &state.deps).await
}

/// PUT /chat-rooms/:room_id
pub async fn rename_room_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(room_id): Path<ChatRoomId>,
    Json(input): Json<RenameRoom>,
) -> ApiResult<ChatRoom> {
    let room = actions::rename_room(user.user_id, room_id, input, &state.deps).await?;
    respond(user.user_id, room, &state.deps).await
}

/// POST /chat-rooms/:room_id/invitations
pub async fn invite_to_room_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(room_id): Path<ChatRoomId>,
    Json(input): Json<CreateInvitation>,
) -> ApiResult<ChatRoomInvitation> {
    let invitation =
        actions::create_invitation(user.user_id, room_id, input.user_id, &state.deps).await?;
    respond(user.user_id, invitation, &state.deps).await
}

/// GET /chat-rooms/:room_id/users
pub async fn room_users_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(room_id): Path<ChatRoomId>,
) -> ApiResult<Vec<ChatUser>> {
    let users = actions::room_users(user.user_id, room_id, &state.deps).await?;
    respond(user.user_id, users, &state.deps).await
}

/// DELETE /chat-rooms/:room_id/users/:user_id
pub async fn leave_room_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path((room_id, leaving_user_id)): Path<(ChatRoomId, UserId)>,
) -> ApiResult<()> {
    actions::leave_room(user.user_id, room_id, leaving_user_id, &state.deps).await?;
    respond(user.user_id, (), &state.deps).await
}
