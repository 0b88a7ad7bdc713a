use axum::{
    extract::{Extension, Path},
    Json,
};

use super::{respond, ApiResult};
use crate::common::{ChatError, ChatRoomInvitationId};
use crate::domains::chat::actions::{self, CreateInvitation};
use crate::domains::chat::models::ChatRoomInvitation;
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

/// GET /invitations
pub async fn list_invitations_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> ApiResult<Vec<ChatRoomInvitation>> {
    let invitations = actions::pending_invitations(user.user_id, &state.deps).await?;
    respond(user.user_id, invitations, &state.deps).await
}

/// POST /invitations {chat_room_id, user_id}
pub async fn create_invitation_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(input): Json<CreateInvitation>,
) -> ApiResult<ChatRoomInvitation> {
    let Some(room_id) = input.chat_room_id else {
        return Err(ChatError::invalid(
            "chat_room_id",
            "The chat room id field is required.",
        ));
    };
    let invitation =
        actions::create_invitation(user.user_id, room_id, input.user_id, &state.deps).await?;
    respond(user.user_id, invitation, &state.deps).await
}

/// PUT /invitations/:invitation_id/accept
pub async fn accept_invitation_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(invitation_id): Path<ChatRoomInvitationId>,
) -> ApiResult<ChatRoomInvitation> {
    let invitation = actions::accept_invitation(user.user_id, invitation_id, &state.deps).await?;
    respond(user.user_id, invitation, &state.deps).await
}

/// DELETE /invitations/:invitation_id
pub async fn delete_invitation_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(invitation_id): Path<ChatRoomInvitationId>,
) -> ApiResult<ChatRoomInvitation> {
    let invitation = actions::delete_invitation(user.user_id, invitation_id, &state.deps).await?;
    respond(user.user_id, invitation, &state.deps).await
}
