//! Invitation lifecycle: PENDING -> ACCEPTED | DECLINED | CANCELLED.
//!
//! Closed invitations are kept with their terminal state and `closed_at`.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::membership::require_member;
use super::record_event::{display_name, emit, invitation_closed};
use crate::common::{ChatError, ChatRoomId, ChatRoomInvitationId, UserId};
use crate::domains::chat::events::{ChatEventPayload, InvitationPayload};
use crate::domains::chat::models::{ChatRoomInvitation, InvitationState};
use crate::domains::chat::store::StateChange;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateInvitation {
    /// Required on `POST /invitations`; taken from the path otherwise.
    pub chat_room_id: Option<ChatRoomId>,
    pub user_id: Option<UserId>,
}

async fn load_invitation(
    id: ChatRoomInvitationId,
    deps: &ServerDeps,
) -> Result<ChatRoomInvitation, ChatError> {
    deps.store
        .find_invitation(id)
        .await?
        .ok_or(ChatError::NotFound("Invitation"))
}

// ============================================================================
// Entry Point: Create Invitation
// ============================================================================

pub async fn create_invitation(
    acting_user_id: UserId,
    room_id: ChatRoomId,
    invited_user_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<ChatRoomInvitation, ChatError> {
    let room = require_member(room_id, acting_user_id, deps).await?;

    let Some(invited_user_id) = invited_user_id else {
        return Err(ChatError::invalid("user_id", "The user id field is required."));
    };
    if invited_user_id == acting_user_id {
        return Err(ChatError::invalid("user_id", "You cannot invite yourself."));
    }
    let invited = deps
        .users
        .find_user(invited_user_id)
        .await?
        .ok_or_else(|| ChatError::invalid("user_id", "The selected user id is invalid."))?;

    let already_member = deps
        .store
        .membership(room_id, invited_user_id)
        .await?
        .is_some_and(|m| m.is_active());
    if already_member {
        return Err(ChatError::invalid("user_id", "The user is already in the chat room."));
    }

    let partners = deps.users.partner_ids_for_user(invited_user_id).await?;
    if !partners.contains(&room.partner_id) {
        return Err(ChatError::invalid(
            "user_id",
            "The user does not belong to the chat room's partner.",
        ));
    }

    let invitation = ChatRoomInvitation::new(invited_user_id, room_id, acting_user_id, Utc::now());
    emit(
        acting_user_id,
        ChatEventPayload::InvitationSent(InvitationPayload {
            chat_room_invitation_id: invitation.id,
            chat_room_id: room_id,
            invited_user: Some(invited.full_name()),
        }),
        vec![StateChange::CreateInvitation(invitation.clone())],
        deps,
    )
    .await?;

    info!(
        invitation_id = %invitation.id,
        chat_room_id = %room_id,
        invited_user_id = %invited_user_id,
        "invitation sent"
    );
    Ok(invitation)
}

// ============================================================================
// Entry Point: Accept Invitation
// ============================================================================

/// Only the invited user may accept. Joining is idempotent; the invitation
/// is closed either way.
pub async fn accept_invitation(
    acting_user_id: UserId,
    invitation_id: ChatRoomInvitationId,
    deps: &ServerDeps,
) -> Result<ChatRoomInvitation, ChatError> {
    let invitation = load_invitation(invitation_id, deps).await?;
    if invitation.user_id != acting_user_id {
        return Err(ChatError::Unauthorized);
    }
    if invitation.state != InvitationState::Pending {
        return Err(invitation_closed());
    }
    if deps.store.find_room(invitation.chat_room_id).await?.is_none() {
        return Err(ChatError::NotFound("Chat room"));
    }

    let now = Utc::now();
    let mut state = Vec::new();
    let already_member = deps
        .store
        .membership(invitation.chat_room_id, acting_user_id)
        .await?
        .is_some_and(|m| m.is_active());
    if already_member {
        info!(
            chat_room_id = %invitation.chat_room_id,
            user_id = %acting_user_id,
            "invited user already a member"
        );
    } else {
        state.push(StateChange::AddMember {
            chat_room_id: invitation.chat_room_id,
            user_id: acting_user_id,
            at: now,
        });
        state.push(StateChange::MarkRoomRead {
            chat_room_id: invitation.chat_room_id,
            user_id: acting_user_id,
            at: now,
        });
    }
    state.push(StateChange::CloseInvitation {
        id: invitation.id,
        state: InvitationState::Accepted,
        at: now,
    });

    emit(
        acting_user_id,
        ChatEventPayload::InvitationAccepted(InvitationPayload {
            chat_room_invitation_id: invitation.id,
            chat_room_id: invitation.chat_room_id,
            invited_user: None,
        }),
        state,
        deps,
    )
    .await?;

    load_invitation(invitation.id, deps).await
}

// ============================================================================
// Entry Point: Delete Invitation (decline / cancel)
// ============================================================================

/// The invited user declines; the inviting user cancels. Anyone else is
/// refused.
pub async fn delete_invitation(
    acting_user_id: UserId,
    invitation_id: ChatRoomInvitationId,
    deps: &ServerDeps,
) -> Result<ChatRoomInvitation, ChatError> {
    let invitation = load_invitation(invitation_id, deps).await?;

    let declining = invitation.user_id == acting_user_id;
    let cancelling = invitation.invited_by_user_id == acting_user_id;
    if !declining && !cancelling {
        return Err(ChatError::Unauthorized);
    }
    if invitation.state != InvitationState::Pending {
        return Err(invitation_closed());
    }

    let state = if declining {
        InvitationState::Declined
    } else {
        InvitationState::Cancelled
    };
    let close = StateChange::CloseInvitation {
        id: invitation.id,
        state,
        at: Utc::now(),
    };

    let payload = if declining {
        ChatEventPayload::InvitationDeclined(InvitationPayload {
            chat_room_invitation_id: invitation.id,
            chat_room_id: invitation.chat_room_id,
            invited_user: None,
        })
    } else {
        ChatEventPayload::InvitationCancelled(InvitationPayload {
            chat_room_invitation_id: invitation.id,
            chat_room_id: invitation.chat_room_id,
            invited_user: Some(display_name(invitation.user_id, deps).await?),
        })
    };
    emit(acting_user_id, payload, vec![close], deps).await?;

    info!(invitation_id = %invitation.id, state = ?state, "invitation closed");
    load_invitation(invitation.id, deps).await
}

// ============================================================================
// Entry Point: List Invitations
// ============================================================================

/// Pending invitations addressed to the caller, newest first.
pub async fn pending_invitations(
    acting_user_id: UserId,
    deps: &ServerDeps,
) -> Result<Vec<ChatRoomInvitation>, ChatError> {
    Ok(deps
        .store
        .pending_invitations_for_user(acting_user_id)
        .await?)
}
