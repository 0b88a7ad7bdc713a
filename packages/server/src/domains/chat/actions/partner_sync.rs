//! Reactions to the platform adding or removing a user's partner ties.

use chrono::Utc;
use tracing::info;

use super::record_event::emit;
use crate::common::{ChatError, PartnerId, UserId};
use crate::domains::chat::events::{ChatEventPayload, PartnerPayload};
use crate::domains::chat::store::StateChange;
use crate::kernel::ServerDeps;

/// The user gained ties to `partner_ids`. Whatever is already in that
/// partner's rooms they have a membership in (inactive ones included)
/// counts as read, and each tie is announced to the partner.
pub async fn user_added_to_partner(
    user_id: UserId,
    partner_ids: &[PartnerId],
    deps: &ServerDeps,
) -> Result<(), ChatError> {
    let now = Utc::now();
    for partner_id in partner_ids {
        let mark_read = deps
            .store
            .rooms_with_membership(user_id, *partner_id)
            .await?
            .into_iter()
            .map(|room| StateChange::MarkRoomRead {
                chat_room_id: room.id,
                user_id,
                at: now,
            })
            .collect();

        emit(
            user_id,
            ChatEventPayload::UserAddedToPartner(PartnerPayload {
                user_id,
                partner_id: *partner_id,
            }),
            mark_read,
            deps,
        )
        .await?;
        info!(%user_id, %partner_id, "user added to partner");
    }
    Ok(())
}

/// The user lost ties to `partner_ids`. Partners the directory still ties
/// the user to (through another path, whether or not the partner is active
/// or chat-enabled) are left alone; for the rest the user's memberships in
/// that partner's rooms go inactive.
pub async fn user_removed_from_partner(
    user_id: UserId,
    partner_ids: &[PartnerId],
    deps: &ServerDeps,
) -> Result<(), ChatError> {
    let remaining = deps.users.tied_partner_ids(user_id).await?;

    for partner_id in partner_ids.iter().filter(|p| !remaining.contains(p)) {
        emit(
            user_id,
            ChatEventPayload::UserRemovedFromPartner(PartnerPayload {
                user_id,
                partner_id: *partner_id,
            }),
            vec![StateChange::DeactivateForPartner {
                user_id,
                partner_id: *partner_id,
                at: Utc::now(),
            }],
            deps,
        )
        .await?;
        info!(%user_id, %partner_id, "user removed from partner");
    }
    Ok(())
}
