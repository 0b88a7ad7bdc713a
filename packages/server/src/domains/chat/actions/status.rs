use chrono::Utc;
use serde::Deserialize;

use super::record_event::emit;
use crate::common::{ChatError, UserId};
use crate::domains::chat::events::{ChatEventPayload, StatusPayload};
use crate::domains::chat::models::{ChatStatus, ChatUserProfile};
use crate::domains::chat::store::StateChange;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStatus {
    pub status: Option<String>,
}

/// Sets the caller's chat status and announces it in each of their rooms.
pub async fn update_status(
    acting_user_id: UserId,
    input: UpdateStatus,
    deps: &ServerDeps,
) -> Result<ChatUserProfile, ChatError> {
    let Some(raw) = input.status.filter(|s| !s.trim().is_empty()) else {
        return Err(ChatError::invalid("status", "The status field is required."));
    };
    let status: ChatStatus = raw
        .parse()
        .map_err(|_| ChatError::invalid("status", "The selected status is invalid."))?;

    let current = deps
        .store
        .find_profile(acting_user_id)
        .await?
        .map(|p| p.status)
        .unwrap_or_default();
    if current == status {
        return Err(ChatError::invalid(
            "status",
            format!("The status is already {}.", status),
        ));
    }

    let now = Utc::now();
    emit(
        acting_user_id,
        ChatEventPayload::UserStatus(StatusPayload { status }),
        vec![StateChange::SetStatus {
            user_id: acting_user_id,
            status,
            at: now,
        }],
        deps,
    )
    .await?;

    Ok(deps
        .store
        .find_profile(acting_user_id)
        .await?
        .unwrap_or_else(|| ChatUserProfile::default_for(acting_user_id, now)))
}
