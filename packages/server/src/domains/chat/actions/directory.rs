//! Read-only views over the platform directory, decorated with chat status.

use serde::Serialize;

use crate::common::{ChatError, PartnerId, UserId};
use crate::domains::chat::models::ChatStatus;
use crate::kernel::{DirectoryPartner, DirectoryUser, ServerDeps};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    pub status: ChatStatus,
}

impl ChatUser {
    fn from_directory(user: DirectoryUser, status: ChatStatus) -> Self {
        Self {
            name: user.full_name(),
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    #[serde(flatten)]
    pub user: ChatUser,
    pub partner_ids: Vec<PartnerId>,
}

/// Directory users for `user_ids`, in the given order, with their status.
/// Ids unknown to the directory are skipped.
pub async fn chat_users(
    user_ids: &[UserId],
    deps: &ServerDeps,
) -> Result<Vec<ChatUser>, ChatError> {
    let found = deps.users.find_users(user_ids).await?;

    let mut users = Vec::with_capacity(found.len());
    for id in user_ids {
        let Some(user) = found.iter().find(|u| u.id == *id) else {
            continue;
        };
        let status = deps
            .store
            .find_profile(*id)
            .await?
            .map(|p| p.status)
            .unwrap_or_default();
        users.push(ChatUser::from_directory(user.clone(), status));
    }
    Ok(users)
}

/// Everyone tied to the caller's partners (optionally one of them), once each.
pub async fn list_users(
    acting_user_id: UserId,
    partner_id: Option<PartnerId>,
    deps: &ServerDeps,
) -> Result<Vec<ChatUser>, ChatError> {
    let partners = deps.users.partner_ids_for_user(acting_user_id).await?;

    let mut ids: Vec<UserId> = Vec::new();
    for partner in partners
        .into_iter()
        .filter(|p| partner_id.map_or(true, |wanted| wanted == *p))
    {
        for user_id in deps.partners.flat_user_list(partner).await? {
            if !ids.contains(&user_id) {
                ids.push(user_id);
            }
        }
    }

    chat_users(&ids, deps).await
}

pub async fn current_user(
    acting_user_id: UserId,
    deps: &ServerDeps,
) -> Result<CurrentUser, ChatError> {
    let user = chat_users(&[acting_user_id], deps)
        .await?
        .pop()
        .ok_or(ChatError::NotFound("User"))?;
    let partner_ids = deps.users.partner_ids_for_user(acting_user_id).await?;

    Ok(CurrentUser { user, partner_ids })
}

pub async fn list_partners(
    acting_user_id: UserId,
    deps: &ServerDeps,
) -> Result<Vec<DirectoryPartner>, ChatError> {
    let ids = deps.users.partner_ids_for_user(acting_user_id).await?;
    Ok(deps.partners.find_partners(&ids).await?)
}
