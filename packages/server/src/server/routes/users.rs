use axum::{
    extract::{Extension, Query},
    Json,
};

use super::rooms::PartnerFilter;
use super::{respond, ApiResult};
use crate::domains::chat::actions::{self, ChatUser, CurrentUser, UpdateStatus};
use crate::domains::chat::models::ChatUserProfile;
use crate::kernel::DirectoryPartner;
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

/// GET /users?partner_id=
pub async fn list_users_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Query(filter): Query<PartnerFilter>,
) -> ApiResult<Vec<ChatUser>> {
    let users = actions::list_users(user.user_id, filter.partner_id, &state.deps).await?;
    respond(user.user_id, users, &state.deps).await
}

/// GET /users/me
pub async fn me_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> ApiResult<CurrentUser> {
    let me = actions::current_user(user.user_id, &state.deps).await?;
    respond(user.user_id, me, &state.deps).await
}

/// GET /partners
pub async fn list_partners_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> ApiResult<Vec<DirectoryPartner>> {
    let partners = actions::list_partners(user.user_id, &state.deps).await?;
    respond(user.user_id, partners, &state.deps).await
}

/// PUT /user-status {status}
pub async fn update_status_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(input): Json<UpdateStatus>,
) -> ApiResult<ChatUserProfile> {
    let profile = actions::update_status(user.user_id, input, &state.deps).await?;
    respond(user.user_id, profile, &state.deps).await
}
