//! Channel subscription grants for the real-time transport.
//!
//! POST /authenticate {channel_name, socket_id}
//!
//! The body is the bare grant (`{auth, channel_data?}`), which is what socket
//! clients expect back from their auth endpoint.

use axum::{extract::Extension, Json};
use serde::Deserialize;

use crate::common::ChatError;
use crate::domains::auth::{authorize_channel, ChannelGrant};
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub channel_name: String,
    pub socket_id: String,
}

pub async fn authenticate_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(request): Json<AuthenticateRequest>,
) -> Result<Json<ChannelGrant>, ChatError> {
    let grant = authorize_channel(
        user.user_id,
        &request.channel_name,
        &request.socket_id,
        &state.deps,
    )
    .await?;
    Ok(Json(grant))
}
