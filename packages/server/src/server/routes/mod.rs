// HTTP routes
pub mod authenticate;
pub mod health;
pub mod invitations;
pub mod messages;
pub mod rooms;
pub mod stream;
pub mod users;

pub use authenticate::*;
pub use health::*;
pub use invitations::*;
pub use messages::*;
pub use rooms::*;
pub use stream::*;
pub use users::*;

use axum::Json;

use crate::common::{ChatError, Envelope, UserId};
use crate::domains::chat::actions::unread_counts;
use crate::kernel::ServerDeps;

pub type ApiResult<T> = Result<Json<Envelope<T>>, ChatError>;

/// Wraps `data` with the caller's unread counts, computed after the write.
pub(crate) async fn respond<T>(user_id: UserId, data: T, deps: &ServerDeps) -> ApiResult<T> {
    let counts = unread_counts(user_id, deps).await?;
    Ok(Json(Envelope::new(data, counts)))
}
