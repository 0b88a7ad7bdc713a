use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::common::{ChatRoomId, ChatRoomInvitationId, UserId};

/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_invitation_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl InvitationState {
    pub fn is_terminal(self) -> bool {
        self != InvitationState::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ChatRoomInvitation {
    pub id: ChatRoomInvitationId,
    /// Invited user
    pub user_id: UserId,
    pub chat_room_id: ChatRoomId,
    pub invited_by_user_id: UserId,
    pub state: InvitationState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ChatRoomInvitation {
    pub fn new(
        invited_user_id: UserId,
        chat_room_id: ChatRoomId,
        invited_by_user_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChatRoomInvitationId::new(),
            user_id: invited_user_id,
            chat_room_id,
            invited_by_user_id,
            state: InvitationState::Pending,
            created_at,
            closed_at: None,
        }
    }

    pub async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_room_invitations
                (id, user_id, chat_room_id, invited_by_user_id, state, created_at, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.chat_room_id)
        .bind(self.invited_by_user_id)
        .bind(self.state)
        .bind(self.created_at)
        .bind(self.closed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(id: ChatRoomInvitationId, pool: &PgPool) -> Result<Option<Self>> {
        let invitation = sqlx::query_as::<_, ChatRoomInvitation>(
            r#"
            SELECT id, user_id, chat_room_id, invited_by_user_id, state, created_at, closed_at
            FROM chat_room_invitations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(invitation)
    }

    pub async fn find_pending_for_user(user_id: UserId, pool: &PgPool) -> Result<Vec<Self>> {
        let invitations = sqlx::query_as::<_, ChatRoomInvitation>(
            r#"
            SELECT id, user_id, chat_room_id, invited_by_user_id, state, created_at, closed_at
            FROM chat_room_invitations
            WHERE user_id = $1 AND state = 'pending'
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(invitations)
    }

    /// Moves a pending invitation into a terminal state. Returns false when
    /// the invitation was already closed.
    pub async fn close(
        id: ChatRoomInvitationId,
        state: InvitationState,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE chat_room_invitations
            SET state = $2, closed_at = $3
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(state)
        .bind(at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
