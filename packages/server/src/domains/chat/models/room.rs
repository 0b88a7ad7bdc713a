use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::common::{ChatRoomId, PartnerId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub name: String,
    /// Owner
    pub user_id: UserId,
    pub partner_id: PartnerId,
    pub private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inactive members keep their row (and their authored messages) but no
/// longer receive read states, broadcasts or pushes for the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_membership_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RoomMember {
    pub chat_room_id: ChatRoomId,
    pub user_id: UserId,
    pub state: MembershipState,
    pub created_at: DateTime<Utc>,
}

impl RoomMember {
    pub fn is_active(&self) -> bool {
        self.state == MembershipState::Active
    }
}

impl ChatRoom {
    pub fn new(
        name: String,
        owner_id: UserId,
        partner_id: PartnerId,
        private: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChatRoomId::new(),
            name,
            user_id: owner_id,
            partner_id,
            private,
            created_at,
            updated_at: created_at,
        }
    }

    pub async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_rooms (id, name, user_id, partner_id, private, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.user_id)
        .bind(self.partner_id)
        .bind(self.private)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(id: ChatRoomId, pool: &PgPool) -> Result<Option<Self>> {
        let room = sqlx::query_as::<_, ChatRoom>(
            r#"
            SELECT id, name, user_id, partner_id, private, created_at, updated_at
            FROM chat_rooms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(room)
    }

    pub async fn rename(
        id: ChatRoomId,
        name: &str,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query("UPDATE chat_rooms SET name = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(name)
            .bind(at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Rooms the user is an active member of, optionally for one partner.
    pub async fn find_for_user(
        user_id: UserId,
        partner_id: Option<PartnerId>,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rooms = sqlx::query_as::<_, ChatRoom>(
            r#"
            SELECT r.id, r.name, r.user_id, r.partner_id, r.private, r.created_at, r.updated_at
            FROM chat_rooms r
            JOIN chat_room_users cru ON cru.chat_room_id = r.id
            WHERE cru.user_id = $1
              AND cru.state = 'active'
              AND ($2::uuid IS NULL OR r.partner_id = $2)
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .fetch_all(pool)
        .await?;

        Ok(rooms)
    }

    pub async fn find_with_membership(
        user_id: UserId,
        partner_id: PartnerId,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rooms = sqlx::query_as::<_, ChatRoom>(
            r#"
            SELECT r.id, r.name, r.user_id, r.partner_id, r.private, r.created_at, r.updated_at
            FROM chat_rooms r
            JOIN chat_room_users cru ON cru.chat_room_id = r.id
            WHERE cru.user_id = $1 AND r.partner_id = $2
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .fetch_all(pool)
        .await?;

        Ok(rooms)
    }

    pub async fn members(id: ChatRoomId, pool: &PgPool) -> Result<Vec<RoomMember>> {
        let members = sqlx::query_as::<_, RoomMember>(
            r#"
            SELECT chat_room_id, user_id, state, created_at
            FROM chat_room_users
            WHERE chat_room_id = $1
            ORDER BY created_at, user_id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    pub async fn membership(
        id: ChatRoomId,
        user_id: UserId,
        pool: &PgPool,
    ) -> Result<Option<RoomMember>> {
        let member = sqlx::query_as::<_, RoomMember>(
            r#"
            SELECT chat_room_id, user_id, state, created_at
            FROM chat_room_users
            WHERE chat_room_id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Attaches the user as an active member, reactivating an inactive row.
    /// Returns false when the user already was an active member.
    pub async fn add_member(
        id: ChatRoomId,
        user_id: UserId,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_room_users (chat_room_id, user_id, state, created_at, updated_at)
            VALUES ($1, $2, 'active', $3, $3)
            ON CONFLICT (chat_room_id, user_id)
            DO UPDATE SET state = 'active', updated_at = EXCLUDED.updated_at
            WHERE chat_room_users.state <> 'active'
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_member(
        id: ChatRoomId,
        user_id: UserId,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM chat_room_users WHERE chat_room_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn deactivate_for_partner(
        user_id: UserId,
        partner_id: PartnerId,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE chat_room_users cru
            SET state = 'inactive', updated_at = $3
            FROM chat_rooms r
            WHERE r.id = cru.chat_room_id
              AND r.partner_id = $2
              AND cru.user_id = $1
              AND cru.state = 'active'
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .bind(at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}
