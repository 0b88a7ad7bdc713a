use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::common::{ChatMessageId, ChatRoomId, PartnerId, UnreadCounts, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageType {
    NewMessage,
    RoomJoin,
    RoomLeave,
    RoomRename,
    InvitationSend,
    InvitationAccept,
    InvitationDecline,
    InvitationCancel,
    UserStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub user_id: UserId,
    pub chat_room_id: ChatRoomId,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub message_type: ChatMessageType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user read marker for one message. `read_at = None` means unread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ReadState {
    pub user_id: UserId,
    pub chat_message_id: ChatMessageId,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadScope {
    /// Every room the user is an active member of.
    Global,
    /// Active-membership rooms belonging to one partner.
    Partner(PartnerId),
    Room(ChatRoomId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    /// Older than the anchor (newest page when there is no anchor).
    #[default]
    Prev,
    /// Newer than the anchor.
    Next,
}

pub const DEFAULT_PER_PAGE: i64 = 25;

#[derive(Debug, Clone, Copy)]
pub struct PageQuery {
    pub per_page: i64,
    pub direction: PageDirection,
    pub anchor: Option<ChatMessageId>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            direction: PageDirection::Prev,
            anchor: None,
        }
    }
}

/// One page of a room's messages, always in ascending id order.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub count: i64,
    /// Messages left beyond this page in the paging direction.
    pub remaining: i64,
    pub messages: Vec<ChatMessage>,
}

impl ChatMessage {
    pub fn new(
        user_id: UserId,
        chat_room_id: ChatRoomId,
        message_type: ChatMessageType,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChatMessageId::new(),
            user_id,
            chat_room_id,
            message_type,
            content,
            created_at,
            updated_at: created_at,
        }
    }

    pub async fn find_by_id(id: ChatMessageId, pool: &PgPool) -> Result<Option<Self>> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, user_id, chat_room_id, type, content, created_at, updated_at
            FROM chat_messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    pub async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, user_id, chat_room_id, type, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.chat_room_id)
        .bind(self.message_type)
        .bind(&self.content)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// One read-state row per active member; the author's row is pre-marked
    /// read at the message's creation time.
    pub async fn insert_read_states(&self, conn: &mut PgConnection) -> Result<Vec<ReadState>> {
        let rows = sqlx::query_as::<_, ReadState>(
            r#"
            INSERT INTO chat_message_user (chat_message_id, user_id, read_at)
            SELECT $1, cru.user_id, CASE WHEN cru.user_id = $2 THEN $3 ELSE NULL END
            FROM chat_room_users cru
            WHERE cru.chat_room_id = $4 AND cru.state = 'active'
            ON CONFLICT (chat_message_id, user_id) DO NOTHING
            RETURNING user_id, chat_message_id, read_at
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.created_at)
        .bind(self.chat_room_id)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    pub async fn latest_new_message(room_id: ChatRoomId, pool: &PgPool) -> Result<Option<Self>> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, user_id, chat_room_id, type, content, created_at, updated_at
            FROM chat_messages
            WHERE chat_room_id = $1 AND type = 'new_message'
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(room_id)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    pub async fn page_by_room(
        room_id: ChatRoomId,
        query: PageQuery,
        pool: &PgPool,
    ) -> Result<MessagePage> {
        let (page_sql, remaining_sql) = match query.direction {
            PageDirection::Next => (
                r#"
                SELECT id, user_id, chat_room_id, type, content, created_at, updated_at
                FROM chat_messages
                WHERE chat_room_id = $1 AND ($2::uuid IS NULL OR id > $2)
                ORDER BY id ASC
                LIMIT $3
                "#,
                "SELECT COUNT(*) FROM chat_messages WHERE chat_room_id = $1 AND id > $2",
            ),
            PageDirection::Prev => (
                r#"
                SELECT id, user_id, chat_room_id, type, content, created_at, updated_at
                FROM chat_messages
                WHERE chat_room_id = $1 AND ($2::uuid IS NULL OR id < $2)
                ORDER BY id DESC
                LIMIT $3
                "#,
                "SELECT COUNT(*) FROM chat_messages WHERE chat_room_id = $1 AND id < $2",
            ),
        };

        let mut messages = sqlx::query_as::<_, ChatMessage>(page_sql)
            .bind(room_id)
            .bind(query.anchor)
            .bind(query.per_page)
            .fetch_all(pool)
            .await?;
        messages.sort_by_key(|m| m.id);

        let boundary = match query.direction {
            PageDirection::Next => messages.last(),
            PageDirection::Prev => messages.first(),
        };

        let remaining = match boundary {
            Some(message) => {
                sqlx::query_scalar::<_, i64>(remaining_sql)
                    .bind(room_id)
                    .bind(message.id)
                    .fetch_one(pool)
                    .await?
            }
            None => 0,
        };

        Ok(MessagePage {
            count: messages.len() as i64,
            remaining,
            messages,
        })
    }
}

impl ReadState {
    pub async fn find_for_message(
        message_id: ChatMessageId,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, ReadState>(
            r#"
            SELECT user_id, chat_message_id, read_at
            FROM chat_message_user
            WHERE chat_message_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(message_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Marks the given messages read. An existing `read_at` is kept, so
    /// repeated calls from several devices converge on the first read.
    pub async fn mark_read(
        user_id: UserId,
        message_ids: &[ChatMessageId],
        at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_message_user (chat_message_id, user_id, read_at)
            SELECT m.id, $1, $3
            FROM chat_messages m
            WHERE m.id = ANY($2)
            ON CONFLICT (chat_message_id, user_id)
            DO UPDATE SET read_at = COALESCE(chat_message_user.read_at, EXCLUDED.read_at)
            "#,
        )
        .bind(user_id)
        .bind(message_ids)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_all_read_in_room(
        user_id: UserId,
        room_id: ChatRoomId,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_message_user (chat_message_id, user_id, read_at)
            SELECT m.id, $1, $3
            FROM chat_messages m
            WHERE m.chat_room_id = $2
            ON CONFLICT (chat_message_id, user_id)
            DO UPDATE SET read_at = EXCLUDED.read_at
            WHERE chat_message_user.read_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(room_id)
        .bind(at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_count(user_id: UserId, scope: UnreadScope, pool: &PgPool) -> Result<i64> {
        let (filter, scope_id) = match scope {
            UnreadScope::Global => (ACTIVE_MEMBER_FILTER.to_string(), None),
            UnreadScope::Partner(partner_id) => (
                format!("{} AND r.partner_id = $2", ACTIVE_MEMBER_FILTER),
                Some(partner_id.into_uuid()),
            ),
            UnreadScope::Room(room_id) => {
                ("m.chat_room_id = $2".to_string(), Some(room_id.into_uuid()))
            }
        };

        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM chat_messages m
            JOIN chat_rooms r ON r.id = m.chat_room_id
            WHERE {} AND {}
            "#,
            UNREAD_FILTER, filter
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
        if let Some(scope_id) = scope_id {
            query = query.bind(scope_id);
        }
        let count = query.fetch_one(pool).await?;

        Ok(count)
    }

    pub async fn unread_counts(user_id: UserId, pool: &PgPool) -> Result<UnreadCounts> {
        let sql = format!(
            r#"
            SELECT m.chat_room_id, r.partner_id, COUNT(*)
            FROM chat_messages m
            JOIN chat_rooms r ON r.id = m.chat_room_id
            WHERE {} AND {}
            GROUP BY m.chat_room_id, r.partner_id
            "#,
            UNREAD_FILTER, ACTIVE_MEMBER_FILTER
        );

        let rows = sqlx::query_as::<_, (ChatRoomId, PartnerId, i64)>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await?;

        let mut counts = UnreadCounts::default();
        for (room_id, partner_id, unread) in rows {
            counts.total += unread;
            *counts.partners.entry(partner_id).or_default() += unread;
            counts.rooms.insert(room_id, unread);
        }

        Ok(counts)
    }
}

/// NEW_MESSAGE rows written by someone other than `$1` that `$1` has not read.
const UNREAD_FILTER: &str = r#"
    m.type = 'new_message'
    AND m.user_id <> $1
    AND NOT EXISTS (
        SELECT 1 FROM chat_message_user s
        WHERE s.chat_message_id = m.id AND s.user_id = $1 AND s.read_at IS NOT NULL
    )
"#;

const ACTIVE_MEMBER_FILTER: &str = r#"
    EXISTS (
        SELECT 1 FROM chat_room_users cru
        WHERE cru.chat_room_id = m.chat_room_id AND cru.user_id = $1 AND cru.state = 'active'
    )
"#;
