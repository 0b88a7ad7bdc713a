use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::common::{ChatEventId, UserId};
use crate::domains::chat::events::{ChatEventPayload, ChatEventType, PayloadError};

/// Immutable ledger entry. Only the event processor creates these; nothing
/// updates or deletes them.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatEvent {
    pub id: ChatEventId,
    pub user_id: UserId,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub event_type: ChatEventType,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ChatEvent {
    pub fn new(user_id: UserId, payload: &ChatEventPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ChatEventId::new(),
            user_id,
            event_type: payload.event_type(),
            data: payload.to_value(),
            created_at,
        }
    }

    /// Re-validates the stored `data` against the schema for `event_type`.
    pub fn payload(&self) -> Result<ChatEventPayload, PayloadError> {
        ChatEventPayload::from_parts(self.event_type, self.data.clone())
    }

    pub async fn find_by_id(id: ChatEventId, pool: &PgPool) -> Result<Option<Self>> {
        let event = sqlx::query_as::<_, ChatEvent>(
            r#"
            SELECT id, user_id, type, data, created_at
            FROM chat_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(event)
    }

    pub async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_events (id, user_id, type, data, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.event_type)
        .bind(&self.data)
        .bind(self.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
