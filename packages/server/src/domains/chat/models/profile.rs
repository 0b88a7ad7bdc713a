use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::common::UserId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    #[default]
    Active,
    Away,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatStatus::Active => "active",
            ChatStatus::Away => "away",
        }
    }

    /// Capitalized form used in rendered status messages.
    pub fn label(self) -> &'static str {
        match self {
            ChatStatus::Active => "Active",
            ChatStatus::Away => "Away",
        }
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ChatStatus::Active),
            "away" => Ok(ChatStatus::Away),
            other => Err(anyhow::anyhow!("Invalid chat status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ChatUserProfile {
    pub user_id: UserId,
    pub status: ChatStatus,
    pub data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl ChatUserProfile {
    /// Profile used for users who never set a status.
    pub fn default_for(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            status: ChatStatus::Active,
            data: serde_json::json!({}),
            updated_at: at,
        }
    }

    pub async fn find_by_user(user_id: UserId, pool: &PgPool) -> Result<Option<Self>> {
        let profile = sqlx::query_as::<_, ChatUserProfile>(
            r#"
            SELECT user_id, status, data, updated_at
            FROM chat_user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    pub async fn upsert_status(
        user_id: UserId,
        status: ChatStatus,
        at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let profile = sqlx::query_as::<_, ChatUserProfile>(
            r#"
            INSERT INTO chat_user_profiles (user_id, status, data, created_at, updated_at)
            VALUES ($1, $2, '{}'::jsonb, $3, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
            RETURNING user_id, status, data, updated_at
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(at)
        .fetch_one(conn)
        .await?;

        Ok(profile)
    }
}
