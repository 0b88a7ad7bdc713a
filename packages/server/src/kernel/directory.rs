//! Postgres reads of the platform's identity tables.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::{BasePartnerDirectory, BaseUserDirectory, DirectoryPartner, DirectoryUser};
use crate::common::{PartnerId, UserId};

#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    first_name: String,
    last_name: String,
}

impl From<UserRow> for DirectoryUser {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PartnerRow {
    id: PartnerId,
    name: String,
    active: bool,
    chat_enabled: bool,
}

impl From<PartnerRow> for DirectoryPartner {
    fn from(row: PartnerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            active: row.active,
            chat_enabled: row.chat_enabled,
        }
    }
}

#[async_trait]
impl BaseUserDirectory for PgDirectory {
    async fn find_user(&self, user_id: UserId) -> Result<Option<DirectoryUser>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, first_name, last_name FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_users(&self, user_ids: &[UserId]) -> Result<Vec<DirectoryUser>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name
            FROM users
            WHERE id = ANY($1)
            ORDER BY last_name, first_name, id
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn partner_ids_for_user(&self, user_id: UserId) -> Result<Vec<PartnerId>> {
        let ids = sqlx::query_scalar::<_, PartnerId>(
            r#"
            SELECT p.id
            FROM partners p
            WHERE p.active AND p.chat_enabled
              AND (
                EXISTS (
                    SELECT 1 FROM partner_users pu
                    WHERE pu.partner_id = p.id AND pu.user_id = $1 AND pu.active
                )
                OR EXISTS (
                    SELECT 1
                    FROM partner_providers pp
                    JOIN providers pr ON pr.id = pp.provider_id
                    WHERE pp.partner_id = p.id AND pp.active AND pr.user_id = $1
                )
              )
            ORDER BY p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn tied_partner_ids(&self, user_id: UserId) -> Result<Vec<PartnerId>> {
        let ids = sqlx::query_scalar::<_, PartnerId>(
            r#"
            SELECT pu.partner_id
            FROM partner_users pu
            WHERE pu.user_id = $1 AND pu.active
            UNION
            SELECT pp.partner_id
            FROM partner_providers pp
            JOIN providers pr ON pr.id = pp.provider_id
            WHERE pr.user_id = $1 AND pp.active
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn device_tokens(&self, user_id: UserId) -> Result<Vec<String>> {
        let tokens = sqlx::query_scalar::<_, String>(
            "SELECT token FROM push_tokens WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }
}

#[async_trait]
impl BasePartnerDirectory for PgDirectory {
    async fn find_partner(&self, partner_id: PartnerId) -> Result<Option<DirectoryPartner>> {
        let row = sqlx::query_as::<_, PartnerRow>(
            "SELECT id, name, active, chat_enabled FROM partners WHERE id = $1",
        )
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_partners(&self, partner_ids: &[PartnerId]) -> Result<Vec<DirectoryPartner>> {
        let rows = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT id, name, active, chat_enabled
            FROM partners
            WHERE id = ANY($1)
            ORDER BY name, id
            "#,
        )
        .bind(partner_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn flat_user_list(&self, partner_id: PartnerId) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>(
            r#"
            SELECT user_id FROM (
                SELECT pu.user_id
                FROM partner_users pu
                WHERE pu.partner_id = $1 AND pu.active
                UNION
                SELECT pr.user_id
                FROM partner_providers pp
                JOIN providers pr ON pr.id = pp.provider_id
                WHERE pp.partner_id = $1 AND pp.active
            ) tied
            ORDER BY user_id
            "#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
