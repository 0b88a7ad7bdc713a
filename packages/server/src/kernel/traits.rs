// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no chat rules live here.
// The directories are owned by the surrounding platform; chat only reads them.
//
// Naming convention: Base* for trait names (e.g., BaseUserDirectory)

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::common::{PartnerId, UserId};

// =============================================================================
// Directory Traits (Infrastructure - platform identity)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl DirectoryUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryPartner {
    pub id: PartnerId,
    pub name: String,
    pub active: bool,
    pub chat_enabled: bool,
}

#[async_trait]
pub trait BaseUserDirectory: Send + Sync {
    async fn find_user(&self, user_id: UserId) -> Result<Option<DirectoryUser>>;

    async fn find_users(&self, user_ids: &[UserId]) -> Result<Vec<DirectoryUser>>;

    /// Active, chat-enabled partners the user belongs to, directly or
    /// through an active provider link.
    async fn partner_ids_for_user(&self, user_id: UserId) -> Result<Vec<PartnerId>>;

    /// Every partner the user is still tied to, directly or through an
    /// active provider link, whatever the partner's own flags.
    async fn tied_partner_ids(&self, user_id: UserId) -> Result<Vec<PartnerId>>;

    /// Registered push device tokens.
    async fn device_tokens(&self, user_id: UserId) -> Result<Vec<String>>;
}

#[async_trait]
pub trait BasePartnerDirectory: Send + Sync {
    async fn find_partner(&self, partner_id: PartnerId) -> Result<Option<DirectoryPartner>>;

    async fn find_partners(&self, partner_ids: &[PartnerId]) -> Result<Vec<DirectoryPartner>>;

    /// Every user tied to the partner (direct staff plus users behind active
    /// provider links), deduplicated.
    async fn flat_user_list(&self, partner_id: PartnerId) -> Result<Vec<UserId>>;
}

// =============================================================================
// Push Notification Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BasePushNotificationService: Send + Sync {
    /// Send a push notification to a push token
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()>;

    /// Send multiple notifications in batch
    async fn send_batch(
        &self,
        notifications: Vec<(&str, &str, &str, serde_json::Value)>,
    ) -> Result<()>;
}

// =============================================================================
// Real-time Transport Trait (Infrastructure - channel pub/sub)
// =============================================================================

#[async_trait]
pub trait BaseRealtimeTransport: Send + Sync {
    /// Publish one named event to one channel.
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) -> Result<()>;
}
