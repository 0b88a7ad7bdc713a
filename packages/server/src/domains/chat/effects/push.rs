//! Push fan-out for new messages.
//!
//! A `PushJob` is enqueued when a message is posted and handled later on the
//! push worker. Jobs older than the freshness window are dropped. Delivery is
//! at-most-once; failures are logged per recipient and never retried.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::common::{ChatRoomId, DeliveryError};
use crate::domains::chat::models::{ChatMessage, ChatStatus};
use crate::domains::chat::store::ChatStore;
use crate::kernel::{
    BasePartnerDirectory, BasePushNotificationService, BaseUserDirectory, JobHandler, ServerDeps,
};

pub const PUSH_BODY: &str = "New Secure Chat Message";
const FALLBACK_TITLE: &str = "Secure Chat";

#[derive(Debug, Clone)]
pub struct PushJob {
    pub chat_room_id: ChatRoomId,
    pub message: ChatMessage,
}

impl PushJob {
    pub fn for_message(message: &ChatMessage) -> Self {
        Self {
            chat_room_id: message.chat_room_id,
            message: message.clone(),
        }
    }
}

pub struct PushDispatcher {
    store: Arc<dyn ChatStore>,
    users: Arc<dyn BaseUserDirectory>,
    partners: Arc<dyn BasePartnerDirectory>,
    push_service: Arc<dyn BasePushNotificationService>,
    freshness: chrono::Duration,
}

impl PushDispatcher {
    pub fn new(
        store: Arc<dyn ChatStore>,
        users: Arc<dyn BaseUserDirectory>,
        partners: Arc<dyn BasePartnerDirectory>,
        push_service: Arc<dyn BasePushNotificationService>,
        freshness: std::time::Duration,
    ) -> Self {
        Self {
            store,
            users,
            partners,
            push_service,
            freshness: chrono::Duration::from_std(freshness)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
        }
    }

    pub fn from_deps(deps: &ServerDeps) -> Self {
        Self::new(
            deps.store.clone(),
            deps.users.clone(),
            deps.partners.clone(),
            deps.push_service.clone(),
            deps.settings.push_freshness,
        )
    }

    /// Runs the job as of `now`. Returns how many recipients were pushed to.
    pub async fn dispatch(&self, job: &PushJob, now: DateTime<Utc>) -> Result<usize> {
        let message = &job.message;
        let age = now - message.created_at;
        if age > self.freshness {
            debug!(
                message_id = %message.id,
                age_secs = age.num_seconds(),
                "push skipped, message no longer fresh"
            );
            return Ok(0);
        }

        let Some(room) = self.store.find_room(job.chat_room_id).await? else {
            warn!(chat_room_id = %job.chat_room_id, "push skipped, room is gone");
            return Ok(0);
        };
        let title = self
            .partners
            .find_partner(room.partner_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let data = json!({ "chat_room_id": room.id });

        let mut pushed = 0;
        for member in self.store.members(room.id).await? {
            if !member.is_active() || member.user_id == message.user_id {
                continue;
            }

            let status = self
                .store
                .find_profile(member.user_id)
                .await?
                .map(|p| p.status)
                .unwrap_or_default();
            if status != ChatStatus::Active {
                continue;
            }

            let tokens = self.users.device_tokens(member.user_id).await?;
            if tokens.is_empty() {
                continue;
            }

            let batch = tokens
                .iter()
                .map(|token| (token.as_str(), title.as_str(), PUSH_BODY, data.clone()))
                .collect();
            match self.push_service.send_batch(batch).await {
                Ok(()) => pushed += 1,
                Err(source) => {
                    let err = DeliveryError::Push {
                        user_id: member.user_id.to_string(),
                        source,
                    };
                    error!(error = %err, message_id = %message.id, "push delivery failed");
                }
            }
        }

        info!(message_id = %message.id, chat_room_id = %room.id, pushed, "push fan-out finished");
        Ok(pushed)
    }
}

#[async_trait]
impl JobHandler<PushJob> for PushDispatcher {
    async fn handle(&self, job: PushJob) -> Result<()> {
        self.dispatch(&job, Utc::now()).await.map(|_| ())
    }
}
