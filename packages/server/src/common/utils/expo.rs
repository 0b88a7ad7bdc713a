use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kernel::BasePushNotificationService;

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Expo push gateway client used for chat message notifications.
pub struct ExpoClient {
    client: Client,
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: serde_json::Value,
    sound: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: Vec<ExpoTicket>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl ExpoClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            access_token,
        }
    }

    async fn post(&self, messages: &[ExpoMessage<'_>]) -> Result<()> {
        let mut request = self.client.post(EXPO_PUSH_URL).json(messages);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Expo push API error {}: {}", status, body);
        }

        let parsed: ExpoResponse = response.json().await?;
        let failed: Vec<&ExpoTicket> = parsed
            .data
            .iter()
            .filter(|ticket| ticket.status == "error")
            .collect();

        if failed.len() == parsed.data.len() && !failed.is_empty() {
            anyhow::bail!(
                "Expo rejected every ticket: {}",
                failed[0].message.as_deref().unwrap_or("unknown error")
            );
        }
        for ticket in failed {
            warn!(message = ?ticket.message, "Expo ticket error");
        }

        debug!(count = messages.len(), "Expo push accepted");
        Ok(())
    }
}

#[async_trait]
impl BasePushNotificationService for ExpoClient {
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        self.post(&[ExpoMessage {
            to: push_token,
            title,
            body,
            data,
            sound: "default",
        }])
        .await
    }

    async fn send_batch(
        &self,
        notifications: Vec<(&str, &str, &str, serde_json::Value)>,
    ) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }

        let messages: Vec<ExpoMessage> = notifications
            .into_iter()
            .map(|(to, title, body, data)| ExpoMessage {
                to,
                title,
                body,
                data,
                sound: "default",
            })
            .collect();

        self.post(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shape() {
        let message = ExpoMessage {
            to: "ExponentPushToken[abc]",
            title: "Clinic North",
            body: "New Secure Chat Message",
            data: serde_json::json!({"chat_room_id": "r1"}),
            sound: "default",
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["to"], "ExponentPushToken[abc]");
        assert_eq!(json["data"]["chat_room_id"], "r1");
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let client = ExpoClient::new(None);
        assert!(client.send_batch(Vec::new()).await.is_ok());
    }
}
