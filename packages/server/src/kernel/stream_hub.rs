//! In-process pub/sub hub backing the SSE stream endpoint.
//!
//! Channel names are opaque strings (`private-user_<id>_channel`,
//! `presence-partner_<id>`, `overflow_channel`). Each published frame is
//! `{"type": <event name>, "data": <payload>}`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, RwLock};

use super::BaseRealtimeTransport;

#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Returns how many subscribers received the frame (0 when nobody listens).
    pub async fn send(&self, channel: &str, frame: serde_json::Value) -> usize {
        let channels = self.channels.read().await;
        match channels.get(channel) {
            Some(tx) => tx.send(frame).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<serde_json::Value> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drops channels nobody is subscribed to anymore.
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRealtimeTransport for StreamHub {
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        self.send(channel, json!({ "type": event, "data": payload }))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_wraps_event_name() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe("private-user_1_channel").await;

        hub.publish("private-user_1_channel", "chat_event", json!({"type": "message"}))
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame["type"], "chat_event");
        assert_eq!(frame["data"]["type"], "message");
    }

    #[tokio::test]
    async fn test_send_without_subscribers_reaches_nobody() {
        let hub = StreamHub::new();
        assert_eq!(hub.send("overflow_channel", json!({})).await, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_the_frame() {
        let hub = StreamHub::new();
        let mut first = hub.subscribe("presence-partner_9").await;
        let mut second = hub.subscribe("presence-partner_9").await;

        assert_eq!(hub.send("presence-partner_9", json!({"n": 1})).await, 2);
        assert_eq!(first.recv().await.unwrap()["n"], 1);
        assert_eq!(second.recv().await.unwrap()["n"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_drops_abandoned_channels() {
        let hub = StreamHub::new();
        let rx = hub.subscribe("private-user_2_channel").await;
        drop(rx);

        hub.cleanup().await;
        assert!(hub.channels.read().await.is_empty());
    }
}
