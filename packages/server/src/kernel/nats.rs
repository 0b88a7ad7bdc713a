//! NATS-backed real-time transport.
//!
//! Each chat channel maps to the subject `securechat.<channel>`. The raw
//! publish operation sits behind [`NatsPublisher`] so tests can record
//! subjects and payloads without a server.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use super::BaseRealtimeTransport;

pub const SUBJECT_PREFIX: &str = "securechat";

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

#[async_trait]
pub trait NatsPublisher: Send + Sync {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;
}

pub struct NatsClientPublisher {
    client: async_nats::Client,
}

impl NatsClientPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NatsPublisher for NatsClientPublisher {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client.publish(subject, payload).await?;
        Ok(())
    }
}

/// Publishes chat frames (`{"event", "data"}`) onto NATS subjects.
pub struct NatsTransport<P: NatsPublisher> {
    publisher: P,
}

impl<P: NatsPublisher> NatsTransport<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    pub fn subject_for(channel: &str) -> String {
        format!("{}.{}", SUBJECT_PREFIX, channel)
    }
}

#[async_trait]
impl<P: NatsPublisher> BaseRealtimeTransport for NatsTransport<P> {
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        let frame = serde_json::to_vec(&json!({ "event": event, "data": payload }))?;
        self.publisher
            .publish(Self::subject_for(channel), Bytes::from(frame))
            .await
    }
}

/// Records publishes instead of sending them.
#[derive(Default)]
pub struct TestNats {
    published: RwLock<Vec<PublishedMessage>>,
}

impl TestNats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published_messages()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }
}

#[async_trait]
impl NatsPublisher for TestNats {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
        Ok(())
    }
}

#[async_trait]
impl<T: NatsPublisher + ?Sized> NatsPublisher for std::sync::Arc<T> {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        (**self).publish(subject, payload).await
    }
}
