use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub socket_app_key: String,
    pub socket_app_secret: String,
    pub nats_url: Option<String>,
    pub expo_access_token: Option<String>,
    pub chat: ChatSettings,
}

/// Tunables for broadcast and push behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    /// Maximum channels one event is published to.
    pub channel_limit: usize,
    /// Pushes for messages older than this are skipped.
    pub push_freshness: Duration,
    /// USER_STATUS fans out to everyone across the actor's partners.
    pub broadcast_user_partners: bool,
    /// Publish a `chat_message` frame for every new message.
    pub broadcast_messages: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            channel_limit: 100,
            push_freshness: Duration::from_secs(300),
            broadcast_user_partners: false,
            broadcast_messages: false,
        }
    }
}

impl ChatSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            channel_limit: match env::var("CHAT_CHANNEL_LIMIT") {
                Ok(v) => v
                    .parse()
                    .context("CHAT_CHANNEL_LIMIT must be a valid number")?,
                Err(_) => defaults.channel_limit,
            },
            push_freshness: match env::var("CHAT_PUSH_FRESHNESS_SECS") {
                Ok(v) => Duration::from_secs(
                    v.parse()
                        .context("CHAT_PUSH_FRESHNESS_SECS must be a valid number")?,
                ),
                Err(_) => defaults.push_freshness,
            },
            broadcast_user_partners: env_flag("CHAT_BROADCAST_USER_PARTNERS")?,
            broadcast_messages: env_flag("CHAT_BROADCAST_MESSAGES")?,
        })
    }
}

fn env_flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(v) => parse_flag(&v).with_context(|| format!("{} must be true or false", name)),
        Err(_) => Ok(false),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("unrecognised flag value {:?}", other),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "securechat".to_string()),
            socket_app_key: env::var("SOCKET_APP_KEY").context("SOCKET_APP_KEY must be set")?,
            socket_app_secret: env::var("SOCKET_APP_SECRET")
                .context("SOCKET_APP_SECRET must be set")?,
            nats_url: env::var("NATS_URL").ok(),
            expo_access_token: env::var("EXPO_ACCESS_TOKEN").ok(),
            chat: ChatSettings::from_env()?,
        })
    }
}
