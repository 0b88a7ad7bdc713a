//! Channel naming and subscription grants for the real-time transport.
//!
//! A client asks `/authenticate` for permission to join a channel with the
//! socket id its connection was given. The grant is
//! `auth = "<app key>:<hex hmac-sha256(secret, socket_id:channel[:channel_data])>"`
//! and the stream endpoint checks it with [`SocketSigner::verify`].

use std::sync::LazyLock;

use hmac::{Hmac, Mac};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, info};

use crate::common::{ChatError, PartnerId, UserId};
use crate::kernel::ServerDeps;

type HmacSha256 = Hmac<Sha256>;

/// Receives events whose audience resolved to nobody.
pub const OVERFLOW_CHANNEL: &str = "overflow_channel";

const PRIVATE_USER_PREFIX: &str = "private-user_";
const PRIVATE_USER_SUFFIX: &str = "_channel";
const PRESENCE_PARTNER_PREFIX: &str = "presence-partner_";

static SOCKET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+$").expect("socket id pattern is valid"));

pub fn private_user_channel(user_id: UserId) -> String {
    format!("{}{}{}", PRIVATE_USER_PREFIX, user_id, PRIVATE_USER_SUFFIX)
}

pub fn presence_partner_channel(partner_id: PartnerId) -> String {
    format!("{}{}", PRESENCE_PARTNER_PREFIX, partner_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelName {
    PrivateUser(UserId),
    PresencePartner(PartnerId),
    Overflow,
}

pub fn parse_channel(name: &str) -> Option<ChannelName> {
    if name == OVERFLOW_CHANNEL {
        return Some(ChannelName::Overflow);
    }
    if let Some(id) = name
        .strip_prefix(PRIVATE_USER_PREFIX)
        .and_then(|rest| rest.strip_suffix(PRIVATE_USER_SUFFIX))
    {
        return UserId::parse(id).ok().map(ChannelName::PrivateUser);
    }
    name.strip_prefix(PRESENCE_PARTNER_PREFIX)
        .and_then(|id| PartnerId::parse(id).ok())
        .map(ChannelName::PresencePartner)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGrant {
    pub auth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
}

/// Signs and verifies channel grants with the app key/secret pair.
pub struct SocketSigner {
    key: String,
    secret: String,
}

impl SocketSigner {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    fn mac(
        &self,
        socket_id: &str,
        channel: &str,
        channel_data: Option<&str>,
    ) -> Result<HmacSha256, ChatError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ChatError::SocketAuthFailure(format!("invalid signing secret: {}", e)))?;
        mac.update(socket_id.as_bytes());
        mac.update(b":");
        mac.update(channel.as_bytes());
        if let Some(data) = channel_data {
            mac.update(b":");
            mac.update(data.as_bytes());
        }
        Ok(mac)
    }

    pub fn sign(
        &self,
        socket_id: &str,
        channel: &str,
        channel_data: Option<&str>,
    ) -> Result<String, ChatError> {
        if !SOCKET_ID.is_match(socket_id) {
            return Err(ChatError::SocketAuthFailure(format!(
                "malformed socket id {:?}",
                socket_id
            )));
        }
        let signature = self.mac(socket_id, channel, channel_data)?.finalize().into_bytes();
        Ok(format!("{}:{}", self.key, hex::encode(signature)))
    }

    /// Constant-time check of an `auth` string produced by [`Self::sign`].
    pub fn verify(
        &self,
        socket_id: &str,
        channel: &str,
        channel_data: Option<&str>,
        auth: &str,
    ) -> bool {
        let Some((key, signature)) = auth.split_once(':') else {
            return false;
        };
        if key != self.key || !SOCKET_ID.is_match(socket_id) {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        match self.mac(socket_id, channel, channel_data) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }
}

/// Decides whether `user_id` may subscribe to `channel_name` and signs the grant.
///
/// Presence channels require a tie to the partner and carry the member's
/// `{user_id, user_info: {id, status}}`. Private channels only open for
/// their owner.
pub async fn authorize_channel(
    user_id: UserId,
    channel_name: &str,
    socket_id: &str,
    deps: &ServerDeps,
) -> Result<ChannelGrant, ChatError> {
    match parse_channel(channel_name) {
        Some(ChannelName::PresencePartner(partner_id)) => {
            let partners = deps.users.partner_ids_for_user(user_id).await?;
            if !partners.contains(&partner_id) {
                debug!(%user_id, channel = channel_name, "presence channel refused");
                return Err(ChatError::Unauthorized);
            }

            let status = deps
                .store
                .find_profile(user_id)
                .await?
                .map(|p| p.status)
                .unwrap_or_default();
            let channel_data = json!({
                "user_id": user_id,
                "user_info": { "id": user_id, "status": status },
            })
            .to_string();

            let auth = deps
                .socket_signer
                .sign(socket_id, channel_name, Some(&channel_data))?;
            info!(%user_id, channel = channel_name, "presence channel granted");
            Ok(ChannelGrant {
                auth,
                channel_data: Some(channel_data),
            })
        }
        Some(ChannelName::PrivateUser(_)) if channel_name == private_user_channel(user_id) => {
            let auth = deps.socket_signer.sign(socket_id, channel_name, None)?;
            info!(%user_id, channel = channel_name, "private channel granted");
            Ok(ChannelGrant {
                auth,
                channel_data: None,
            })
        }
        _ => {
            debug!(%user_id, channel = channel_name, "channel refused");
            Err(ChatError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip_through_parse() {
        let user = UserId::new();
        let partner = PartnerId::new();

        assert_eq!(
            parse_channel(&private_user_channel(user)),
            Some(ChannelName::PrivateUser(user))
        );
        assert_eq!(
            parse_channel(&presence_partner_channel(partner)),
            Some(ChannelName::PresencePartner(partner))
        );
        assert_eq!(parse_channel(OVERFLOW_CHANNEL), Some(ChannelName::Overflow));
        assert_eq!(parse_channel("private-user_42_channel"), None);
        assert_eq!(parse_channel("public-lobby"), None);
    }

    #[test]
    fn test_sign_matches_reference_hmac() {
        let signer = SocketSigner::new("key", "secret");
        let auth = signer.sign("1234.5678", "private-user_x_channel", None).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"1234.5678:private-user_x_channel");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(auth, format!("key:{}", expected));
    }

    #[test]
    fn test_channel_data_is_part_of_signature() {
        let signer = SocketSigner::new("key", "secret");
        let without = signer.sign("1.2", "presence-partner_p", None).unwrap();
        let with = signer.sign("1.2", "presence-partner_p", Some("{}")).unwrap();
        assert_ne!(without, with);
    }

    #[test]
    fn test_malformed_socket_id_is_auth_failure() {
        let signer = SocketSigner::new("key", "secret");
        for socket_id in ["", "abc", "1.2.3", "1:2", "12."] {
            assert!(matches!(
                signer.sign(socket_id, "private-user_x_channel", None),
                Err(ChatError::SocketAuthFailure(_))
            ));
        }
    }

    #[test]
    fn test_verify_accepts_own_grant_only() {
        let signer = SocketSigner::new("key", "secret");
        let auth = signer.sign("10.20", "chan", None).unwrap();

        assert!(signer.verify("10.20", "chan", None, &auth));
        assert!(!signer.verify("10.21", "chan", None, &auth));
        assert!(!signer.verify("10.20", "other", None, &auth));
        assert!(!signer.verify("10.20", "chan", Some("{}"), &auth));

        let foreign = SocketSigner::new("key", "other-secret")
            .sign("10.20", "chan", None)
            .unwrap();
        assert!(!signer.verify("10.20", "chan", None, &foreign));
        assert!(!signer.verify("10.20", "chan", None, "key:not-hex"));
        assert!(!signer.verify("10.20", "chan", None, "no-separator"));
    }
}
