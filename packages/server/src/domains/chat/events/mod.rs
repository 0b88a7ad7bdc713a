//! Chat event taxonomy.
//!
//! `ChatEventType` is what the ledger stores in its `type` column.
//! `ChatEventPayload` is the application-side tagged union: each variant pairs
//! one event type with the only payload shape that type accepts, so a payload
//! that does not match its type cannot be constructed. Raw JSON from storage
//! or from callers goes through [`ChatEventPayload::from_parts`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::common::{ChatMessageId, ChatRoomId, ChatRoomInvitationId, PartnerId, UserId};
use crate::domains::chat::models::{ChatMessageType, ChatStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatEventType {
    InvitationAccepted,
    InvitationCancelled,
    InvitationDeclined,
    InvitationSent,
    Message,
    RoomJoined,
    RoomLeft,
    RoomRename,
    UserAddedToPartner,
    UserRemovedFromPartner,
    UserStatus,
}

/// Audience class an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastScope {
    Room,
    User,
    Partner,
    UserPartners,
}

impl ChatEventType {
    pub const ALL: [ChatEventType; 11] = [
        ChatEventType::InvitationAccepted,
        ChatEventType::InvitationCancelled,
        ChatEventType::InvitationDeclined,
        ChatEventType::InvitationSent,
        ChatEventType::Message,
        ChatEventType::RoomJoined,
        ChatEventType::RoomLeft,
        ChatEventType::RoomRename,
        ChatEventType::UserAddedToPartner,
        ChatEventType::UserRemovedFromPartner,
        ChatEventType::UserStatus,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ChatEventType::InvitationAccepted => "invitation_accepted",
            ChatEventType::InvitationCancelled => "invitation_cancelled",
            ChatEventType::InvitationDeclined => "invitation_declined",
            ChatEventType::InvitationSent => "invitation_sent",
            ChatEventType::Message => "message",
            ChatEventType::RoomJoined => "room_joined",
            ChatEventType::RoomLeft => "room_left",
            ChatEventType::RoomRename => "room_rename",
            ChatEventType::UserAddedToPartner => "user_added_to_partner",
            ChatEventType::UserRemovedFromPartner => "user_removed_from_partner",
            ChatEventType::UserStatus => "user_status",
        }
    }

    /// Broadcast audience. Exhaustive: a new event type does not compile
    /// until it is given a scope.
    pub const fn scope(self) -> BroadcastScope {
        match self {
            ChatEventType::Message
            | ChatEventType::RoomJoined
            | ChatEventType::RoomLeft
            | ChatEventType::RoomRename => BroadcastScope::Room,
            ChatEventType::InvitationAccepted
            | ChatEventType::InvitationCancelled
            | ChatEventType::InvitationDeclined
            | ChatEventType::InvitationSent => BroadcastScope::User,
            ChatEventType::UserAddedToPartner | ChatEventType::UserRemovedFromPartner => {
                BroadcastScope::Partner
            }
            ChatEventType::UserStatus => BroadcastScope::UserPartners,
        }
    }

    /// Message type written into the room(s) when this event is recorded,
    /// `None` when the event derives nothing.
    pub const fn derived_message_type(self) -> Option<ChatMessageType> {
        match self {
            ChatEventType::InvitationAccepted => Some(ChatMessageType::InvitationAccept),
            ChatEventType::InvitationCancelled => Some(ChatMessageType::InvitationCancel),
            ChatEventType::InvitationDeclined => Some(ChatMessageType::InvitationDecline),
            ChatEventType::InvitationSent => Some(ChatMessageType::InvitationSend),
            ChatEventType::RoomJoined => Some(ChatMessageType::RoomJoin),
            ChatEventType::RoomLeft => Some(ChatMessageType::RoomLeave),
            ChatEventType::RoomRename => Some(ChatMessageType::RoomRename),
            ChatEventType::UserStatus => Some(ChatMessageType::UserStatus),
            ChatEventType::Message
            | ChatEventType::UserAddedToPartner
            | ChatEventType::UserRemovedFromPartner => None,
        }
    }
}

impl fmt::Display for ChatEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatEventType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChatEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PayloadError::UnknownType(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("unknown chat event type: {0}")]
    UnknownType(String),

    #[error("invalid payload for {event_type}: {source}")]
    Schema {
        event_type: ChatEventType,
        #[source]
        source: serde_json::Error,
    },
}

/// `{chat_room_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomPayload {
    pub chat_room_id: ChatRoomId,
}

/// `{chat_room_invitation_id, chat_room_id, invited_user?}`
///
/// `invited_user` carries the invited user's display name when the actor is
/// someone else (cancellation), so the rendered text needs no extra lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvitationPayload {
    pub chat_room_invitation_id: ChatRoomInvitationId,
    pub chat_room_id: ChatRoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_user: Option<String>,
}

/// `{chat_message_id, chat_room_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagePayload {
    pub chat_message_id: ChatMessageId,
    pub chat_room_id: ChatRoomId,
}

/// `{status}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusPayload {
    pub status: ChatStatus,
}

/// `{user_id, partner_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartnerPayload {
    pub user_id: UserId,
    pub partner_id: PartnerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEventPayload {
    InvitationAccepted(InvitationPayload),
    InvitationCancelled(InvitationPayload),
    InvitationDeclined(InvitationPayload),
    InvitationSent(InvitationPayload),
    Message(MessagePayload),
    RoomJoined(RoomPayload),
    RoomLeft(RoomPayload),
    RoomRename(RoomPayload),
    UserAddedToPartner(PartnerPayload),
    UserRemovedFromPartner(PartnerPayload),
    UserStatus(StatusPayload),
}

impl ChatEventPayload {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            ChatEventPayload::InvitationAccepted(_) => ChatEventType::InvitationAccepted,
            ChatEventPayload::InvitationCancelled(_) => ChatEventType::InvitationCancelled,
            ChatEventPayload::InvitationDeclined(_) => ChatEventType::InvitationDeclined,
            ChatEventPayload::InvitationSent(_) => ChatEventType::InvitationSent,
            ChatEventPayload::Message(_) => ChatEventType::Message,
            ChatEventPayload::RoomJoined(_) => ChatEventType::RoomJoined,
            ChatEventPayload::RoomLeft(_) => ChatEventType::RoomLeft,
            ChatEventPayload::RoomRename(_) => ChatEventType::RoomRename,
            ChatEventPayload::UserAddedToPartner(_) => ChatEventType::UserAddedToPartner,
            ChatEventPayload::UserRemovedFromPartner(_) => ChatEventType::UserRemovedFromPartner,
            ChatEventPayload::UserStatus(_) => ChatEventType::UserStatus,
        }
    }

    /// Room the event is about, when it is room-bound.
    pub fn chat_room_id(&self) -> Option<ChatRoomId> {
        match self {
            ChatEventPayload::InvitationAccepted(p)
            | ChatEventPayload::InvitationCancelled(p)
            | ChatEventPayload::InvitationDeclined(p)
            | ChatEventPayload::InvitationSent(p) => Some(p.chat_room_id),
            ChatEventPayload::Message(p) => Some(p.chat_room_id),
            ChatEventPayload::RoomJoined(p)
            | ChatEventPayload::RoomLeft(p)
            | ChatEventPayload::RoomRename(p) => Some(p.chat_room_id),
            ChatEventPayload::UserAddedToPartner(_)
            | ChatEventPayload::UserRemovedFromPartner(_)
            | ChatEventPayload::UserStatus(_) => None,
        }
    }

    pub fn invitation(&self) -> Option<&InvitationPayload> {
        match self {
            ChatEventPayload::InvitationAccepted(p)
            | ChatEventPayload::InvitationCancelled(p)
            | ChatEventPayload::InvitationDeclined(p)
            | ChatEventPayload::InvitationSent(p) => Some(p),
            _ => None,
        }
    }

    /// Storage form of the payload (the `data` jsonb column).
    pub fn to_value(&self) -> Value {
        let result = match self {
            ChatEventPayload::InvitationAccepted(p)
            | ChatEventPayload::InvitationCancelled(p)
            | ChatEventPayload::InvitationDeclined(p)
            | ChatEventPayload::InvitationSent(p) => serde_json::to_value(p),
            ChatEventPayload::Message(p) => serde_json::to_value(p),
            ChatEventPayload::RoomJoined(p)
            | ChatEventPayload::RoomLeft(p)
            | ChatEventPayload::RoomRename(p) => serde_json::to_value(p),
            ChatEventPayload::UserAddedToPartner(p)
            | ChatEventPayload::UserRemovedFromPartner(p) => serde_json::to_value(p),
            ChatEventPayload::UserStatus(p) => serde_json::to_value(p),
        };
        // Plain structs of ids and enums always serialize.
        result.unwrap_or(Value::Null)
    }

    /// Validates a raw `(type, data)` pair against the per-type schema.
    pub fn from_parts(event_type: ChatEventType, data: Value) -> Result<Self, PayloadError> {
        let schema = |source| PayloadError::Schema { event_type, source };
        Ok(match event_type {
            ChatEventType::InvitationAccepted => {
                ChatEventPayload::InvitationAccepted(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::InvitationCancelled => {
                ChatEventPayload::InvitationCancelled(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::InvitationDeclined => {
                ChatEventPayload::InvitationDeclined(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::InvitationSent => {
                ChatEventPayload::InvitationSent(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::Message => {
                ChatEventPayload::Message(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::RoomJoined => {
                ChatEventPayload::RoomJoined(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::RoomLeft => {
                ChatEventPayload::RoomLeft(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::RoomRename => {
                ChatEventPayload::RoomRename(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::UserAddedToPartner => {
                ChatEventPayload::UserAddedToPartner(serde_json::from_value(data).map_err(schema)?)
            }
            ChatEventType::UserRemovedFromPartner => ChatEventPayload::UserRemovedFromPartner(
                serde_json::from_value(data).map_err(schema)?,
            ),
            ChatEventType::UserStatus => {
                ChatEventPayload::UserStatus(serde_json::from_value(data).map_err(schema)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_table() {
        assert_eq!(ChatEventType::Message.scope(), BroadcastScope::Room);
        assert_eq!(ChatEventType::RoomLeft.scope(), BroadcastScope::Room);
        assert_eq!(ChatEventType::InvitationSent.scope(), BroadcastScope::User);
        assert_eq!(
            ChatEventType::UserRemovedFromPartner.scope(),
            BroadcastScope::Partner
        );
        assert_eq!(ChatEventType::UserStatus.scope(), BroadcastScope::UserPartners);
    }

    #[test]
    fn test_derivation_table() {
        let deriving: Vec<_> = ChatEventType::ALL
            .into_iter()
            .filter(|t| t.derived_message_type().is_some())
            .collect();
        assert_eq!(deriving.len(), 8);
        assert_eq!(ChatEventType::Message.derived_message_type(), None);
        assert_eq!(
            ChatEventType::RoomRename.derived_message_type(),
            Some(ChatMessageType::RoomRename)
        );
    }

    #[test]
    fn test_type_names_parse_back() {
        for event_type in ChatEventType::ALL {
            assert_eq!(event_type.as_str().parse::<ChatEventType>().unwrap(), event_type);
        }
        assert!("room_exploded".parse::<ChatEventType>().is_err());
    }

    #[test]
    fn test_from_parts_accepts_matching_schema() {
        let room = ChatRoomId::new();
        let payload =
            ChatEventPayload::from_parts(ChatEventType::RoomJoined, json!({ "chat_room_id": room }))
                .unwrap();
        assert_eq!(payload, ChatEventPayload::RoomJoined(RoomPayload { chat_room_id: room }));
        assert_eq!(payload.to_value(), json!({ "chat_room_id": room }));
    }

    #[test]
    fn test_from_parts_rejects_wrong_shape() {
        let room = ChatRoomId::new();
        let err = ChatEventPayload::from_parts(
            ChatEventType::Message,
            json!({ "chat_room_id": room }),
        )
        .unwrap_err();
        assert!(matches!(err, PayloadError::Schema { event_type: ChatEventType::Message, .. }));

        assert!(ChatEventPayload::from_parts(
            ChatEventType::RoomJoined,
            json!({ "chat_room_id": room, "extra": 1 }),
        )
        .is_err());
    }

    #[test]
    fn test_invitation_payload_omits_missing_name() {
        let payload = InvitationPayload {
            chat_room_invitation_id: ChatRoomInvitationId::new(),
            chat_room_id: ChatRoomId::new(),
            invited_user: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("invited_user").is_none());
    }

    #[test]
    fn test_status_payload_uses_lowercase() {
        let payload = ChatEventPayload::UserStatus(StatusPayload {
            status: ChatStatus::Away,
        });
        assert_eq!(payload.to_value(), json!({ "status": "away" }));
    }
}
