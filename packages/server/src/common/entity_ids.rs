//! Typed ids for every entity the chat engine touches.
//!
//! Users and partners are owned by the surrounding platform; the chat tables
//! only reference them.

pub use super::id::Id;

/// Platform user (staff member or provider).
pub struct User;

/// Tenant organization.
pub struct Partner;

pub struct ChatRoom;

pub struct ChatMessage;

pub struct ChatEvent;

pub struct ChatRoomInvitation;

pub type UserId = Id<User>;
pub type PartnerId = Id<Partner>;
pub type ChatRoomId = Id<ChatRoom>;
pub type ChatMessageId = Id<ChatMessage>;
pub type ChatEventId = Id<ChatEvent>;
pub type ChatRoomInvitationId = Id<ChatRoomInvitation>;
