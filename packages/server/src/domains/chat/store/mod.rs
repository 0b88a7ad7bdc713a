//! Persistence seams for the chat engine.
//!
//! Reads and read-state bookkeeping go through the narrow store traits.
//! Everything an event changes goes through [`ChatStore::commit`] as one
//! atomic unit: the state change behind the event, the ledger entries, the
//! derived messages and their read states.

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::common::{
    ChatEventId, ChatMessageId, ChatRoomId, ChatRoomInvitationId, PartnerId, UnreadCounts, UserId,
};
use crate::domains::chat::models::{
    ChatEvent, ChatMessage, ChatRoom, ChatRoomInvitation, ChatStatus, ChatUserProfile,
    InvitationState, MessagePage, PageQuery, ReadState, RoomMember, UnreadScope,
};

pub use postgres::PgChatStore;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_event(&self, id: ChatEventId) -> Result<Option<ChatEvent>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_message(&self, id: ChatMessageId) -> Result<Option<ChatMessage>>;

    async fn page_messages(&self, room_id: ChatRoomId, query: PageQuery) -> Result<MessagePage>;

    /// Most recent NEW_MESSAGE in the room.
    async fn latest_message(&self, room_id: ChatRoomId) -> Result<Option<ChatMessage>>;

    async fn read_states_for_message(&self, message_id: ChatMessageId) -> Result<Vec<ReadState>>;

    async fn mark_read(
        &self,
        user_id: UserId,
        message_ids: &[ChatMessageId],
        at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn mark_all_read_in_room(
        &self,
        user_id: UserId,
        room_id: ChatRoomId,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn unread_count(&self, user_id: UserId, scope: UnreadScope) -> Result<i64>;

    /// Global, per-partner and per-room breakdown in one pass.
    async fn unread_counts(&self, user_id: UserId) -> Result<UnreadCounts>;
}

#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn find_room(&self, id: ChatRoomId) -> Result<Option<ChatRoom>>;

    async fn rooms_for_user(
        &self,
        user_id: UserId,
        partner_id: Option<PartnerId>,
    ) -> Result<Vec<ChatRoom>>;

    /// Rooms holding any membership row for the user, active or inactive.
    async fn rooms_with_membership(
        &self,
        user_id: UserId,
        partner_id: PartnerId,
    ) -> Result<Vec<ChatRoom>>;

    /// Every membership row, active or not.
    async fn members(&self, room_id: ChatRoomId) -> Result<Vec<RoomMember>>;

    async fn membership(&self, room_id: ChatRoomId, user_id: UserId) -> Result<Option<RoomMember>>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn find_invitation(&self, id: ChatRoomInvitationId)
        -> Result<Option<ChatRoomInvitation>>;

    async fn pending_invitations_for_user(&self, user_id: UserId)
        -> Result<Vec<ChatRoomInvitation>>;
}

#[async_trait]
pub trait UserProfileStore: Send + Sync {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<ChatUserProfile>>;
}

/// A write to room, membership, invitation or profile state. Applied in
/// order, ahead of the event rows, so derived read states see the new
/// membership.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    CreateRoom(ChatRoom),
    RenameRoom {
        chat_room_id: ChatRoomId,
        name: String,
        at: DateTime<Utc>,
    },
    /// Inserts an active membership or reactivates an inactive one.
    AddMember {
        chat_room_id: ChatRoomId,
        user_id: UserId,
        at: DateTime<Utc>,
    },
    /// Fails with [`StaleState::NotAMember`] when there is no row to delete.
    RemoveMember {
        chat_room_id: ChatRoomId,
        user_id: UserId,
    },
    /// Every membership of the user in the partner's rooms goes inactive.
    DeactivateForPartner {
        user_id: UserId,
        partner_id: PartnerId,
        at: DateTime<Utc>,
    },
    /// Everything already in the room counts as read for the user.
    MarkRoomRead {
        chat_room_id: ChatRoomId,
        user_id: UserId,
        at: DateTime<Utc>,
    },
    CreateInvitation(ChatRoomInvitation),
    /// Fails with [`StaleState::InvitationClosed`] unless the invitation is
    /// still pending.
    CloseInvitation {
        id: ChatRoomInvitationId,
        state: InvitationState,
        at: DateTime<Utc>,
    },
    SetStatus {
        user_id: UserId,
        status: ChatStatus,
        at: DateTime<Utc>,
    },
}

/// A guarded [`StateChange`] found the row in another state than the caller
/// checked for. The commit is rolled back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StaleState {
    #[error("invitation {0} is no longer pending")]
    InvitationClosed(ChatRoomInvitationId),

    #[error("user {1} is not in chat room {0}")]
    NotAMember(ChatRoomId, UserId),
}

/// All rows produced by recording one event.
///
/// `messages[i]` is announced by `message_events[i]`. Commit order is the
/// state changes, the primary event, then each message with its read
/// states, then the secondary events.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub state: Vec<StateChange>,
    pub event: Option<ChatEvent>,
    pub messages: Vec<ChatMessage>,
    pub message_events: Vec<ChatEvent>,
}

#[async_trait]
pub trait ChatStore:
    EventStore + MessageStore + RoomDirectory + InvitationStore + UserProfileStore
{
    /// Writes the change set atomically and returns the read-state rows it
    /// created. On error nothing from the change set is persisted.
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<ReadState>>;

    async fn ping(&self) -> Result<()>;
}
