use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use super::{
    ChangeSet, ChatStore, EventStore, InvitationStore, MessageStore, RoomDirectory, StaleState,
    StateChange, UserProfileStore,
};
use crate::common::{
    ChatEventId, ChatMessageId, ChatRoomId, ChatRoomInvitationId, PartnerId, UnreadCounts, UserId,
};
use crate::domains::chat::models::{
    ChatEvent, ChatMessage, ChatRoom, ChatRoomInvitation, ChatUserProfile, MessagePage,
    PageQuery, ReadState, RoomMember, UnreadScope,
};

/// Postgres-backed chat store. `commit` runs in a single transaction.
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PgChatStore {
    async fn find_event(&self, id: ChatEventId) -> Result<Option<ChatEvent>> {
        ChatEvent::find_by_id(id, &self.pool).await
    }
}

#[async_trait]
impl MessageStore for PgChatStore {
    async fn find_message(&self, id: ChatMessageId) -> Result<Option<ChatMessage>> {
        ChatMessage::find_by_id(id, &self.pool).await
    }

    async fn page_messages(&self, room_id: ChatRoomId, query: PageQuery) -> Result<MessagePage> {
        ChatMessage::page_by_room(room_id, query, &self.pool).await
    }

    async fn latest_message(&self, room_id: ChatRoomId) -> Result<Option<ChatMessage>> {
        ChatMessage::latest_new_message(room_id, &self.pool).await
    }

    async fn read_states_for_message(&self, message_id: ChatMessageId) -> Result<Vec<ReadState>> {
        ReadState::find_for_message(message_id, &self.pool).await
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        message_ids: &[ChatMessageId],
        at: DateTime<Utc>,
    ) -> Result<u64> {
        ReadState::mark_read(user_id, message_ids, at, &self.pool).await
    }

    async fn mark_all_read_in_room(
        &self,
        user_id: UserId,
        room_id: ChatRoomId,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        ReadState::mark_all_read_in_room(user_id, room_id, at, &mut conn).await
    }

    async fn unread_count(&self, user_id: UserId, scope: UnreadScope) -> Result<i64> {
        ReadState::unread_count(user_id, scope, &self.pool).await
    }

    async fn unread_counts(&self, user_id: UserId) -> Result<UnreadCounts> {
        ReadState::unread_counts(user_id, &self.pool).await
    }
}

#[async_trait]
impl RoomDirectory for PgChatStore {
    async fn find_room(&self, id: ChatRoomId) -> Result<Option<ChatRoom>> {
        ChatRoom::find_by_id(id, &self.pool).await
    }

    async fn rooms_for_user(
        &self,
        user_id: UserId,
        partner_id: Option<PartnerId>,
    ) -> Result<Vec<ChatRoom>> {
        ChatRoom::find_for_user(user_id, partner_id, &self.pool).await
    }

    async fn rooms_with_membership(
        &self,
        user_id: UserId,
        partner_id: PartnerId,
    ) -> Result<Vec<ChatRoom>> {
        ChatRoom::find_with_membership(user_id, partner_id, &self.pool).await
    }

    async fn members(&self, room_id: ChatRoomId) -> Result<Vec<RoomMember>> {
        ChatRoom::members(room_id, &self.pool).await
    }

    async fn membership(&self, room_id: ChatRoomId, user_id: UserId) -> Result<Option<RoomMember>> {
        ChatRoom::membership(room_id, user_id, &self.pool).await
    }
}

#[async_trait]
impl InvitationStore for PgChatStore {
    async fn find_invitation(
        &self,
        id: ChatRoomInvitationId,
    ) -> Result<Option<ChatRoomInvitation>> {
        ChatRoomInvitation::find_by_id(id, &self.pool).await
    }

    async fn pending_invitations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ChatRoomInvitation>> {
        ChatRoomInvitation::find_pending_for_user(user_id, &self.pool).await
    }
}

#[async_trait]
impl UserProfileStore for PgChatStore {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<ChatUserProfile>> {
        ChatUserProfile::find_by_user(user_id, &self.pool).await
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<ReadState>> {
        // Dropping `tx` on any early return rolls the whole change set back.
        let mut tx = self.pool.begin().await?;

        for change in &changes.state {
            apply(change, &mut *tx).await?;
        }

        if let Some(event) = &changes.event {
            event.insert(&mut *tx).await?;
        }

        let mut read_states = Vec::new();
        for message in &changes.messages {
            message.insert(&mut *tx).await?;
            read_states.extend(message.insert_read_states(&mut *tx).await?);
        }

        for event in &changes.message_events {
            event.insert(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(
            state_changes = changes.state.len(),
            messages = changes.messages.len(),
            read_states = read_states.len(),
            "chat change set committed"
        );

        Ok(read_states)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn apply(change: &StateChange, conn: &mut PgConnection) -> Result<()> {
    match change {
        StateChange::CreateRoom(room) => room.insert(conn).await?,
        StateChange::RenameRoom {
            chat_room_id,
            name,
            at,
        } => ChatRoom::rename(*chat_room_id, name, *at, conn).await?,
        StateChange::AddMember {
            chat_room_id,
            user_id,
            at,
        } => {
            ChatRoom::add_member(*chat_room_id, *user_id, *at, conn).await?;
        }
        StateChange::RemoveMember {
            chat_room_id,
            user_id,
        } => {
            if !ChatRoom::remove_member(*chat_room_id, *user_id, conn).await? {
                return Err(StaleState::NotAMember(*chat_room_id, *user_id).into());
            }
        }
        StateChange::DeactivateForPartner {
            user_id,
            partner_id,
            at,
        } => {
            ChatRoom::deactivate_for_partner(*user_id, *partner_id, *at, conn).await?;
        }
        StateChange::MarkRoomRead {
            chat_room_id,
            user_id,
            at,
        } => {
            ReadState::mark_all_read_in_room(*user_id, *chat_room_id, *at, conn).await?;
        }
        StateChange::CreateInvitation(invitation) => invitation.insert(conn).await?,
        StateChange::CloseInvitation { id, state, at } => {
            if !ChatRoomInvitation::close(*id, *state, *at, conn).await? {
                return Err(StaleState::InvitationClosed(*id).into());
            }
        }
        StateChange::SetStatus {
            user_id,
            status,
            at,
        } => {
            ChatUserProfile::upsert_status(*user_id, *status, *at, conn).await?;
        }
    }
    Ok(())
}
