// TestDependencies - in-memory implementations for testing
//
// Provides a store and mock services that can be injected into ServerDeps
// for tests. Nothing here needs a database or network.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::{
    BasePartnerDirectory, BasePushNotificationService, BaseRealtimeTransport, BaseUserDirectory,
    DirectoryPartner, DirectoryUser, JobQueue, ServerDeps, StreamHub,
};
use crate::common::{
    ChatEventId, ChatMessageId, ChatRoomId, ChatRoomInvitationId, PartnerId, UnreadCounts, UserId,
};
use crate::config::ChatSettings;
use crate::domains::auth::{JwtService, SocketSigner};
use crate::domains::chat::effects::PushJob;
use crate::domains::chat::models::{
    ChatEvent, ChatMessage, ChatMessageType, ChatRoom, ChatRoomInvitation, ChatUserProfile,
    InvitationState, MembershipState, MessagePage, PageDirection, PageQuery,
    ReadState, RoomMember, UnreadScope,
};
use crate::domains::chat::store::{
    ChangeSet, ChatStore, EventStore, InvitationStore, MessageStore, RoomDirectory, StaleState,
    StateChange, UserProfileStore,
};

pub const TEST_SOCKET_KEY: &str = "test-app-key";
pub const TEST_SOCKET_SECRET: &str = "test-app-secret";
pub const TEST_JWT_SECRET: &str = "test_secret_key";
pub const TEST_JWT_ISSUER: &str = "securechat-test";

// =============================================================================
// Memory Chat Store
// =============================================================================

/// Where an injected commit failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// After the state changes, before the primary event.
    BeforeEvent,
    /// After the primary event, before any message.
    BeforeMessages,
    /// After the first message row, before its read states.
    BeforeReadStates,
    /// After every message and read state, before the secondary events.
    BeforeSecondaryEvents,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    events: Vec<ChatEvent>,
    messages: Vec<ChatMessage>,
    read_states: BTreeMap<(ChatMessageId, UserId), ReadState>,
    rooms: BTreeMap<ChatRoomId, ChatRoom>,
    members: Vec<RoomMember>,
    invitations: BTreeMap<ChatRoomInvitationId, ChatRoomInvitation>,
    profiles: BTreeMap<UserId, ChatUserProfile>,
}

impl MemoryState {
    fn is_active_member(&self, room_id: ChatRoomId, user_id: UserId) -> bool {
        self.members
            .iter()
            .any(|m| m.chat_room_id == room_id && m.user_id == user_id && m.is_active())
    }

    fn is_unread(&self, message: &ChatMessage, user_id: UserId) -> bool {
        message.message_type == ChatMessageType::NewMessage
            && message.user_id != user_id
            && !self
                .read_states
                .get(&(message.id, user_id))
                .is_some_and(|s| s.read_at.is_some())
    }

    fn mark_all_read_in_room(
        &mut self,
        user_id: UserId,
        room_id: ChatRoomId,
        at: DateTime<Utc>,
    ) -> u64 {
        let ids: Vec<ChatMessageId> = self
            .messages
            .iter()
            .filter(|m| m.chat_room_id == room_id)
            .map(|m| m.id)
            .collect();

        let mut affected = 0;
        for id in ids {
            let row = self
                .read_states
                .entry((id, user_id))
                .or_insert_with(|| ReadState {
                    user_id,
                    chat_message_id: id,
                    read_at: None,
                });
            if row.read_at.is_none() {
                row.read_at = Some(at);
                affected += 1;
            }
        }
        affected
    }

    fn apply(&mut self, change: StateChange) -> Result<()> {
        match change {
            StateChange::CreateRoom(room) => {
                if self.rooms.contains_key(&room.id) {
                    bail!("chat room {} already exists", room.id);
                }
                self.rooms.insert(room.id, room);
            }
            StateChange::RenameRoom {
                chat_room_id,
                name,
                at,
            } => {
                if let Some(room) = self.rooms.get_mut(&chat_room_id) {
                    room.name = name;
                    room.updated_at = at;
                }
            }
            StateChange::AddMember {
                chat_room_id,
                user_id,
                at,
            } => {
                if !self.rooms.contains_key(&chat_room_id) {
                    bail!("chat room {} does not exist", chat_room_id);
                }
                match self
                    .members
                    .iter_mut()
                    .find(|m| m.chat_room_id == chat_room_id && m.user_id == user_id)
                {
                    Some(member) => member.state = MembershipState::Active,
                    None => self.members.push(RoomMember {
                        chat_room_id,
                        user_id,
                        state: MembershipState::Active,
                        created_at: at,
                    }),
                }
            }
            StateChange::RemoveMember {
                chat_room_id,
                user_id,
            } => {
                let before = self.members.len();
                self.members
                    .retain(|m| !(m.chat_room_id == chat_room_id && m.user_id == user_id));
                if self.members.len() == before {
                    return Err(StaleState::NotAMember(chat_room_id, user_id).into());
                }
            }
            StateChange::DeactivateForPartner {
                user_id,
                partner_id,
                at: _,
            } => {
                let partner_rooms: BTreeSet<ChatRoomId> = self
                    .rooms
                    .values()
                    .filter(|r| r.partner_id == partner_id)
                    .map(|r| r.id)
                    .collect();
                for member in self
                    .members
                    .iter_mut()
                    .filter(|m| m.user_id == user_id && partner_rooms.contains(&m.chat_room_id))
                {
                    member.state = MembershipState::Inactive;
                }
            }
            StateChange::MarkRoomRead {
                chat_room_id,
                user_id,
                at,
            } => {
                self.mark_all_read_in_room(user_id, chat_room_id, at);
            }
            StateChange::CreateInvitation(invitation) => {
                self.invitations.insert(invitation.id, invitation);
            }
            StateChange::CloseInvitation { id, state, at } => match self.invitations.get_mut(&id) {
                Some(invitation) if invitation.state == InvitationState::Pending => {
                    invitation.state = state;
                    invitation.closed_at = Some(at);
                }
                _ => return Err(StaleState::InvitationClosed(id).into()),
            },
            StateChange::SetStatus {
                user_id,
                status,
                at,
            } => {
                let profile = self
                    .profiles
                    .entry(user_id)
                    .or_insert_with(|| ChatUserProfile::default_for(user_id, at));
                profile.status = status;
                profile.updated_at = at;
            }
        }
        Ok(())
    }

    fn insert_read_states(&mut self, message: &ChatMessage) -> Vec<ReadState> {
        let recipients: Vec<UserId> = self
            .members
            .iter()
            .filter(|m| m.chat_room_id == message.chat_room_id && m.is_active())
            .map(|m| m.user_id)
            .collect();

        let mut created = Vec::new();
        for user_id in recipients {
            let key = (message.id, user_id);
            if self.read_states.contains_key(&key) {
                continue;
            }
            let state = ReadState {
                user_id,
                chat_message_id: message.id,
                read_at: (user_id == message.user_id).then_some(message.created_at),
            };
            self.read_states.insert(key, state.clone());
            created.push(state);
        }
        created
    }
}

/// `ChatStore` over a mutex-guarded snapshot. `commit` applies the change set
/// to a copy and swaps it in only when every step succeeded.
#[derive(Default)]
pub struct MemoryChatStore {
    state: Mutex<MemoryState>,
    fail_point: Mutex<Option<FailPoint>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next commit fails at `point` and persists nothing.
    pub fn fail_next_commit(&self, point: FailPoint) {
        *self.fail_point.lock().unwrap() = Some(point);
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn read_states(&self) -> Vec<ReadState> {
        self.state
            .lock()
            .unwrap()
            .read_states
            .values()
            .cloned()
            .collect()
    }

    pub fn invitations(&self) -> Vec<ChatRoomInvitation> {
        self.state
            .lock()
            .unwrap()
            .invitations
            .values()
            .cloned()
            .collect()
    }

    fn check(point: Option<FailPoint>, at: FailPoint) -> Result<()> {
        if point == Some(at) {
            bail!("injected commit failure at {:?}", at);
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryChatStore {
    async fn find_event(&self, id: ChatEventId) -> Result<Option<ChatEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state.events.iter().find(|e| e.id == id).cloned())
    }
}

#[async_trait]
impl MessageStore for MemoryChatStore {
    async fn find_message(&self, id: ChatMessageId) -> Result<Option<ChatMessage>> {
        let state = self.state.lock().unwrap();
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn page_messages(&self, room_id: ChatRoomId, query: PageQuery) -> Result<MessagePage> {
        let state = self.state.lock().unwrap();
        let mut in_room: Vec<&ChatMessage> = state
            .messages
            .iter()
            .filter(|m| m.chat_room_id == room_id)
            .collect();
        in_room.sort_by_key(|m| m.id);

        let limit = query.per_page.max(0) as usize;
        let mut messages: Vec<ChatMessage> = match query.direction {
            PageDirection::Next => in_room
                .iter()
                .filter(|m| query.anchor.map_or(true, |a| m.id > a))
                .take(limit)
                .map(|m| (*m).clone())
                .collect(),
            PageDirection::Prev => in_room
                .iter()
                .rev()
                .filter(|m| query.anchor.map_or(true, |a| m.id < a))
                .take(limit)
                .map(|m| (*m).clone())
                .collect(),
        };
        messages.sort_by_key(|m| m.id);

        let remaining = match query.direction {
            PageDirection::Next => messages
                .last()
                .map(|b| in_room.iter().filter(|m| m.id > b.id).count()),
            PageDirection::Prev => messages
                .first()
                .map(|b| in_room.iter().filter(|m| m.id < b.id).count()),
        }
        .unwrap_or(0);

        Ok(MessagePage {
            count: messages.len() as i64,
            remaining: remaining as i64,
            messages,
        })
    }

    async fn latest_message(&self, room_id: ChatRoomId) -> Result<Option<ChatMessage>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                m.chat_room_id == room_id && m.message_type == ChatMessageType::NewMessage
            })
            .max_by_key(|m| m.id)
            .cloned())
    }

    async fn read_states_for_message(&self, message_id: ChatMessageId) -> Result<Vec<ReadState>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<ReadState> = state
            .read_states
            .values()
            .filter(|s| s.chat_message_id == message_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.user_id);
        Ok(rows)
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        message_ids: &[ChatMessageId],
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let known: BTreeSet<ChatMessageId> = state.messages.iter().map(|m| m.id).collect();

        let mut affected = 0;
        for id in message_ids.iter().filter(|id| known.contains(id)) {
            let row = state
                .read_states
                .entry((*id, user_id))
                .or_insert_with(|| ReadState {
                    user_id,
                    chat_message_id: *id,
                    read_at: None,
                });
            row.read_at = row.read_at.or(Some(at));
            affected += 1;
        }
        Ok(affected)
    }

    async fn mark_all_read_in_room(
        &self,
        user_id: UserId,
        room_id: ChatRoomId,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .mark_all_read_in_room(user_id, room_id, at))
    }

    async fn unread_count(&self, user_id: UserId, scope: UnreadScope) -> Result<i64> {
        let state = self.state.lock().unwrap();
        let count = state
            .messages
            .iter()
            .filter(|m| state.is_unread(m, user_id))
            .filter(|m| match scope {
                UnreadScope::Global => state.is_active_member(m.chat_room_id, user_id),
                UnreadScope::Partner(partner_id) => {
                    state.is_active_member(m.chat_room_id, user_id)
                        && state
                            .rooms
                            .get(&m.chat_room_id)
                            .is_some_and(|r| r.partner_id == partner_id)
                }
                UnreadScope::Room(room_id) => m.chat_room_id == room_id,
            })
            .count();
        Ok(count as i64)
    }

    async fn unread_counts(&self, user_id: UserId) -> Result<UnreadCounts> {
        let state = self.state.lock().unwrap();
        let mut counts = UnreadCounts::default();
        for message in state
            .messages
            .iter()
            .filter(|m| state.is_unread(m, user_id))
            .filter(|m| state.is_active_member(m.chat_room_id, user_id))
        {
            let Some(room) = state.rooms.get(&message.chat_room_id) else {
                continue;
            };
            counts.total += 1;
            *counts.partners.entry(room.partner_id).or_default() += 1;
            *counts.rooms.entry(room.id).or_default() += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl RoomDirectory for MemoryChatStore {
    async fn find_room(&self, id: ChatRoomId) -> Result<Option<ChatRoom>> {
        Ok(self.state.lock().unwrap().rooms.get(&id).cloned())
    }

    async fn rooms_for_user(
        &self,
        user_id: UserId,
        partner_id: Option<PartnerId>,
    ) -> Result<Vec<ChatRoom>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .values()
            .filter(|r| partner_id.map_or(true, |p| r.partner_id == p))
            .filter(|r| state.is_active_member(r.id, user_id))
            .cloned()
            .collect())
    }

    async fn rooms_with_membership(
        &self,
        user_id: UserId,
        partner_id: PartnerId,
    ) -> Result<Vec<ChatRoom>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .values()
            .filter(|r| r.partner_id == partner_id)
            .filter(|r| {
                state
                    .members
                    .iter()
                    .any(|m| m.chat_room_id == r.id && m.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn members(&self, room_id: ChatRoomId) -> Result<Vec<RoomMember>> {
        let state = self.state.lock().unwrap();
        let mut members: Vec<RoomMember> = state
            .members
            .iter()
            .filter(|m| m.chat_room_id == room_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| (m.created_at, m.user_id));
        Ok(members)
    }

    async fn membership(&self, room_id: ChatRoomId, user_id: UserId) -> Result<Option<RoomMember>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .find(|m| m.chat_room_id == room_id && m.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl InvitationStore for MemoryChatStore {
    async fn find_invitation(
        &self,
        id: ChatRoomInvitationId,
    ) -> Result<Option<ChatRoomInvitation>> {
        Ok(self.state.lock().unwrap().invitations.get(&id).cloned())
    }

    async fn pending_invitations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ChatRoomInvitation>> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<ChatRoomInvitation> = state
            .invitations
            .values()
            .filter(|i| i.user_id == user_id && i.state == InvitationState::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(pending)
    }
}

#[async_trait]
impl UserProfileStore for MemoryChatStore {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<ChatUserProfile>> {
        Ok(self.state.lock().unwrap().profiles.get(&user_id).cloned())
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<ReadState>> {
        let fail_point = self.fail_point.lock().unwrap().take();
        let mut state = self.state.lock().unwrap();
        let mut next = state.clone();

        for change in changes.state {
            next.apply(change)?;
        }
        Self::check(fail_point, FailPoint::BeforeEvent)?;

        if let Some(event) = changes.event {
            next.events.push(event);
        }
        Self::check(fail_point, FailPoint::BeforeMessages)?;

        let mut read_states = Vec::new();
        for message in changes.messages {
            next.messages.push(message.clone());
            Self::check(fail_point, FailPoint::BeforeReadStates)?;
            read_states.extend(next.insert_read_states(&message));
        }
        Self::check(fail_point, FailPoint::BeforeSecondaryEvents)?;

        next.events.extend(changes.message_events);

        *state = next;
        Ok(read_states)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Mock Directory (users, partners and the ties between them)
// =============================================================================

#[derive(Default)]
struct DirectoryState {
    users: BTreeMap<UserId, DirectoryUser>,
    partners: BTreeMap<PartnerId, DirectoryPartner>,
    /// partner -> tied users, in insertion order
    ties: BTreeMap<PartnerId, Vec<UserId>>,
    tokens: BTreeMap<UserId, Vec<String>>,
}

/// Implements both directory traits over one shared table of ties.
#[derive(Default)]
pub struct MockDirectory {
    state: Mutex<DirectoryState>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, first_name: &str, last_name: &str) -> UserId {
        let id = UserId::new();
        self.state.lock().unwrap().users.insert(
            id,
            DirectoryUser {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            },
        );
        id
    }

    /// Active, chat-enabled partner.
    pub fn add_partner(&self, name: &str) -> PartnerId {
        self.add_partner_with(name, true, true)
    }

    pub fn add_partner_with(&self, name: &str, active: bool, chat_enabled: bool) -> PartnerId {
        let id = PartnerId::new();
        self.state.lock().unwrap().partners.insert(
            id,
            DirectoryPartner {
                id,
                name: name.to_string(),
                active,
                chat_enabled,
            },
        );
        id
    }

    pub fn set_partner_flags(&self, partner_id: PartnerId, active: bool, chat_enabled: bool) {
        if let Some(partner) = self.state.lock().unwrap().partners.get_mut(&partner_id) {
            partner.active = active;
            partner.chat_enabled = chat_enabled;
        }
    }

    pub fn tie(&self, user_id: UserId, partner_id: PartnerId) {
        let mut state = self.state.lock().unwrap();
        let users = state.ties.entry(partner_id).or_default();
        if !users.contains(&user_id) {
            users.push(user_id);
        }
    }

    pub fn untie(&self, user_id: UserId, partner_id: PartnerId) {
        let mut state = self.state.lock().unwrap();
        if let Some(users) = state.ties.get_mut(&partner_id) {
            users.retain(|u| *u != user_id);
        }
    }

    pub fn add_token(&self, user_id: UserId, token: &str) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .entry(user_id)
            .or_default()
            .push(token.to_string());
    }
}

#[async_trait]
impl BaseUserDirectory for MockDirectory {
    async fn find_user(&self, user_id: UserId) -> Result<Option<DirectoryUser>> {
        Ok(self.state.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn find_users(&self, user_ids: &[UserId]) -> Result<Vec<DirectoryUser>> {
        let state = self.state.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn partner_ids_for_user(&self, user_id: UserId) -> Result<Vec<PartnerId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ties
            .iter()
            .filter(|(_, users)| users.contains(&user_id))
            .filter(|(id, _)| {
                state
                    .partners
                    .get(id)
                    .is_some_and(|p| p.active && p.chat_enabled)
            })
            .map(|(id, _)| *id)
            .collect())
    }

    async fn tied_partner_ids(&self, user_id: UserId) -> Result<Vec<PartnerId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ties
            .iter()
            .filter(|(_, users)| users.contains(&user_id))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn device_tokens(&self, user_id: UserId) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tokens
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BasePartnerDirectory for MockDirectory {
    async fn find_partner(&self, partner_id: PartnerId) -> Result<Option<DirectoryPartner>> {
        Ok(self.state.lock().unwrap().partners.get(&partner_id).cloned())
    }

    async fn find_partners(&self, partner_ids: &[PartnerId]) -> Result<Vec<DirectoryPartner>> {
        let state = self.state.lock().unwrap();
        Ok(partner_ids
            .iter()
            .filter_map(|id| state.partners.get(id).cloned())
            .collect())
    }

    async fn flat_user_list(&self, partner_id: PartnerId) -> Result<Vec<UserId>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .ties
            .get(&partner_id)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// Test Transport
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Records publishes. Channels registered with `fail_channel` error instead.
#[derive(Default)]
pub struct TestTransport {
    published: Mutex<Vec<Publication>>,
    failing: Mutex<BTreeSet<String>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_channel(&self, channel: &str) {
        self.failing.lock().unwrap().insert(channel.to_string());
    }

    pub fn published(&self) -> Vec<Publication> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, channel: &str) -> Vec<Publication> {
        self.published()
            .into_iter()
            .filter(|p| p.channel == channel)
            .collect()
    }

    /// Distinct channels in first-publish order.
    pub fn channels(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for p in self.published() {
            if !seen.contains(&p.channel) {
                seen.push(p.channel);
            }
        }
        seen
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl BaseRealtimeTransport for TestTransport {
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        if self.failing.lock().unwrap().contains(channel) {
            bail!("transport refused channel {}", channel);
        }
        self.published.lock().unwrap().push(Publication {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

// =============================================================================
// Mock Push Notification Service
// =============================================================================

pub struct MockPushNotificationService {
    sent_notifications: Arc<Mutex<Vec<(String, String, String, serde_json::Value)>>>,
    fail: bool,
}

impl MockPushNotificationService {
    pub fn new() -> Self {
        Self {
            sent_notifications: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Every send errors without recording anything.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// (token, title, body, data) per delivered notification
    pub fn sent_notifications(&self) -> Vec<(String, String, String, serde_json::Value)> {
        self.sent_notifications.lock().unwrap().clone()
    }

    pub fn sent_to(&self, token: &str) -> usize {
        self.sent_notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, ..)| t == token)
            .count()
    }
}

impl Default for MockPushNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePushNotificationService for MockPushNotificationService {
    async fn send_notification(
        &self,
        push_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        if self.fail {
            bail!("push gateway unavailable");
        }
        self.sent_notifications.lock().unwrap().push((
            push_token.to_string(),
            title.to_string(),
            body.to_string(),
            data,
        ));
        Ok(())
    }

    async fn send_batch(
        &self,
        notifications: Vec<(&str, &str, &str, serde_json::Value)>,
    ) -> Result<()> {
        for (token, title, body, data) in notifications {
            self.send_notification(token, title, body, data).await?;
        }
        Ok(())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<MemoryChatStore>,
    pub directory: Arc<MockDirectory>,
    pub transport: Arc<TestTransport>,
    pub push_service: Arc<MockPushNotificationService>,
    pub settings: ChatSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryChatStore::new()),
            directory: Arc::new(MockDirectory::new()),
            transport: Arc::new(TestTransport::new()),
            push_service: Arc::new(MockPushNotificationService::new()),
            settings: ChatSettings::default(),
        }
    }

    pub fn settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set a mock push notification service
    pub fn mock_push(mut self, service: MockPushNotificationService) -> Self {
        self.push_service = Arc::new(service);
        self
    }

    /// Convert into ServerDeps. Push jobs are not run by a worker; they land
    /// on the returned receiver so tests can drive them explicitly.
    pub fn into_deps(self) -> (ServerDeps, mpsc::UnboundedReceiver<PushJob>) {
        let (push_jobs, push_rx) = JobQueue::channel("push");
        let deps = ServerDeps::new(
            self.store,
            self.directory.clone(),
            self.directory,
            self.transport,
            self.push_service,
            push_jobs,
            Arc::new(SocketSigner::new(TEST_SOCKET_KEY, TEST_SOCKET_SECRET)),
            Arc::new(JwtService::new(TEST_JWT_SECRET, TEST_JWT_ISSUER.to_string())),
            StreamHub::new(),
            self.settings,
        );
        (deps, push_rx)
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::chat::models::ChatStatus;

    async fn room_with_members(store: &MemoryChatStore, members: &[UserId]) -> ChatRoom {
        let room = ChatRoom::new(
            "General".to_string(),
            members[0],
            PartnerId::new(),
            false,
            Utc::now(),
        );
        let mut state = vec![StateChange::CreateRoom(room.clone())];
        state.extend(members.iter().map(|user| StateChange::AddMember {
            chat_room_id: room.id,
            user_id: *user,
            at: Utc::now(),
        }));
        store
            .commit(ChangeSet {
                state,
                ..Default::default()
            })
            .await
            .unwrap();
        room
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_no_rows() {
        let store = MemoryChatStore::new();
        let author = UserId::new();
        let room = room_with_members(&store, &[author, UserId::new()]).await;

        let message = ChatMessage::new(
            author,
            room.id,
            ChatMessageType::NewMessage,
            "hi".to_string(),
            Utc::now(),
        );
        store.fail_next_commit(FailPoint::BeforeSecondaryEvents);
        let result = store
            .commit(ChangeSet {
                state: vec![StateChange::RenameRoom {
                    chat_room_id: room.id,
                    name: "Renamed".to_string(),
                    at: Utc::now(),
                }],
                event: None,
                messages: vec![message],
                message_events: Vec::new(),
            })
            .await;

        assert!(result.is_err());
        assert!(store.messages().is_empty());
        assert!(store.read_states().is_empty());
        assert_eq!(store.find_room(room.id).await.unwrap().unwrap().name, "General");
    }

    #[tokio::test]
    async fn test_author_read_state_is_pre_marked() {
        let store = MemoryChatStore::new();
        let author = UserId::new();
        let other = UserId::new();
        let room = room_with_members(&store, &[author, other]).await;

        let message = ChatMessage::new(
            author,
            room.id,
            ChatMessageType::NewMessage,
            "hi".to_string(),
            Utc::now(),
        );
        let states = store
            .commit(ChangeSet {
                messages: vec![message.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(states.len(), 2);
        let author_state = states.iter().find(|s| s.user_id == author).unwrap();
        assert_eq!(author_state.read_at, Some(message.created_at));
        let other_state = states.iter().find(|s| s.user_id == other).unwrap();
        assert!(other_state.read_at.is_none());
    }

    #[tokio::test]
    async fn test_add_member_reactivates() {
        let store = MemoryChatStore::new();
        let user = UserId::new();
        let room = room_with_members(&store, &[user]).await;

        store
            .commit(ChangeSet {
                state: vec![StateChange::DeactivateForPartner {
                    user_id: user,
                    partner_id: room.partner_id,
                    at: Utc::now(),
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!store.membership(room.id, user).await.unwrap().unwrap().is_active());

        let add = StateChange::AddMember {
            chat_room_id: room.id,
            user_id: user,
            at: Utc::now(),
        };
        for _ in 0..2 {
            store
                .commit(ChangeSet {
                    state: vec![add.clone()],
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        assert!(store.membership(room.id, user).await.unwrap().unwrap().is_active());
        assert_eq!(store.members(room.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guarded_changes_report_stale_state() {
        let store = MemoryChatStore::new();
        let owner = UserId::new();
        let stranger = UserId::new();
        let room = room_with_members(&store, &[owner]).await;

        let err = store
            .commit(ChangeSet {
                state: vec![
                    StateChange::SetStatus {
                        user_id: stranger,
                        status: ChatStatus::Away,
                        at: Utc::now(),
                    },
                    StateChange::RemoveMember {
                        chat_room_id: room.id,
                        user_id: stranger,
                    },
                ],
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<StaleState>(),
            Some(&StaleState::NotAMember(room.id, stranger))
        );
        assert!(store.find_profile(stranger).await.unwrap().is_none());

        let invitation = ChatRoomInvitation::new(stranger, room.id, owner, Utc::now());
        let close = StateChange::CloseInvitation {
            id: invitation.id,
            state: InvitationState::Declined,
            at: Utc::now(),
        };
        store
            .commit(ChangeSet {
                state: vec![StateChange::CreateInvitation(invitation.clone()), close.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        let err = store
            .commit(ChangeSet {
                state: vec![close],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<StaleState>(),
            Some(&StaleState::InvitationClosed(invitation.id))
        );
    }

    #[tokio::test]
    async fn test_directory_hides_disabled_partners() {
        let directory = MockDirectory::new();
        let user = directory.add_user("Ada", "Lovelace");
        let enabled = directory.add_partner("Enabled");
        let disabled = directory.add_partner_with("Disabled", true, false);
        directory.tie(user, enabled);
        directory.tie(user, disabled);

        assert_eq!(
            directory.partner_ids_for_user(user).await.unwrap(),
            vec![enabled]
        );
        assert_eq!(directory.flat_user_list(disabled).await.unwrap(), vec![user]);

        let mut tied = directory.tied_partner_ids(user).await.unwrap();
        tied.sort();
        let mut expected = vec![enabled, disabled];
        expected.sort();
        assert_eq!(tied, expected);
    }
}
