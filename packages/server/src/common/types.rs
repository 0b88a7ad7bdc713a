// Response types shared by every chat endpoint

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity_ids::{ChatRoomId, PartnerId};

/// Unread NEW_MESSAGE counts for one user, attached to every success response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounts {
    pub total: i64,
    pub partners: BTreeMap<PartnerId, i64>,
    pub rooms: BTreeMap<ChatRoomId, i64>,
}

impl UnreadCounts {
    pub fn room(&self, room_id: ChatRoomId) -> i64 {
        self.rooms.get(&room_id).copied().unwrap_or(0)
    }

    pub fn partner(&self, partner_id: PartnerId) -> i64 {
        self.partners.get(&partner_id).copied().unwrap_or(0)
    }
}

/// `{ "data": ..., "unread_counts": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub unread_counts: UnreadCounts,
}

impl<T> Envelope<T> {
    pub fn new(data: T, unread_counts: UnreadCounts) -> Self {
        Self {
            data,
            unread_counts,
        }
    }
}
