//! Test fixtures for creating chat data.
//!
//! Rooms are created through the chat actions so memberships, join events
//! and read states look exactly like production data.

use securechat_core::common::{PartnerId, UserId};
use securechat_core::domains::chat::actions::{self, CreateRoom};
use securechat_core::domains::chat::models::ChatRoom;

use super::TestHarness;

/// A user tied to `partner`.
pub fn staff(ctx: &TestHarness, first_name: &str, last_name: &str, partner: PartnerId) -> UserId {
    let user_id = ctx.directory.add_user(first_name, last_name);
    ctx.directory.tie(user_id, partner);
    user_id
}

/// Room owned by `owner` with `members` joined directly.
pub async fn create_room(
    ctx: &TestHarness,
    owner: UserId,
    partner: PartnerId,
    name: &str,
    members: &[UserId],
) -> ChatRoom {
    actions::create_room(
        owner,
        CreateRoom {
            name: Some(name.to_string()),
            partner_id: Some(partner),
            private: false,
            invited_user_ids: members.to_vec(),
        },
        &ctx.deps,
    )
    .await
    .expect("Failed to create room")
}

/// The usual three-person setup: Alice owns a room with Bob and Carol.
pub struct Trio {
    pub partner: PartnerId,
    pub alice: UserId,
    pub bob: UserId,
    pub carol: UserId,
    pub room: ChatRoom,
}

pub async fn trio(ctx: &TestHarness) -> Trio {
    let partner = ctx.directory.add_partner("North Clinic");
    let alice = staff(ctx, "Alice", "Adams", partner);
    let bob = staff(ctx, "Bob", "Brown", partner);
    let carol = staff(ctx, "Carol", "Clark", partner);
    let room = create_room(ctx, alice, partner, "Night shift", &[bob, carol]).await;

    Trio {
        partner,
        alice,
        bob,
        carol,
        room,
    }
}
