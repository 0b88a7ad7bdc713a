//! Integration tests for audience resolution and post-commit publishing.

mod common;

use crate::common::{create_room, staff, trio, LogCapture, TestHarness};
use securechat_core::config::ChatSettings;
use securechat_core::domains::auth::{private_user_channel, OVERFLOW_CHANNEL};
use securechat_core::domains::chat::actions::{self, PostMessage, UpdateStatus};
use securechat_core::domains::chat::effects::{resolve_channels, CHAT_EVENT, CHAT_MESSAGE};
use securechat_core::kernel::test_dependencies::Publication;
use test_context::test_context;
use tracing::Level;

fn of_type<'a>(publications: &'a [Publication], event_type: &str) -> Vec<&'a Publication> {
    publications
        .iter()
        .filter(|p| p.event == CHAT_EVENT && p.payload["type"] == event_type)
        .collect()
}

fn channels(publications: &[&Publication]) -> Vec<String> {
    publications.iter().map(|p| p.channel.clone()).collect()
}

// =============================================================================
// Room scope
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn message_event_reaches_every_active_member(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.transport.clear();

    let message = actions::post_message(
        t.alice,
        t.room.id,
        PostMessage {
            content: Some("hello".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let published = ctx.transport.published();
    let frames = of_type(&published, "message");
    assert_eq!(
        channels(&frames),
        vec![
            private_user_channel(t.alice),
            private_user_channel(t.bob),
            private_user_channel(t.carol),
        ]
    );

    let frame = &frames[0].payload;
    assert_eq!(frame["user_id"], t.alice.to_string());
    assert_eq!(frame["data"]["chat_message_id"], message.id.to_string());
    assert_eq!(frame["data"]["chat_room_id"], t.room.id.to_string());
    assert!(frame["data"].get("content").is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn room_left_also_reaches_the_leaver(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.transport.clear();

    actions::leave_room(t.carol, t.room.id, t.carol, &ctx.deps)
        .await
        .unwrap();

    let published = ctx.transport.published();
    let frames = of_type(&published, "room_left");
    assert_eq!(
        channels(&frames),
        vec![
            private_user_channel(t.alice),
            private_user_channel(t.bob),
            private_user_channel(t.carol),
        ]
    );
}

// =============================================================================
// User scope
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn invitation_sent_reaches_only_the_invited_user(ctx: &TestHarness) {
    let t = trio(ctx).await;
    let dave = staff(ctx, "Dave", "Diaz", t.partner);
    ctx.transport.clear();

    actions::create_invitation(t.alice, t.room.id, Some(dave), &ctx.deps)
        .await
        .unwrap();

    let published = ctx.transport.published();
    let frames = of_type(&published, "invitation_sent");
    assert_eq!(channels(&frames), vec![private_user_channel(dave)]);
    assert_eq!(frames[0].payload["user_id"], t.alice.to_string());
    assert_eq!(frames[0].payload["data"]["invited_user"], "Dave Diaz");
}

// =============================================================================
// Partner scope and the channel cap
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn partner_audience_is_capped_at_the_channel_limit(ctx: &TestHarness) {
    let partner = ctx.directory.add_partner("Big Hospital");
    let users: Vec<_> = (0..150)
        .map(|i| staff(ctx, "Staff", &format!("{i:03}"), partner))
        .collect();
    ctx.transport.clear();

    let recorded_before = ctx.store.events().len();
    let (logs, guard) = LogCapture::start();
    actions::user_added_to_partner(users[0], &[partner], &ctx.deps)
        .await
        .unwrap();
    drop(guard);
    assert_eq!(logs.count(Level::WARN, "over channel limit"), 1);

    let event = ctx.store.events()[recorded_before].clone();
    let resolved = resolve_channels(&event, &ctx.deps).await.unwrap();
    assert_eq!(resolved.len(), 100);
    assert_eq!(resolved[0], private_user_channel(users[0]));

    let published = ctx.transport.published();
    let frames = of_type(&published, "user_added_to_partner");
    assert_eq!(frames.len(), 100);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn removed_user_still_hears_about_the_removal(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.directory.untie(t.carol, t.partner);
    ctx.transport.clear();

    actions::user_removed_from_partner(t.carol, &[t.partner], &ctx.deps)
        .await
        .unwrap();

    let published = ctx.transport.published();
    let frames = of_type(&published, "user_removed_from_partner");
    let reached = channels(&frames);
    assert!(reached.contains(&private_user_channel(t.carol)));
    assert!(reached.contains(&private_user_channel(t.alice)));
    assert!(reached.contains(&private_user_channel(t.bob)));
}

// =============================================================================
// User-partners scope and the overflow channel
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn status_goes_to_overflow_when_user_partners_is_off(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.transport.clear();

    actions::update_status(
        t.bob,
        UpdateStatus {
            status: Some("away".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let published = ctx.transport.published();
    let frames = of_type(&published, "user_status");
    assert_eq!(channels(&frames), vec![OVERFLOW_CHANNEL.to_string()]);

    // The derived room message is still announced to the room.
    assert_eq!(of_type(&published, "message").len(), 3);
}

#[tokio::test]
async fn status_reaches_partner_users_when_enabled() {
    let ctx = TestHarness::with_settings(ChatSettings {
        broadcast_user_partners: true,
        ..ChatSettings::default()
    });
    let t = trio(&ctx).await;
    let other_partner = ctx.directory.add_partner("South Clinic");
    ctx.directory.tie(t.bob, other_partner);
    let erin = staff(&ctx, "Erin", "Evans", other_partner);
    ctx.transport.clear();

    actions::update_status(
        t.bob,
        UpdateStatus {
            status: Some("away".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let published = ctx.transport.published();
    let reached = channels(&of_type(&published, "user_status"));
    assert_eq!(reached.len(), 4);
    for user in [t.alice, t.bob, t.carol, erin] {
        assert!(reached.contains(&private_user_channel(user)));
    }
}

// =============================================================================
// Delivery failures and message frames
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn publish_failure_does_not_fail_the_write(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.transport.fail_channel(&private_user_channel(t.bob));
    ctx.transport.clear();

    let message = actions::post_message(
        t.alice,
        t.room.id,
        PostMessage {
            content: Some("still here".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    assert!(ctx.store.messages().iter().any(|m| m.id == message.id));
    let published = ctx.transport.published();
    let reached = channels(&of_type(&published, "message"));
    assert_eq!(
        reached,
        vec![private_user_channel(t.alice), private_user_channel(t.carol)]
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn message_frames_are_off_by_default(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.transport.clear();

    actions::post_message(
        t.alice,
        t.room.id,
        PostMessage {
            content: Some("hello".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    assert!(ctx
        .transport
        .published()
        .iter()
        .all(|p| p.event == CHAT_EVENT));
}

#[tokio::test]
async fn message_frames_carry_ids_but_no_content() {
    let ctx = TestHarness::with_settings(ChatSettings {
        broadcast_messages: true,
        ..ChatSettings::default()
    });
    let partner = ctx.directory.add_partner("North Clinic");
    let alice = staff(&ctx, "Alice", "Adams", partner);
    let bob = staff(&ctx, "Bob", "Brown", partner);
    let room = create_room(&ctx, alice, partner, "Pair", &[bob]).await;
    ctx.transport.clear();

    let message = actions::post_message(
        bob,
        room.id,
        PostMessage {
            content: Some("secret".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let frames: Vec<_> = ctx
        .transport
        .published()
        .into_iter()
        .filter(|p| p.event == CHAT_MESSAGE)
        .collect();
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        assert_eq!(frame.payload["chat_room_id"], room.id.to_string());
        assert_eq!(frame.payload["message_id"], message.id.to_string());
        assert_eq!(frame.payload["type"], "new_message");
        assert!(frame.payload.get("content").is_none());
    }
}
