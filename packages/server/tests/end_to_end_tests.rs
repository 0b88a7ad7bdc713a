//! A message posted to a three-person room, followed from the write through
//! read states, the broadcast and the push fan-out.

mod common;

use securechat_core::domains::auth::private_user_channel;
use securechat_core::domains::chat::actions::{self, PostMessage, UpdateStatus};
use securechat_core::domains::chat::effects::CHAT_EVENT;
use securechat_core::domains::chat::events::ChatEventType;
use securechat_core::domains::chat::models::ChatMessageType;
use securechat_core::domains::chat::store::MessageStore;
use test_context::test_context;

use crate::common::{trio, TestHarness};

#[test_context(TestHarness)]
#[tokio::test]
async fn posted_message_flows_to_every_surface(ctx: &TestHarness) {
    let t = trio(ctx).await;
    actions::update_status(
        t.carol,
        UpdateStatus {
            status: Some("away".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();
    ctx.directory.add_token(t.bob, "bob-phone");
    ctx.directory.add_token(t.carol, "carol-phone");
    ctx.transport.clear();
    let events_before = ctx.store.events().len();

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

    // The message row.
    assert_eq!(message.message_type, ChatMessageType::NewMessage);
    assert_eq!(message.content, "hello");
    assert_eq!(message.user_id, t.alice);

    // Read states: the author has read it, nobody else has.
    let states = ctx
        .deps
        .store
        .read_states_for_message(message.id)
        .await
        .unwrap();
    assert_eq!(states.len(), 3);
    for state in &states {
        if state.user_id == t.alice {
            assert_eq!(state.read_at, Some(message.created_at));
        } else {
            assert!(state.read_at.is_none());
        }
    }

    // Exactly one MESSAGE event, nothing else.
    let events = ctx.store.events();
    let new_events = &events[events_before..];
    assert_eq!(new_events.len(), 1);
    assert_eq!(new_events[0].event_type, ChatEventType::Message);
    assert_eq!(new_events[0].data["chat_message_id"], message.id.to_string());

    // Broadcast to every member's private channel.
    for user in [t.alice, t.bob, t.carol] {
        let frames = ctx.transport.published_to(&private_user_channel(user));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, CHAT_EVENT);
        assert_eq!(frames[0].payload["type"], "message");
    }

    // Unread counts follow the read states.
    for (user, expected) in [(t.alice, 0), (t.bob, 1), (t.carol, 1)] {
        let counts = actions::unread_counts(user, &ctx.deps).await.unwrap();
        assert_eq!(counts.total, expected);
        assert_eq!(counts.room(t.room.id), expected);
    }

    // One push job; only Bob is Active with a device.
    let jobs = ctx.take_push_jobs();
    assert_eq!(jobs.len(), 1);
    let pushed = ctx.dispatch_push(&jobs[0], message.created_at).await;
    assert_eq!(pushed, 1);
    assert_eq!(ctx.push.sent_to("bob-phone"), 1);
    assert_eq!(ctx.push.sent_to("carol-phone"), 0);
}
