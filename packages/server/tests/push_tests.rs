//! Integration tests for the push fan-out.
//!
//! Jobs are taken off the harness queue and dispatched at a chosen instant so
//! the freshness window can be tested without sleeping.

mod common;

use chrono::Duration;
use securechat_core::domains::chat::actions::{self, PostMessage, UpdateStatus};
use securechat_core::domains::chat::effects::{PushJob, PUSH_BODY};
use securechat_core::kernel::test_dependencies::MockPushNotificationService;
use serde_json::json;
use test_context::test_context;

use crate::common::{trio, TestHarness, Trio};

async fn post_and_take_job(ctx: &TestHarness, t: &Trio) -> PushJob {
    actions::post_message(
        t.alice,
        t.room.id,
        PostMessage {
            content: Some("anyone there?".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let mut jobs = ctx.take_push_jobs();
    assert_eq!(jobs.len(), 1);
    jobs.remove(0)
}

#[test_context(TestHarness)]
#[tokio::test]
async fn posting_enqueues_one_job(ctx: &TestHarness) {
    let t = trio(ctx).await;
    // Room creation queues nothing.
    assert!(ctx.take_push_jobs().is_empty());

    let job = post_and_take_job(ctx, &t).await;
    assert_eq!(job.chat_room_id, t.room.id);
    assert_eq!(job.message.user_id, t.alice);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn fresh_message_pushes_each_reachable_recipient_once(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.directory.add_token(t.bob, "bob-phone");
    ctx.directory.add_token(t.alice, "alice-phone");
    let job = post_and_take_job(ctx, &t).await;

    let pushed = ctx
        .dispatch_push(&job, job.message.created_at + Duration::minutes(1))
        .await;

    // Carol has no token and Alice wrote the message.
    assert_eq!(pushed, 1);
    let sent = ctx.push.sent_notifications();
    assert_eq!(sent.len(), 1);
    let (token, title, body, data) = &sent[0];
    assert_eq!(token, "bob-phone");
    assert_eq!(title, "North Clinic");
    assert_eq!(body, PUSH_BODY);
    assert_eq!(data, &json!({ "chat_room_id": t.room.id }));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn every_token_of_a_recipient_is_sent_in_one_batch(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.directory.add_token(t.bob, "bob-phone");
    ctx.directory.add_token(t.bob, "bob-tablet");
    let job = post_and_take_job(ctx, &t).await;

    let pushed = ctx.dispatch_push(&job, job.message.created_at).await;

    assert_eq!(pushed, 1);
    assert_eq!(ctx.push.sent_to("bob-phone"), 1);
    assert_eq!(ctx.push.sent_to("bob-tablet"), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_message_pushes_nothing(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.directory.add_token(t.bob, "bob-phone");
    let job = post_and_take_job(ctx, &t).await;

    let pushed = ctx
        .dispatch_push(&job, job.message.created_at + Duration::minutes(10))
        .await;

    assert_eq!(pushed, 0);
    assert!(ctx.push.sent_notifications().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn away_recipients_are_skipped(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.directory.add_token(t.bob, "bob-phone");
    ctx.directory.add_token(t.carol, "carol-phone");
    actions::update_status(
        t.carol,
        UpdateStatus {
            status: Some("away".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();
    let job = post_and_take_job(ctx, &t).await;

    let pushed = ctx.dispatch_push(&job, job.message.created_at).await;

    assert_eq!(pushed, 1);
    assert_eq!(ctx.push.sent_to("bob-phone"), 1);
    assert_eq!(ctx.push.sent_to("carol-phone"), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn members_who_left_are_skipped(ctx: &TestHarness) {
    let t = trio(ctx).await;
    ctx.directory.add_token(t.carol, "carol-phone");
    actions::leave_room(t.carol, t.room.id, t.carol, &ctx.deps)
        .await
        .unwrap();
    let job = post_and_take_job(ctx, &t).await;

    let pushed = ctx.dispatch_push(&job, job.message.created_at).await;

    assert_eq!(pushed, 0);
}

#[tokio::test]
async fn gateway_failures_are_swallowed() {
    let ctx = TestHarness::with_push(MockPushNotificationService::failing());
    let t = trio(&ctx).await;
    ctx.directory.add_token(t.bob, "bob-phone");
    ctx.directory.add_token(t.carol, "carol-phone");
    let job = post_and_take_job(&ctx, &t).await;

    let pushed = ctx.dispatch_push(&job, job.message.created_at).await;

    assert_eq!(pushed, 0);
}
