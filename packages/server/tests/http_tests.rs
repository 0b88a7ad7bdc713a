//! HTTP surface tests: the router driven through `tower::ServiceExt::oneshot`
//! over the in-memory dependencies.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use securechat_core::common::UserId;
use securechat_core::domains::auth::{presence_partner_channel, private_user_channel};
use securechat_core::domains::chat::actions::{self, UpdateStatus};
use securechat_core::kernel::test_dependencies::TEST_SOCKET_KEY;
use securechat_core::server::build_app;
use serde_json::{json, Value};
use test_context::test_context;
use tower::ServiceExt;

use crate::common::{trio, TestHarness};

fn app(ctx: &TestHarness) -> Router {
    build_app(ctx.deps.clone())
}

fn token(ctx: &TestHarness, user: UserId) -> String {
    ctx.deps.jwt_service.create_token(user).unwrap()
}

async fn call(
    router: Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[test_context(TestHarness)]
#[tokio::test]
async fn routes_require_a_bearer_token(ctx: &TestHarness) {
    let (status, body) = call(app(ctx), Method::GET, "/chat-rooms", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = call(
        app(ctx),
        Method::GET,
        "/chat-rooms",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn responses_carry_unread_counts(ctx: &TestHarness) {
    let t = trio(ctx).await;
    let bob = token(ctx, t.bob);

    let (status, _) = call(
        app(ctx),
        Method::POST,
        &format!("/chat-rooms/{}/messages", t.room.id),
        Some(&token(ctx, t.alice)),
        Some(json!({ "content": "over http" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(app(ctx), Method::GET, "/chat-rooms", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let rooms = body["data"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], t.room.id.to_string());
    assert_eq!(rooms[0]["unread_count"], 1);
    assert_eq!(rooms[0]["latest_message"]["content"], "over http");
    assert_eq!(body["unread_counts"]["total"], 1);
    assert_eq!(
        body["unread_counts"]["rooms"][t.room.id.to_string()],
        1
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn validation_errors_are_422_with_field_messages(ctx: &TestHarness) {
    let t = trio(ctx).await;

    let (status, body) = call(
        app(ctx),
        Method::PUT,
        &format!("/chat-rooms/{}", t.room.id),
        Some(&token(ctx, t.alice)),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "failed_validation");
    assert_eq!(body["name"][0], "The name field is required.");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn non_members_get_403(ctx: &TestHarness) {
    let t = trio(ctx).await;
    let outsider = ctx.directory.add_user("Oscar", "Owens");

    let (status, body) = call(
        app(ctx),
        Method::GET,
        &format!("/chat-rooms/{}/messages", t.room.id),
        Some(&token(ctx, outsider)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn private_channel_grants_are_owner_only(ctx: &TestHarness) {
    let t = trio(ctx).await;
    let alice = token(ctx, t.alice);

    let (status, body) = call(
        app(ctx),
        Method::POST,
        "/authenticate",
        Some(&alice),
        Some(json!({
            "channel_name": private_user_channel(t.alice),
            "socket_id": "1234.5678",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let auth = body["auth"].as_str().unwrap();
    assert!(auth.starts_with(&format!("{}:", TEST_SOCKET_KEY)));
    assert!(body.get("data").is_none());
    assert!(ctx.deps.socket_signer.verify(
        "1234.5678",
        &private_user_channel(t.alice),
        None,
        auth
    ));

    let (status, _) = call(
        app(ctx),
        Method::POST,
        "/authenticate",
        Some(&alice),
        Some(json!({
            "channel_name": private_user_channel(t.bob),
            "socket_id": "1234.5678",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn presence_grants_require_a_partner_tie(ctx: &TestHarness) {
    let t = trio(ctx).await;
    let bob = token(ctx, t.bob);
    actions::update_status(
        t.bob,
        UpdateStatus {
            status: Some("away".to_string()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let channel = presence_partner_channel(t.partner);
    let (status, body) = call(
        app(ctx),
        Method::POST,
        "/authenticate",
        Some(&bob),
        Some(json!({ "channel_name": channel, "socket_id": "1234.5678" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let channel_data: Value =
        serde_json::from_str(body["channel_data"].as_str().unwrap()).unwrap();
    assert_eq!(channel_data["user_id"], t.bob.to_string());
    assert_eq!(channel_data["user_info"]["id"], t.bob.to_string());
    assert_eq!(channel_data["user_info"]["status"], "away");
    assert!(ctx.deps.socket_signer.verify(
        "1234.5678",
        &channel,
        body["channel_data"].as_str(),
        body["auth"].as_str().unwrap()
    ));

    let elsewhere = ctx.directory.add_partner("South Clinic");
    let (status, body) = call(
        app(ctx),
        Method::POST,
        "/authenticate",
        Some(&bob),
        Some(json!({
            "channel_name": presence_partner_channel(elsewhere),
            "socket_id": "1234.5678",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stream_rejects_a_forged_grant(ctx: &TestHarness) {
    let t = trio(ctx).await;

    let uri = format!(
        "/streams/{}?socket_id=1234.5678&auth={}:deadbeef",
        private_user_channel(t.alice),
        TEST_SOCKET_KEY
    );
    let response = app(ctx)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn health_reports_the_store(ctx: &TestHarness) {
    let (status, body) = call(app(ctx), Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
