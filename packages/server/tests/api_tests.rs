//! HTTP surface tests, driven through the router with `oneshot`.

mod common;

use crate::common::{moderation_enabled, TestHarness};
use axum::http::{Method, StatusCode};
use forum_core::common::auth::UserRole;
use forum_core::config::ModerationConfig;
use forum_core::kernel::MockAI;
use serde_json::json;

#[tokio::test]
async fn health_reports_ok() {
    let h = TestHarness::manual();
    let (status, body) = h.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn submit_requires_authentication() {
    let h = TestHarness::manual();
    let author = h.user(UserRole::User);
    let topic = h.topic(&author).await;

    let (status, body) = h
        .send(
            Method::POST,
            "/api/posts",
            None,
            Some(json!({ "topic_id": topic.id, "content": "Hello" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn submit_then_moderate_over_http() {
    let h = TestHarness::manual();
    let author = h.user(UserRole::User);
    let moderator = h.user(UserRole::Moderator);
    let author_token = h.token_for(&author);
    let moderator_token = h.token_for(&moderator);
    let topic = h.topic(&author).await;

    let (status, pending) = h
        .send(
            Method::POST,
            "/api/posts",
            Some(&author_token),
            Some(json!({ "topic_id": topic.id, "content": "Free will is a useful fiction" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["status"], "pending");
    let pending_id = pending["id"].as_str().unwrap().to_string();

    // Queue is moderator-only
    let (status, _) = h
        .send(Method::GET, "/api/pending-posts", Some(&author_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, queue) = h
        .send(Method::GET, "/api/pending-posts?limit=10", Some(&moderator_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, body) = h
        .send(
            Method::POST,
            &format!("/api/pending-posts/{}/moderate", pending_id),
            Some(&moderator_token),
            Some(json!({ "action": "publish" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("publish"));

    let (status, published) = h
        .send(
            Method::POST,
            &format!("/api/pending-posts/{}/moderate", pending_id),
            Some(&moderator_token),
            Some(json!({ "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    assert_eq!(published["reply_count"], 0);

    let (status, again) = h
        .send(
            Method::POST,
            &format!("/api/pending-posts/{}/moderate", pending_id),
            Some(&moderator_token),
            Some(json!({ "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(again["error"].is_string());

    let (status, resolution) = h
        .send(
            Method::GET,
            &format!("/api/pending-posts/{}/resolution", pending_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolution["resolution"], "published");
    assert_eq!(resolution["post"]["id"], published["id"]);
}

#[tokio::test]
async fn thread_hides_other_users_pending_posts() {
    let h = TestHarness::manual();
    let alice = h.user(UserRole::User);
    let bob = h.user(UserRole::User);
    let alice_token = h.token_for(&alice);
    let bob_token = h.token_for(&bob);
    let topic = h.topic(&alice).await;

    h.send(
        Method::POST,
        "/api/posts",
        Some(&alice_token),
        Some(json!({ "topic_id": topic.id, "content": "Alice's draft" })),
    )
    .await;

    let uri = format!("/api/topics/{}/thread", topic.id);

    let (_, as_alice) = h.send(Method::GET, &uri, Some(&alice_token), None).await;
    assert_eq!(as_alice["posts"].as_array().unwrap().len(), 1);
    assert_eq!(as_alice["posts"][0]["provenance"], "own_pending");

    let (_, as_bob) = h.send(Method::GET, &uri, Some(&bob_token), None).await;
    assert!(as_bob["posts"].as_array().unwrap().is_empty());

    let (status, anonymous) = h.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anonymous["topic"]["id"], json!(topic.id));
}

#[tokio::test]
async fn delete_post_with_replies_is_bad_request() {
    let h = TestHarness::new(
        moderation_enabled(),
        MockAI::new()
            .with_verdict("APPROVED", 0.9)
            .with_verdict("APPROVED", 0.9),
    );
    let author = h.user(UserRole::User);
    let token = h.token_for(&author);
    let topic = h.topic(&author).await;

    h.send(
        Method::POST,
        "/api/posts",
        Some(&token),
        Some(json!({ "topic_id": topic.id, "content": "Root claim" })),
    )
    .await;
    h.drain_jobs().await;

    let thread_uri = format!("/api/topics/{}/thread", topic.id);
    let (_, thread) = h.send(Method::GET, &thread_uri, None, None).await;
    let root_id = thread["posts"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .send(
            Method::POST,
            "/api/posts",
            Some(&token),
            Some(json!({ "topic_id": topic.id, "parent_post_id": root_id, "content": "Counterpoint" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    h.drain_jobs().await;

    let (status, body) = h
        .send(Method::DELETE, &format!("/api/posts/{}", root_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete post as it has 1 reply");
}

#[tokio::test]
async fn topic_delete_is_admin_only() {
    let h = TestHarness::manual();
    let moderator = h.user(UserRole::Moderator);
    let admin = h.user(UserRole::Admin);
    let topic = h.topic(&moderator).await;
    let uri = format!("/api/topics/{}", topic.id);

    let (status, _) = h
        .send(Method::DELETE, &uri, Some(&h.token_for(&moderator)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .send(Method::DELETE, &uri, Some(&h.token_for(&admin)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = h
        .send(Method::GET, &format!("{}/thread", uri), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_topic_and_profile() {
    let h = TestHarness::manual();
    let author = h.user(UserRole::User);
    let token = h.token_for(&author);

    let (status, topic) = h
        .send(
            Method::POST,
            "/api/topics",
            Some(&token),
            Some(json!({ "title": "Moral realism" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    h.send(
        Method::POST,
        "/api/posts",
        Some(&token),
        Some(json!({ "topic_id": topic["id"], "content": "There are moral facts" })),
    )
    .await;

    let (status, profile) = h.send(Method::GET, "/api/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["user_id"], json!(author.user_id));
    assert_eq!(profile["pending"].as_array().unwrap().len(), 1);
    assert!(profile["published"].as_array().unwrap().is_empty());
    assert!(profile["rejected"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn user_profile_shows_drafts_to_owner_only() {
    let h = TestHarness::manual();
    let author = h.user(UserRole::User);
    let other = h.user(UserRole::User);
    let token = h.token_for(&author);
    let topic = h.topic(&author).await;

    h.send(
        Method::POST,
        "/api/posts",
        Some(&token),
        Some(json!({ "topic_id": topic.id, "content": "Draft" })),
    )
    .await;

    let uri = format!("/api/users/{}/profile", author.user_id);

    let (status, own) = h.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["pending"].as_array().unwrap().len(), 1);
    assert_eq!(own["published_count"], 0);

    let (status, foreign) = h
        .send(Method::GET, &uri, Some(&h.token_for(&other)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(foreign["pending"].as_array().unwrap().is_empty());
    assert!(foreign["rejected"].as_array().unwrap().is_empty());

    let (status, anonymous) = h.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(anonymous["pending"].as_array().unwrap().is_empty());

    let (status, _) = h
        .send(Method::GET, &format!("{}?offset=-1", uri), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn thread_is_paged_by_top_level_posts() {
    let h = TestHarness::new(
        moderation_enabled(),
        MockAI::new()
            .with_verdict("APPROVED", 0.9)
            .with_verdict("APPROVED", 0.9),
    );
    let author = h.user(UserRole::User);
    let token = h.token_for(&author);
    let topic = h.topic(&author).await;

    for content in ["First claim", "Second claim"] {
        h.send(
            Method::POST,
            "/api/posts",
            Some(&token),
            Some(json!({ "topic_id": topic.id, "content": content })),
        )
        .await;
        h.drain_jobs().await;
    }

    let uri = format!("/api/topics/{}/thread?limit=1&offset=1", topic.id);
    let (status, thread) = h.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["count"], 2);
    assert_eq!(thread["limit"], 1);
    assert_eq!(thread["posts"].as_array().unwrap().len(), 1);
    assert_eq!(thread["posts"][0]["content"], "Second claim");
}

#[tokio::test]
async fn analysis_and_jobs_endpoints() {
    let h = TestHarness::new(moderation_enabled(), MockAI::new().with_verdict("REJECTED", 0.3));
    let author = h.user(UserRole::User);
    let moderator = h.user(UserRole::Moderator);
    let author_token = h.token_for(&author);
    let moderator_token = h.token_for(&moderator);
    let topic = h.topic(&author).await;

    let (_, pending) = h
        .send(
            Method::POST,
            "/api/posts",
            Some(&author_token),
            Some(json!({ "topic_id": topic.id, "content": "Borderline" })),
        )
        .await;
    let pending_id = pending["id"].as_str().unwrap().to_string();
    h.drain_jobs().await;

    let (status, analysis) = h
        .send(
            Method::GET,
            &format!("/api/pending-posts/{}/analysis", pending_id),
            Some(&author_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["decision"], "reject");
    assert_eq!(analysis["confidence"], 0.3);

    let (status, jobs) = h
        .send(
            Method::GET,
            &format!("/api/pending-posts/{}/jobs", pending_id),
            Some(&moderator_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs[0]["status"], "succeeded");

    let (status, accepted) = h
        .send(
            Method::POST,
            &format!("/api/pending-posts/{}/analyze", pending_id),
            Some(&moderator_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["created"], true);
}

#[tokio::test]
async fn moderation_webhook_is_key_guarded_and_applies_once() {
    let config = ModerationConfig {
        webhook_key: Some("hook-key".into()),
        ..ModerationConfig::default()
    };
    let h = TestHarness::new(config, MockAI::new());
    let author = h.user(UserRole::User);
    let token = h.token_for(&author);
    let topic = h.topic(&author).await;

    let (_, pending) = h
        .send(
            Method::POST,
            "/api/posts",
            Some(&token),
            Some(json!({ "topic_id": topic.id, "content": "Hook me" })),
        )
        .await;
    let verdict = json!({
        "pending_post_id": pending["id"],
        "status": "approved",
        "confidence": 0.97
    });

    let (status, _) = h
        .send(Method::POST, "/api/moderation-webhook", None, Some(verdict.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = [("x-api-key", "nope".to_string())];
    let (status, _) = h
        .send_with_headers(Method::POST, "/api/moderation-webhook", &wrong, Some(verdict.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let key = [("x-api-key", "hook-key".to_string())];
    let (status, receipt) = h
        .send_with_headers(Method::POST, "/api/moderation-webhook", &key, Some(verdict.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["status"], "success");
    assert_eq!(receipt["post"]["status"], "published");

    let (status, _) = h
        .send_with_headers(Method::POST, "/api/moderation-webhook", &key, Some(verdict))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
