use crate::e2e::helpers;

use chrono::Duration;
use helpers::{fakes::HangingStore, spawn_with_store, TestContext, STORE_TIMEOUT};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use test_context::test_context;
use timber_auth::domain::auth::{TokenId, TokenResponse};
use timber_auth::infrastructure::session::BoundedSessionStore;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_rotate_refresh_token(ctx: &TestContext) {
    let pair = ctx.sign_in(7).await;

    let response = ctx
        .client
        .post("/auth/tokens", &json!({ "refresh_token": pair.refresh_token.as_str() }))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let tokens: TokenResponse = response.json().unwrap();

    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 15 * 60);
    assert_ne!(tokens.refresh_token, pair.refresh_token.as_str());
    assert_eq!(
        ctx.signer.verify(&tokens.access_token).unwrap().identity().unwrap().0,
        7
    );
    assert!(response
        .header("set-cookie")
        .is_some_and(|c| c.starts_with(&format!("refresh_token={};", tokens.refresh_token))));

    // The rotated token is dead
    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": pair.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_unauthorized();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_revoke_every_session_when_a_refresh_token_is_replayed(ctx: &TestContext) {
    let first = ctx.sign_in(42).await;
    let other_device = ctx.sign_in(42).await;

    let rotated: TokenResponse = ctx
        .client
        .post("/auth/tokens", &json!({ "refresh_token": first.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK)
        .json()
        .unwrap();

    // An attacker presents the token the legitimate client already used
    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": first.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_unauthorized();

    // Neither the legitimate successor nor the other device's token survives
    for token in [rotated.refresh_token.as_str(), other_device.refresh_token.as_str()] {
        ctx.client
            .post("/auth/tokens", &json!({ "refresh_token": token }))
            .await
            .unwrap()
            .assert_unauthorized();
    }
    assert!(ctx.store.is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_accept_refresh_token_from_header_or_cookie(ctx: &TestContext) {
    let pair = ctx.sign_in(3).await;

    let from_header: TokenResponse = ctx
        .client
        .post_with_headers("/auth/tokens", &[("X-Refresh-Token", pair.refresh_token.as_str())])
        .await
        .unwrap()
        .assert_status(StatusCode::OK)
        .json()
        .unwrap();

    let cookie = format!("refresh_token={}", from_header.refresh_token);
    ctx.client
        .post_with_headers("/auth/tokens", &[("Cookie", &cookie)])
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_refresh_without_a_token(ctx: &TestContext) {
    ctx.client
        .post("/auth/tokens", &json!({}))
        .await
        .unwrap()
        .assert_unauthorized();

    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": "not-a-token" }))
        .await
        .unwrap()
        .assert_unauthorized();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_expired_refresh_token(ctx: &TestContext) {
    let pair = ctx.sign_in(5).await;

    ctx.clock.advance(Duration::days(30));

    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": pair.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_unauthorized();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_expire_access_token_after_its_lifetime(ctx: &TestContext) {
    let pair = ctx.sign_in(11).await;

    ctx.clock.advance(Duration::minutes(15) - Duration::seconds(1));
    let response = ctx
        .client
        .get_with_auth("/api/session", &pair.access_token)
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["identity"], json!(11));

    ctx.clock.advance(Duration::seconds(1));
    ctx.client
        .get_with_auth("/api/session", &pair.access_token)
        .await
        .unwrap()
        .assert_unauthorized();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_end_the_session_on_logout(ctx: &TestContext) {
    let pair = ctx.sign_in(8).await;
    let other_device = ctx.sign_in(8).await;

    let response = ctx
        .client
        .post("/auth/logout", &json!({ "refresh_token": pair.refresh_token.as_str() }))
        .await
        .unwrap();
    response.assert_status(StatusCode::NO_CONTENT);
    assert!(response
        .header("set-cookie")
        .is_some_and(|c| c.contains("Max-Age=0")));

    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": pair.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_unauthorized();

    // Other sessions are untouched
    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": other_device.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    // Logging out twice is fine
    ctx.client
        .post("/auth/logout", &json!({ "refresh_token": pair.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_status(StatusCode::NO_CONTENT);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_revoke_all_sessions_of_the_owner(ctx: &TestContext) {
    let first = ctx.sign_in(7).await;
    let second = ctx.sign_in(7).await;
    let bystander = ctx.sign_in(9).await;

    let response = ctx
        .client
        .delete_with_auth("/api/users/7/sessions", &first.access_token)
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body, Some(json!({ "revoked": 2 })));

    for token in [first.refresh_token.as_str(), second.refresh_token.as_str()] {
        ctx.client
            .post("/auth/tokens", &json!({ "refresh_token": token }))
            .await
            .unwrap()
            .assert_unauthorized();
    }

    // Access tokens stay valid until they expire
    ctx.client
        .get_with_auth("/api/session", &first.access_token)
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    ctx.client
        .post("/auth/tokens", &json!({ "refresh_token": bystander.refresh_token.as_str() }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn it_should_report_store_timeout_as_unavailable_not_unauthorized() {
    let store = Arc::new(BoundedSessionStore::new(HangingStore, STORE_TIMEOUT));
    let client = spawn_with_store(store).await;

    let response = client
        .post("/auth/tokens", &json!({ "refresh_token": TokenId::generate().as_str() }))
        .await
        .unwrap();

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, Some(json!({ "message": "Service unavailable" })));

    client
        .get("/health/ready")
        .await
        .unwrap()
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
