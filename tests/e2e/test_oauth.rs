use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use test_context::test_context;
use timber_auth::domain::auth::TokenResponse;

async fn begin_sign_in(ctx: &TestContext) -> String {
    let response = ctx.client.get("/auth/signin/fake").await.unwrap();
    response.assert_status(StatusCode::TEMPORARY_REDIRECT);

    let location = response.header("location").expect("Missing location header");
    assert!(location.starts_with("https://provider.test/authorize?"));
    location
        .split("state=")
        .nth(1)
        .expect("Missing state in redirect")
        .to_string()
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_issue_tokens_on_callback(ctx: &TestContext) {
    let state = begin_sign_in(ctx).await;

    let response = ctx
        .client
        .get(&format!("/auth/callback/fake?code=code-21&state={}", state))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    response.assert_header_exists("set-cookie");
    let tokens: TokenResponse = response.json().unwrap();

    let claims = ctx.signer.verify(&tokens.access_token).unwrap();
    assert_eq!(claims.identity().unwrap().0, 21);
    assert_eq!(ctx.store.len(), 1);

    // The new refresh token works
    ctx.client
        .post("/auth/tokens", &serde_json::json!({ "refresh_token": tokens.refresh_token }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_a_rejected_assertion_without_creating_a_session(ctx: &TestContext) {
    let state = begin_sign_in(ctx).await;

    ctx.client
        .get(&format!("/auth/callback/fake?code=stolen&state={}", state))
        .await
        .unwrap()
        .assert_status(StatusCode::UNAUTHORIZED);

    assert!(ctx.store.is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unknown_or_reused_state(ctx: &TestContext) {
    ctx.client
        .get("/auth/callback/fake?code=code-21&state=forged")
        .await
        .unwrap()
        .assert_status(StatusCode::UNAUTHORIZED);

    let state = begin_sign_in(ctx).await;
    let path = format!("/auth/callback/fake?code=code-21&state={}", state);
    ctx.client.get(&path).await.unwrap().assert_status(StatusCode::OK);
    ctx.client
        .get(&path)
        .await
        .unwrap()
        .assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(ctx.store.len(), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_provider_denial(ctx: &TestContext) {
    let state = begin_sign_in(ctx).await;

    let response = ctx
        .client
        .get(&format!("/auth/callback/fake?error=access_denied&state={}", state))
        .await
        .unwrap();

    response.assert_status(StatusCode::UNAUTHORIZED);
    response.assert_error_message("Sign-in failed");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_code_and_state(ctx: &TestContext) {
    ctx.client
        .get("/auth/callback/fake?code=code-21")
        .await
        .unwrap()
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_not_found_for_unknown_provider(ctx: &TestContext) {
    ctx.client
        .get("/auth/signin/myspace")
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}
