use crate::e2e::helpers;

use axum::{middleware, routing::get, Router};
use chrono::Duration;
use helpers::{
    api_client::TestClient,
    fakes::{HangingOwnership, HitCounter},
    spawn_app, STORE_TIMEOUT, TEST_JWT_SECRET,
};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use timber_auth::domain::auth::{
    Identity, ManualClock, OwnershipCheck, PathParamOwner, TokenSigner,
};
use timber_auth::infrastructure::auth::{auth_middleware, ownership_middleware, OwnershipGuard};

struct Harness {
    client: TestClient,
    signer: Arc<TokenSigner>,
    clock: Arc<ManualClock>,
    hits: HitCounter,
}

impl Harness {
    async fn new(check: Arc<dyn OwnershipCheck>) -> Self {
        let clock = Arc::new(ManualClock::default());
        let signer = Arc::new(TokenSigner::new(TEST_JWT_SECRET, clock.clone()));
        let hits = HitCounter::default();

        let handler_hits = hits.clone();
        let app = Router::new()
            .route(
                "/api/users/:owner_id/notes",
                get(move || {
                    let hits = handler_hits.clone();
                    async move {
                        hits.hit();
                        "notes"
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(
                OwnershipGuard::new(check, STORE_TIMEOUT),
                ownership_middleware,
            ))
            .route_layer(middleware::from_fn_with_state(signer.clone(), auth_middleware));

        Self {
            client: spawn_app(app).await,
            signer,
            clock,
            hits,
        }
    }

    fn token_for(&self, identity: i64) -> String {
        self.signer
            .sign(Identity(identity), Duration::minutes(15))
            .unwrap()
            .0
    }
}

#[tokio::test]
async fn it_should_let_the_owner_through() {
    let harness = Harness::new(Arc::new(PathParamOwner::new("owner_id"))).await;

    let response = harness
        .client
        .get_with_auth("/api/users/7/notes", &harness.token_for(7))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body_bytes, b"notes");
    assert_eq!(harness.hits.count(), 1);
}

#[tokio::test]
async fn it_should_forbid_another_users_resource_without_invoking_the_handler() {
    let harness = Harness::new(Arc::new(PathParamOwner::new("owner_id"))).await;

    let response = harness
        .client
        .get_with_auth("/api/users/9/notes", &harness.token_for(7))
        .await
        .unwrap();

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.body, Some(json!({ "message": "Forbidden" })));
    assert_eq!(harness.hits.count(), 0);
}

#[tokio::test]
async fn it_should_fail_closed_when_the_ownership_lookup_times_out() {
    let harness = Harness::new(Arc::new(HangingOwnership)).await;

    let started = std::time::Instant::now();
    let response = harness
        .client
        .get_with_auth("/api/users/7/notes", &harness.token_for(7))
        .await
        .unwrap();

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, Some(json!({ "message": "Service unavailable" })));
    assert_eq!(harness.hits.count(), 0);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn it_should_reject_bad_credentials_uniformly() {
    let harness = Harness::new(Arc::new(PathParamOwner::new("owner_id"))).await;

    let foreign = TokenSigner::new(
        b"some-other-secret-0123456789abcdef",
        Arc::new(ManualClock::default()),
    );
    let (foreign_token, _) = foreign.sign(Identity(7), Duration::minutes(15)).unwrap();

    let garbage = "Bearer not-a-jwt".to_string();
    let foreign_bearer = format!("Bearer {}", foreign_token);
    let wrong_scheme = format!("Basic {}", harness.token_for(7));
    let cases: Vec<Vec<(&str, &str)>> = vec![
        vec![],
        vec![("Authorization", garbage.as_str())],
        vec![("Authorization", foreign_bearer.as_str())],
        vec![("Authorization", wrong_scheme.as_str())],
    ];

    for headers in cases {
        harness
            .client
            .request::<()>(hyper::Method::GET, "/api/users/7/notes", None, &headers)
            .await
            .unwrap()
            .assert_unauthorized();
    }
    assert_eq!(harness.hits.count(), 0);
}

#[tokio::test]
async fn it_should_reject_expired_access_tokens() {
    let harness = Harness::new(Arc::new(PathParamOwner::new("owner_id"))).await;
    let token = harness.token_for(7);

    harness.clock.advance(Duration::minutes(16));

    harness
        .client
        .get_with_auth("/api/users/7/notes", &token)
        .await
        .unwrap()
        .assert_unauthorized();
    assert_eq!(harness.hits.count(), 0);
}

#[tokio::test]
async fn it_should_reject_tokens_of_another_class() {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    let harness = Harness::new(Arc::new(PathParamOwner::new("owner_id"))).await;
    let now = chrono::Utc::now().timestamp();
    let token = encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "7", "iat": now, "exp": now + 900, "typ": "refresh" }),
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .unwrap();

    harness
        .client
        .get_with_auth("/api/users/7/notes", &token)
        .await
        .unwrap()
        .assert_unauthorized();
    assert_eq!(harness.hits.count(), 0);
}
