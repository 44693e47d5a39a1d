/// Authentication integration tests
///
/// Drive the full router against the in-memory store:
/// - Registration and login
/// - Bearer-token handling in the authentication middleware
/// - Public path bypass
/// - Anonymous access to protected handlers
mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{create_user, json_body, request, test_config, text_body, TestContext};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskdesk_api::app::{build_router, AppState};
use taskdesk_shared::auth::jwt::TokenCodec;
use taskdesk_shared::models::user::{CreateUser, Role, User};
use taskdesk_shared::store::memory::MemoryStore;
use taskdesk_shared::store::{IdentityStore, StoreError};
use tower::ServiceExt;

/// Identity store that counts subject lookups
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    lookups: AtomicUsize,
}

#[async_trait]
impl IdentityStore for CountingStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_subject(subject).await
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_id(id).await
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        self.inner.create_user(data).await
    }
}

/// Identity store that is always down
struct BrokenStore;

#[async_trait]
impl IdentityStore for BrokenStore {
    async fn find_by_subject(&self, _subject: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn find_user_by_id(&self, _id: i64) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn create_user(&self, _data: CreateUser) -> Result<User, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[tokio::test]
async fn test_register_login_and_use_token() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(request(
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "email": "new@x.com", "password": "pw-123456" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "User registered: new@x.com");

    let response = ctx
        .send(request(
            "POST",
            "/api/user/login",
            None,
            Some(json!({ "email": "new@x.com", "password": "pw-123456" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = text_body(response).await;
    assert_eq!(token.split('.').count(), 3);

    let claims = ctx.state.codec.verify(&token, Utc::now()).unwrap();
    assert_eq!(claims.sub, "new@x.com");
    assert_eq!(claims.role, Role::User);
    assert_eq!(claims.exp - claims.iat, 86_400);

    let uri = format!("/api/tasks/assignee?userId={}", ctx.user.id);
    let response = ctx
        .send(request("GET", &uri, Some(&format!("Bearer {}", token)), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_registration_always_creates_user_role() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(request(
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "email": "sneaky@x.com", "password": "pw", "role": "ADMIN" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = ctx.state.identities.find_by_subject("sneaky@x.com").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
}

#[tokio::test]
async fn test_register_duplicate_and_invalid() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(request(
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "email": "u@x.com", "password": "another" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ctx
        .send(request(
            "POST",
            "/api/user/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let ctx = TestContext::new().await;

    for (email, password) in [("u@x.com", "wrong-password"), ("nobody@x.com", "user-password")] {
        let response = ctx
            .send(request(
                "POST",
                "/api/user/login",
                None,
                Some(json!({ "email": email, "password": password })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn test_empty_bearer_is_rejected_before_lookup() {
    let store = Arc::new(CountingStore::default());
    let state = AppState::new(test_config(&[]), store.clone(), Arc::new(MemoryStore::new()));
    let ctx = TestContext::with_state(state).await;

    for value in ["Bearer ", "Bearer", "Bearer    "] {
        let response = ctx.send(request("GET", "/api/tasks", Some(value), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(text_body(response).await, "Unauthorized: Token is missing");
    }

    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(request("GET", "/api/tasks", Some("Bearer not.a.jwt"), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(text_body(response).await.starts_with("Unauthorized: "));
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let ctx = TestContext::new().await;
    let foreign = TokenCodec::new("some-other-secret-key-at-least-32-bytes")
        .issue("admin@x.com", Role::Admin, Utc::now())
        .unwrap();

    let response = ctx
        .send(request("GET", "/api/tasks", Some(&format!("Bearer {}", foreign)), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin.clone();

    let fresh = ctx.token_at(&admin, Utc::now() - Duration::seconds(86_000));
    let response = ctx
        .send(request("GET", "/api/tasks", Some(&format!("Bearer {}", fresh)), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stale = ctx.token_at(&admin, Utc::now() - Duration::seconds(86_400));
    let response = ctx
        .send(request("GET", "/api/tasks", Some(&format!("Bearer {}", stale)), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(text_body(response).await, "Unauthorized: Token has expired");
}

#[tokio::test]
async fn test_unknown_subject_is_rejected() {
    let ctx = TestContext::new().await;
    let token = ctx.state.codec.issue("ghost@x.com", Role::Admin, Utc::now()).unwrap();

    let response = ctx
        .send(request("GET", "/api/tasks", Some(&format!("Bearer {}", token)), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(text_body(response).await, "Unauthorized: User not found");
}

#[tokio::test]
async fn test_identity_store_failure_is_server_error() {
    let state = AppState::new(
        test_config(&[]),
        Arc::new(BrokenStore),
        Arc::new(MemoryStore::new()),
    );
    let token = state.codec.issue("u@x.com", Role::User, Utc::now()).unwrap();
    let app = build_router(state);

    let response = app
        .oneshot(request("GET", "/api/tasks", Some(&format!("Bearer {}", token)), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_anonymous_request_to_protected_handler_is_forbidden() {
    let ctx = TestContext::new().await;

    let response = ctx.send(request("GET", "/api/tasks", None, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Non-Bearer schemes are treated as anonymous
    let response = ctx
        .send(request("GET", "/api/tasks", Some("Basic dXNlcjpwYXNz"), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_paths_bypass_authentication() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(request("GET", "/v3/api-docs", Some("Bearer garbage"), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let docs = json_body(response).await;
    assert!(docs["endpoints"].as_array().unwrap().len() > 10);

    let response = ctx.send(request("GET", "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["database"], "in-memory");
}

#[tokio::test]
async fn test_configured_public_prefixes_replace_defaults() {
    let state = AppState::in_memory(test_config(&[("AUTH_PUBLIC_PATH_PREFIXES", "/health")]));
    create_user(&state, "u@x.com", "pw", Role::User).await;
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(request("GET", "/v3/api-docs", Some("Bearer garbage"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(request("GET", "/health", Some("Bearer garbage"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
