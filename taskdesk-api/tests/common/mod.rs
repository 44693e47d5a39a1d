//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - In-memory application setup
//! - Test user creation (one administrator, two regular users)
//! - Token generation
//! - Request/response helpers
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use taskdesk_api::app::{build_router, AppState};
use taskdesk_api::config::Config;
use taskdesk_shared::auth::password::hash_password;
use taskdesk_shared::models::user::{CreateUser, Role, User};
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-key-at-least-32-bytes";

/// Test context containing all necessary resources
pub struct TestContext {
    pub state: AppState,
    pub app: Router,
    pub admin: User,
    pub user: User,
    pub other: User,
}

/// Builds configuration without touching the process environment
pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("JWT_SECRET".to_string(), SECRET.to_string());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

impl TestContext {
    /// Creates a fresh in-memory application with three accounts
    pub async fn new() -> Self {
        Self::with_state(AppState::in_memory(test_config(&[]))).await
    }

    /// Creates a context over prepared state
    pub async fn with_state(state: AppState) -> Self {
        let admin = create_user(&state, "admin@x.com", "admin-password", Role::Admin).await;
        let user = create_user(&state, "u@x.com", "user-password", Role::User).await;
        let other = create_user(&state, "other@x.com", "other-password", Role::User).await;

        let app = build_router(state.clone());

        TestContext {
            state,
            app,
            admin,
            user,
            other,
        }
    }

    /// Issues a token for `user` at the current time
    pub fn token_for(&self, user: &User) -> String {
        self.token_at(user, Utc::now())
    }

    /// Issues a token for `user` at an arbitrary time
    pub fn token_at(&self, user: &User, now: DateTime<Utc>) -> String {
        self.state
            .codec
            .issue(&user.email, user.role, now)
            .expect("issue token")
    }

    /// Sends a request through the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.expect("router is infallible")
    }

    /// Sends a request as `user`
    pub async fn send_as(
        &self,
        user: &User,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let token = self.token_for(user);
        self.send(request(method, uri, Some(&format!("Bearer {}", token)), body)).await
    }

    /// Creates a task through the API as the administrator
    pub async fn create_task(&self, title: &str) -> serde_json::Value {
        let response = self
            .send_as(&self.admin, "POST", "/api/tasks", Some(serde_json::json!({ "title": title })))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await
    }

    /// Assigns a task through the API as the administrator
    pub async fn assign(&self, task_id: i64, assignee: &User) {
        let uri = format!("/api/tasks/{}/assign?assigneeId={}", task_id, assignee.id);
        let response = self.send_as(&self.admin, "PUT", &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

pub async fn create_user(state: &AppState, email: &str, password: &str, role: Role) -> User {
    state
        .identities
        .create_user(CreateUser {
            email: email.to_string(),
            password_hash: hash_password(password).expect("hash password"),
            role,
        })
        .await
        .expect("create user")
}

/// Builds a request with an optional `Authorization` value and JSON body
pub fn request(
    method: &str,
    uri: &str,
    authorization: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let text = text_body(response).await;
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON {:?}: {}", text, e))
}
