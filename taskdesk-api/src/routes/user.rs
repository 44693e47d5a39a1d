/// Account endpoints
///
/// - `POST /api/user/register` - Register a new account (always `USER`)
/// - `POST /api/user/login` - Exchange credentials for a bearer token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use taskdesk_shared::{
    auth::password,
    models::user::{CreateUser, Role},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address (becomes the token subject)
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
}

/// Login request
///
/// Not validated beyond shape: any mismatch is a plain 401.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,

    pub password: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/user/register
/// Content-Type: application/json
///
/// { "email": "user@example.com", "password": "secret" }
/// ```
///
/// # Response
///
/// `200 OK` with body `User registered: user@example.com`
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<String> {
    req.validate()?;

    let password_hash = password::hash_password(&req.password)?;

    let user = state
        .identities
        .create_user(CreateUser {
            email: req.email,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(subject = %user.email, user_id = user.id, "User registered");

    Ok(format!("User registered: {}", user.email))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/user/login
/// Content-Type: application/json
///
/// { "email": "user@example.com", "password": "secret" }
/// ```
///
/// # Response
///
/// `200 OK` with the bearer token as plain text.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<String> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .identities
        .find_by_subject(&req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::matches(&req.password, &user.password_hash) {
        tracing::warn!(subject = %user.email, "Login rejected: wrong password");
        return Err(invalid());
    }

    let token = state.codec.issue(&user.email, user.role, Utc::now())?;

    tracing::info!(subject = %user.email, role = %user.role, "Token issued");

    Ok(token)
}
