/// Bearer-token authentication middleware for Axum
///
/// Runs once per request, before routing:
///
/// ```text
/// path on public allow-list ─────────────────────────────> pass through
/// no Authorization header / not a Bearer credential ─────> pass through (anonymous)
/// "Bearer " with empty value ────────────────────────────> 401 "Unauthorized: Token is missing"
/// token fails verification (signature, format, expiry) ──> 401 "Unauthorized: <reason>"
/// subject has no identity ───────────────────────────────> 401 "Unauthorized: User not found"
/// otherwise ─────────────────────────────────────────────> AuthContext inserted, pass through
/// ```
///
/// Anonymous requests are not rejected here; protected handlers deny them
/// when they look for the `AuthContext`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Extension, Router};
/// use taskdesk_shared::auth::identity::IdentityResolver;
/// use taskdesk_shared::auth::jwt::TokenCodec;
/// use taskdesk_shared::auth::middleware::{authenticate_request, AuthContext, Authenticator};
/// use taskdesk_shared::store::memory::MemoryStore;
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     auth.identity.subject
/// }
///
/// let authenticator = Authenticator::new(
///     Arc::new(TokenCodec::new("your-secret-key-at-least-32-bytes-long")),
///     IdentityResolver::new(Arc::new(MemoryStore::new())),
/// );
///
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn_with_state(authenticator, authenticate_request));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::identity::{IdentityResolver, ResolveError};
use super::jwt::TokenCodec;
use crate::models::user::Identity;

/// Path prefixes that skip authentication (API documentation endpoints)
pub const DEFAULT_PUBLIC_PATH_PREFIXES: [&str; 3] =
    ["/swagger-ui", "/v3/api-docs", "/swagger-resources"];

/// Identity attached to an authenticated request
///
/// Inserted into the request extensions exactly once by
/// [`authenticate_request`] and dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub identity: Identity,
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// `Authorization: Bearer` with an empty token
    #[error("Token is missing")]
    MissingToken,

    /// Token failed verification
    #[error("{0}")]
    InvalidToken(String),

    /// Token subject has no identity
    #[error("User not found")]
    IdentityNotFound(String),

    /// Identity store failed
    #[error("Identity lookup failed: {0}")]
    StoreUnavailable(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Identity store failed during authentication");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            other => (StatusCode::UNAUTHORIZED, format!("Unauthorized: {}", other)).into_response(),
        }
    }
}

impl From<ResolveError> for AuthError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(subject) => AuthError::IdentityNotFound(subject),
            ResolveError::Store(e) => AuthError::StoreUnavailable(e.to_string()),
        }
    }
}

/// Result of running the authentication state machine on a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Path is on the public allow-list; nothing was inspected
    Public,

    /// No bearer credential presented
    Anonymous,

    /// Token verified and identity resolved
    Authenticated(AuthContext),
}

/// Reads the bearer value out of an `Authorization` header value
///
/// `None` means the header is not a Bearer credential at all. `Some("")`
/// means a Bearer credential with nothing in it.
fn bearer_value(header_value: &str) -> Option<&str> {
    let rest = header_value.strip_prefix("Bearer")?;
    if rest.trim().is_empty() {
        return Some("");
    }
    rest.strip_prefix(' ')
}

/// Request authenticator
///
/// Shared read-only state: the token codec, the identity resolver and the
/// public path allow-list.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    resolver: IdentityResolver,
    public_prefixes: Arc<[String]>,
}

impl Authenticator {
    /// Creates an authenticator with the default public path prefixes
    pub fn new(codec: Arc<TokenCodec>, resolver: IdentityResolver) -> Self {
        Self {
            codec,
            resolver,
            public_prefixes: DEFAULT_PUBLIC_PATH_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Replaces the public path allow-list
    pub fn with_public_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.public_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Runs the authentication state machine for one request
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingToken` for an empty bearer value (decided before
    ///   any verification or lookup)
    /// - `AuthError::InvalidToken` when verification fails
    /// - `AuthError::IdentityNotFound` / `AuthError::StoreUnavailable` when
    ///   resolution fails
    pub async fn authenticate(
        &self,
        path: &str,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthError> {
        if self.is_public_path(path) {
            return Ok(AuthOutcome::Public);
        }

        let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_value)
        else {
            return Ok(AuthOutcome::Anonymous);
        };

        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self
            .codec
            .verify(token, now)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let identity = self.resolver.resolve_by_subject(&claims.sub).await?;

        Ok(AuthOutcome::Authenticated(AuthContext { identity }))
    }
}

/// Authentication middleware
///
/// On success the request continues with an [`AuthContext`] extension (or
/// without one for anonymous and public requests). On failure the response
/// is written here and the request never reaches routing.
pub async fn authenticate_request(
    State(authenticator): State<Authenticator>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path = req.uri().path().to_string();

    let outcome = authenticator
        .authenticate(&path, req.headers(), Utc::now())
        .await
        .map_err(|e| {
            tracing::warn!(path = %path, reason = %e, "Authentication rejected");
            e
        })?;

    if let AuthOutcome::Authenticated(context) = outcome {
        tracing::info!(subject = %context.identity.subject, "User authenticated");
        req.extensions_mut().insert(context);
    }

    Ok(next.run(req).await)
}
