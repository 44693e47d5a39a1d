/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskdesk_api::{app::{build_router, AppState}, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::in_memory(config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskdesk_shared::auth::identity::IdentityResolver;
use taskdesk_shared::auth::jwt::TokenCodec;
use taskdesk_shared::auth::middleware::{authenticate_request, Authenticator};
use taskdesk_shared::auth::password;
use taskdesk_shared::models::user::{CreateUser, Role};
use taskdesk_shared::store::memory::MemoryStore;
use taskdesk_shared::store::postgres::PgStore;
use taskdesk_shared::store::{IdentityStore, TaskStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
/// Everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// User accounts
    pub identities: Arc<dyn IdentityStore>,

    /// Tasks and comments
    pub tasks: Arc<dyn TaskStore>,

    /// Token issue/verify
    pub codec: Arc<TokenCodec>,

    /// Request authenticator (shares `codec` and `identities`)
    pub authenticator: Authenticator,

    /// Database pool, when running against PostgreSQL
    pub db: Option<PgPool>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates state over arbitrary store implementations
    pub fn new(
        config: Config,
        identities: Arc<dyn IdentityStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::with_ttl(
            &config.jwt.secret,
            chrono::Duration::seconds(config.jwt.ttl_seconds),
        ));

        let resolver = IdentityResolver::new(identities.clone());
        let authenticator = Authenticator::new(codec.clone(), resolver)
            .with_public_prefixes(config.auth.public_path_prefixes.iter().cloned());

        Self {
            identities,
            tasks,
            codec,
            authenticator,
            db: None,
            config: Arc::new(config),
        }
    }

    /// Creates state backed by a single in-memory store
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }

    /// Creates state backed by PostgreSQL
    pub fn postgres(config: Config, pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let mut state = Self::new(config, store.clone(), store);
        state.db = Some(pool);
        state
    }
}

/// Provisions the configured administrator account
///
/// Returns `true` when the account was created, `false` when it already
/// existed or no administrator is configured. An existing account is left
/// untouched.
pub async fn seed_admin(state: &AppState) -> anyhow::Result<bool> {
    let Some(admin) = &state.config.bootstrap_admin else {
        return Ok(false);
    };

    if state.identities.find_by_subject(&admin.email).await?.is_some() {
        tracing::debug!(subject = %admin.email, "Bootstrap administrator already exists");
        return Ok(false);
    }

    let password_hash = password::hash_password(&admin.password)?;
    let user = state
        .identities
        .create_user(CreateUser {
            email: admin.email.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(subject = %user.email, user_id = user.id, "Bootstrap administrator created");
    Ok(true)
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                      # Health check (public)
/// ├── GET  /v3/api-docs                 # Endpoint listing (bypasses auth)
/// ├── /api/user/
/// │   ├── POST /register
/// │   └── POST /login
/// └── /api/tasks/
///     ├── POST   /                      # ADMIN
///     ├── GET    /                      # ADMIN
///     ├── GET    /assignee?userId       # USER, ADMIN
///     ├── GET    /author?userId         # USER, ADMIN
///     ├── PUT    /:id                   # ADMIN
///     ├── DELETE /:id                   # ADMIN
///     ├── PUT    /:id/priority          # ADMIN
///     ├── PUT    /:id/assign            # ADMIN
///     ├── PUT    /:id/status            # assignee or ADMIN
///     └── POST   /:id/comment           # assignee or ADMIN
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. CORS (tower-http CorsLayer)
/// 2. Logging (tower-http TraceLayer)
/// 3. Authentication (every request, before the handler runs)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/v3/api-docs", get(routes::docs::api_docs));

    let user_routes = Router::new()
        .route("/register", post(routes::user::register))
        .route("/login", post(routes::user::login));

    let task_routes = Router::new()
        .route(
            "/",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route("/assignee", get(routes::tasks::list_by_assignee))
        .route("/author", get(routes::tasks::list_by_author))
        .route(
            "/:id",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/:id/priority", put(routes::tasks::update_priority))
        .route("/:id/assign", put(routes::tasks::assign_task))
        .route("/:id/status", put(routes::tasks::update_status))
        .route("/:id/comment", post(routes::tasks::add_comment));

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .merge(health_routes)
        .nest("/api/user", user_routes)
        .nest("/api/tasks", task_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.authenticator.clone(),
            authenticate_request,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
