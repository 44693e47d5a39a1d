//! # TaskDesk API Server
//!
//! Task-tracking backend with bearer-token authentication and role/assignee
//! based access control.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskdesk-api
//! ```
//!
//! Without `DATABASE_URL` the server keeps everything in memory.

use taskdesk_api::app::{build_router, seed_admin, AppState};
use taskdesk_api::config::Config;
use taskdesk_shared::db::{migrations, pool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "taskdesk_api=debug,taskdesk_shared=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, exiting...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "TaskDesk API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let bind_address = config.bind_address();

    let state = match config.database.clone() {
        Some(database) => {
            let db = pool::create_pool(pool::DatabaseConfig {
                url: database.url,
                max_connections: database.max_connections,
                ..Default::default()
            })
            .await?;
            migrations::run_migrations(&db).await?;
            tracing::info!("Using PostgreSQL store");
            AppState::postgres(config, db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            AppState::in_memory(config)
        }
    };

    seed_admin(&state).await?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
