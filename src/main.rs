use anyhow::{Context, Result};
use k1000::config::Config;
use k1000::db::{self, member::MemberRepository, session::SessionRepository};
use k1000::directory::DirectoryCache;
use k1000::google::GoogleClient;
use k1000::models::Role;
use k1000::storage::CloudinaryClient;
use k1000::AppState;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "k1000=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // Set up database
    tracing::info!("Connecting to database");
    let db_pool = db::create_pool(&config.database_url, config.max_db_connections)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .context("Failed to run migrations")?;

    // Load and promote admins
    tracing::info!("Loading admins");
    let admins = load_admins().await;
    promote_admins(&db_pool, &admins).await;

    // Expired sessions are swept now and then hourly
    tokio::spawn(purge_sessions(db_pool.clone(), SESSION_PURGE_INTERVAL));

    let google = GoogleClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.oauth_redirect_url(),
        config.allowed_email_domain.clone(),
    );
    let images = Arc::new(CloudinaryClient::new(&config.cloudinary));

    let addr = format!("{}:{}", config.host, config.port);

    // Create shared application state
    let state = Arc::new(AppState {
        db_pool,
        config,
        google,
        images,
        directory: DirectoryCache::default(),
        admins,
    });

    let app = k1000::build_router(state);

    // Start server
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Delete expired sessions on every tick. The first tick fires immediately.
async fn purge_sessions(pool: sqlx::PgPool, every: Duration) {
    let sessions = SessionRepository::new(pool);
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match sessions.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::info!("Purged {} expired session(s)", purged),
            Err(e) => tracing::error!("Failed to purge expired sessions: {}", e),
        }
    }
}

/// Admin emails from the ADMINS environment variable or admins.txt
async fn load_admins() -> HashSet<String> {
    // Try environment variable first (for production)
    if let Ok(admins_env) = std::env::var("ADMINS") {
        tracing::info!("Loading admins from ADMINS environment variable");
        parse_admin_list(admins_env.split(','))
    }
    // Fall back to admins.txt file (for local development)
    else if let Ok(contents) = tokio::fs::read_to_string("admins.txt").await {
        tracing::info!("Loading admins from admins.txt file");
        parse_admin_list(contents.lines())
    } else {
        tracing::warn!("No admins configured (no ADMINS env var or admins.txt file)");
        HashSet::new()
    }
}

fn parse_admin_list<'a>(entries: impl Iterator<Item = &'a str>) -> HashSet<String> {
    entries
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && !entry.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

/// Promote members already on the admin list; the rest are promoted when they first sign in
async fn promote_admins(pool: &sqlx::PgPool, admins: &HashSet<String>) {
    if admins.is_empty() {
        tracing::warn!("Admin list is empty");
        return;
    }

    let member_repo = MemberRepository::new(pool.clone());
    for email in admins {
        match member_repo.set_role(email, Role::Admin).await {
            Ok(true) => tracing::info!("Promoted {} to admin", email),
            Ok(false) => tracing::debug!("{} has not signed in yet", email),
            Err(e) => tracing::error!("Failed to promote {} to admin: {}", email, e),
        }
    }

    tracing::info!("Loaded {} admin(s)", admins.len());
}
