pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod extract;
pub mod google;
pub mod handlers;
pub mod models;
pub mod poll;
pub mod session;
pub mod storage;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Base64 profile images arrive in JSON bodies.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub db_pool: PgPool,
    pub config: config::Config,
    pub google: google::GoogleClient,
    pub images: Arc<storage::CloudinaryClient>,
    pub directory: directory::DirectoryCache,
    /// Lowercased emails promoted to admin at startup and sign-in.
    pub admins: HashSet<String>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/google", get(handlers::google_sign_in))
        .route("/auth/google/callback", get(handlers::google_callback))
        .route("/auth/sign-out", post(handlers::sign_out))
        .route("/api/me", get(handlers::get_profile).put(handlers::update_profile))
        .route(
            "/api/members",
            get(handlers::list_members)
                .post(handlers::create_member)
                .delete(handlers::delete_members),
        )
        .route("/api/members/options", get(handlers::member_options))
        .route("/api/members/branches", get(handlers::list_branches))
        .route("/api/members/subdomains", get(handlers::list_subdomains))
        .route("/api/members/:id", put(handlers::update_member))
        .route("/api/images", post(handlers::upload_image).delete(handlers::delete_image))
        .route(
            "/api/rooms",
            get(handlers::list_rooms)
                .put(handlers::configure_rooms)
                .post(handlers::create_room),
        )
        .route("/api/rooms/status", get(handlers::room_status))
        .route(
            "/api/rooms/:room_id",
            get(handlers::get_room)
                .patch(handlers::rename_room)
                .delete(handlers::delete_room),
        )
        .route("/api/rooms/:room_id/panels", post(handlers::add_panel))
        .route(
            "/api/rooms/:room_id/panels/:panel_id",
            patch(handlers::update_panel).delete(handlers::delete_panel),
        )
        .route(
            "/api/rooms/:room_id/panels/:panel_id/status",
            put(handlers::set_panel_status),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
