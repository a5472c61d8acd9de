mod auth;
mod images;
mod members;
mod profile;
mod rooms;

pub use auth::{google_callback, google_sign_in, sign_out};
pub use images::{delete_image, upload_image};
pub use members::{
    create_member, delete_members, list_branches, list_members, list_subdomains, member_options,
    update_member,
};
pub use profile::{get_profile, update_profile};
pub use rooms::{
    add_panel, configure_rooms, create_room, delete_panel, delete_room, get_room, list_rooms,
    rename_room, room_status, set_panel_status, update_panel,
};

use crate::config::Config;
use crate::storage::ImageStore;
use crate::validation::ValidationContext;
use crate::AppState;
use chrono::{Datelike, Utc};

pub async fn health_check() -> &'static str {
    "OK"
}

fn validation_context(config: &Config) -> ValidationContext<'_> {
    ValidationContext {
        email_domain: &config.allowed_email_domain,
        current_two_digit_year: Utc::now().year() % 100,
    }
}

/// Remove an image that a profile no longer points at. Failures are only logged.
async fn discard_replaced_image(state: &AppState, previous: Option<&str>, current: Option<&str>) {
    let Some(previous) = previous.filter(|url| !url.is_empty()) else {
        return;
    };
    if Some(previous) == current {
        return;
    }
    if let Err(e) = state.images.delete_by_url(previous).await {
        tracing::warn!("Could not delete replaced image {}: {:#}", previous, e);
    }
}
