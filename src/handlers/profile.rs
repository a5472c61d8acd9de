use super::{discard_replaced_image, validation_context};
use crate::db::member::MemberRepository;
use crate::error::{AppError, AppResult};
use crate::models::Permissions;
use crate::session::CurrentMember;
use crate::validation::MemberInput;
use crate::AppState;
use crate::extract::Json;
use axum::extract::State;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn get_profile(current: CurrentMember) -> Json<Value> {
    let member = current.0;
    Json(json!({
        "success": true,
        "member": member,
        "permissions": member.permissions().bits(),
        "profileComplete": member.is_profile_complete(),
    }))
}

/// Self-service update. The email always stays the one the session belongs to.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(mut input): Json<MemberInput>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::EDIT_PROFILE)?;

    // Members cannot move their account to another email
    let previous = current.0;
    input.email = Some(previous.email.clone());
    let draft = input.validate(&validation_context(&state.config))?;

    // Role is never part of a self-service write
    let member = MemberRepository::new(state.db_pool.clone())
        .update(previous.id, &draft)
        .await
        .map_err(|e| AppError::from_write(e, "This roll number is already registered"))?
        .ok_or(AppError::NotFound("Member not found"))?;
    state.directory.invalidate().await;

    discard_replaced_image(
        &state,
        previous.profile_image.as_deref(),
        member.profile_image.as_deref(),
    )
    .await;

    tracing::info!("{} updated their profile", member.email);
    Ok(Json(json!({ "success": true, "member": member })))
}
