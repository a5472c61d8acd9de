use crate::error::{AppError, AppResult};
use crate::models::Permissions;
use crate::session::CurrentMember;
use crate::storage::ImageStore;
use crate::AppState;
use crate::extract::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct UploadImage {
    /// base64 `data:image/...` URI
    pub image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImage {
    pub image_url: String,
}

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(request): Json<UploadImage>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::EDIT_PROFILE)?;

    // Only inline data URIs are accepted, never remote URLs
    if !request.image.starts_with("data:image/") {
        return Err(AppError::BadRequest("Expected a base64 image data URI".to_string()));
    }

    let uploaded = state.images.upload(&request.image).await?;
    Ok(Json(json!({ "success": true, "url": uploaded.url, "publicId": uploaded.public_id })))
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(request): Json<DeleteImage>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;

    // Resolve the public id from the URL, then destroy it
    state.images.delete_by_url(&request.image_url).await?;
    Ok(Json(json!({ "success": true })))
}
