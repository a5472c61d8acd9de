use crate::db::room::RoomRepository;
use crate::error::{AppError, AppResult};
use crate::models::room::{next_room_number, prepare_configuration};
use crate::models::{Occupancy, PanelDraft, PanelStatus, Permissions, Room, RoomDraft};
use crate::extract::{Json, Path};
use crate::session::CurrentMember;
use crate::AppState;
use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RenameRoom {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPanelStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePanel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

fn room_json(room: &Room) -> Json<Value> {
    Json(json!({ "success": true, "room": room }))
}

/// Status board: every room in creation order
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rooms = RoomRepository::new(state.db_pool.clone()).list_all().await?;
    Ok(Json(json!({ "success": true, "rooms": rooms })))
}

/// Rooms with per-room and overall occupancy
pub async fn room_status(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rooms = RoomRepository::new(state.db_pool.clone()).list_all().await?;

    let per_room: Vec<Value> = rooms
        .iter()
        .map(|room| json!({ "roomId": room.room_id, "name": room.name, "occupancy": room.occupancy() }))
        .collect();

    Ok(Json(json!({
        "success": true,
        "overall": Occupancy::overall(&rooms),
        "rooms": per_room,
    })))
}

/// Replace every room with the submitted configuration
pub async fn configure_rooms(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(drafts): Json<Vec<RoomDraft>>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::CONFIGURE_ROOMS)?;

    // Validate everything before the existing rooms are cleared
    let now = Utc::now();
    let rooms: Vec<Room> = prepare_configuration(drafts)?
        .into_iter()
        .map(|draft| {
            let room_id = draft.room_id.unwrap_or_default();
            Room::configured(room_id, draft.name, draft.panels, now)
        })
        .collect();

    // Delete and insert in one transaction
    let cleared = RoomRepository::new(state.db_pool.clone()).replace_all(&rooms).await?;
    tracing::warn!(
        "{} reconfigured recruitment: cleared {} room(s), created {}",
        current.0.email,
        cleared,
        rooms.len()
    );

    Ok(Json(json!({ "success": true, "rooms": rooms })))
}

/// Add one room without touching the others
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(draft): Json<RoomDraft>,
) -> AppResult<(StatusCode, Json<Value>)> {
    current.require(Permissions::CONFIGURE_ROOMS)?;

    let explicit_id = draft.room_id.clone().filter(|id| !id.trim().is_empty());
    let draft = prepare_configuration(vec![draft])?
        .pop()
        .ok_or_else(|| AppError::BadRequest("A room is required".to_string()))?;

    // Auto-named rooms continue after the highest room-<n>
    let repo = RoomRepository::new(state.db_pool.clone());
    let room_id = match explicit_id {
        Some(id) => id,
        None => {
            let ids = repo.room_ids().await?;
            format!("room-{}", next_room_number(ids.iter().map(String::as_str)))
        }
    };

    let room = Room::configured(room_id, draft.name, draft.panels, Utc::now());
    repo.create(&room)
        .await
        .map_err(|e| AppError::from_write(e, &format!("Room {} already exists", room.room_id)))?;

    tracing::info!("{} created {}", current.0.email, room.room_id);
    Ok((StatusCode::CREATED, room_json(&room)))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path(room_id): Path<String>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_PANELS)?;

    let room = RoomRepository::new(state.db_pool.clone())
        .get(&room_id)
        .await?
        .ok_or(AppError::NotFound("Room not found"))?;
    Ok(room_json(&room))
}

pub async fn rename_room(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path(room_id): Path<String>,
    Json(request): Json<RenameRoom>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::CONFIGURE_ROOMS)?;

    // Names are trimmed and must not be blank
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Room name is required".to_string()));
    }

    let room = RoomRepository::new(state.db_pool.clone())
        .modify(&room_id, |room| {
            room.rename(name, Utc::now());
            Ok(())
        })
        .await?;
    Ok(room_json(&room))
}

pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path(room_id): Path<String>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::CONFIGURE_ROOMS)?;

    if !RoomRepository::new(state.db_pool.clone()).delete(&room_id).await? {
        return Err(AppError::NotFound("Room not found"));
    }

    tracing::info!("{} deleted {}", current.0.email, room_id);
    Ok(Json(json!({ "success": true })))
}

pub async fn add_panel(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path(room_id): Path<String>,
    Json(draft): Json<PanelDraft>,
) -> AppResult<(StatusCode, Json<Value>)> {
    current.require(Permissions::CONFIGURE_ROOMS)?;

    // Validate panel fields
    if draft.name.trim().is_empty() || draft.branch.trim().is_empty() {
        return Err(AppError::BadRequest("Please provide a name and branch for the panel".to_string()));
    }

    let room = RoomRepository::new(state.db_pool.clone())
        .modify(&room_id, |room| {
            room.add_panel(draft, Utc::now());
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, room_json(&room)))
}

pub async fn set_panel_status(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path((room_id, panel_id)): Path<(String, String)>,
    Json(request): Json<SetPanelStatus>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_PANELS)?;

    // Only "free" and "busy" are accepted
    let status: PanelStatus = request.status.parse().map_err(AppError::BadRequest)?;

    let room = RoomRepository::new(state.db_pool.clone())
        .modify(&room_id, |room| room.set_panel_status(&panel_id, status, Utc::now()))
        .await?;

    tracing::debug!("{} set {}/{} to {}", current.0.email, room_id, panel_id, status);
    Ok(room_json(&room))
}

pub async fn update_panel(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path((room_id, panel_id)): Path<(String, String)>,
    Json(request): Json<UpdatePanel>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_PANELS)?;

    let room = RoomRepository::new(state.db_pool.clone())
        .modify(&room_id, |room| {
            room.update_panel(&panel_id, request.name, request.branch, Utc::now())
        })
        .await?;
    Ok(room_json(&room))
}

pub async fn delete_panel(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path((room_id, panel_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_PANELS)?;

    let room = RoomRepository::new(state.db_pool.clone())
        // The room keeps at least one panel
        .modify(&room_id, |room| room.remove_panel(&panel_id, Utc::now()).map(|_| ()))
        .await?;

    tracing::info!("{} removed {} from {}", current.0.email, panel_id, room_id);
    Ok(room_json(&room))
}
