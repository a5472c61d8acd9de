use crate::models::{Panel, Room, RoomError};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use thiserror::Error;

#[derive(Debug, FromRow)]
struct RoomRow {
    room_id: String,
    name: String,
    panels: Json<Vec<Panel>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            room_id: row.room_id,
            name: row.name,
            panels: row.panels.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModifyError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const SELECT_ROOM: &str = "SELECT room_id, name, panels, created_at, updated_at FROM rooms";

/// Rooms are stored one row per room with their panels embedded, so every
/// write replaces the whole document. There is no version column: concurrent
/// writers to the same room resolve as last write wins.
#[derive(Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Room>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RoomRow>(&format!("{} ORDER BY created_at ASC, seq ASC", SELECT_ROOM))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Room::from).collect())
    }

    pub async fn get(&self, room_id: &str) -> Result<Option<Room>, sqlx::Error> {
        let row = sqlx::query_as::<_, RoomRow>(&format!("{} WHERE room_id = $1", SELECT_ROOM))
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Room::from))
    }

    pub async fn room_ids(&self) -> Result<Vec<String>, sqlx::Error> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT room_id FROM rooms")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn create(&self, room: &Room) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO rooms (room_id, name, panels, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)"
        )
        .bind(&room.room_id)
        .bind(&room.name)
        .bind(Json(&room.panels))
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the whole room document. Returns false if the room no longer exists.
    pub async fn save(&self, room: &Room) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rooms SET name = $2, panels = $3, updated_at = $4 WHERE room_id = $1"
        )
        .bind(&room.room_id)
        .bind(&room.name)
        .bind(Json(&room.panels))
        .bind(room.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load a room, apply `mutate` to it, and write the whole document back.
    pub async fn modify<F>(&self, room_id: &str, mutate: F) -> Result<Room, ModifyError>
    where
        F: FnOnce(&mut Room) -> Result<(), RoomError>,
    {
        let mut room = self.get(room_id).await?.ok_or(RoomError::RoomNotFound)?;
        mutate(&mut room)?;

        if !self.save(&room).await? {
            return Err(RoomError::RoomNotFound.into());
        }
        Ok(room)
    }

    /// Delete every room and insert `rooms` in their place, in one transaction.
    pub async fn replace_all(&self, rooms: &[Room]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let cleared = sqlx::query("DELETE FROM rooms")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for room in rooms {
            sqlx::query(
                "INSERT INTO rooms (room_id, name, panels, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5)"
            )
            .bind(&room.room_id)
            .bind(&room.name)
            .bind(Json(&room.panels))
            .bind(room.created_at)
            .bind(room.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(cleared)
    }

    pub async fn delete(&self, room_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rooms WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
