//! Room inventory endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::response::Envelope;
use super::validation::{
    validate_price, validate_room_number, validate_room_status, validate_room_type,
};
use crate::db::{self, NewRoom, Room, RoomChanges, RoomStatus};
use crate::AppState;

/// Ability needed to read rooms
pub const ROOMS_READ: &str = "rooms:read";
/// Ability needed to create, change or delete rooms
pub const ROOMS_WRITE: &str = "rooms:write";

/// Room fields as submitted by a form. Everything is optional so that missing
/// fields become validation messages rather than deserialization failures.
#[derive(Debug, Default, Deserialize)]
pub struct RoomPayload {
    pub room_number: Option<String>,
    #[serde(rename = "type")]
    pub room_type: Option<String>,
    pub price_per_night: Option<Value>,
    pub status: Option<String>,
}

impl RoomPayload {
    /// Validate a payload for creation. Status defaults to `available`.
    pub fn into_new_room(self) -> Result<NewRoom, ApiError> {
        let mut errors = ValidationErrorBuilder::new();

        let room_number = match validate_room_number(self.room_number.as_deref().unwrap_or("")) {
            Ok(n) => Some(n),
            Err(e) => {
                errors.add("room_number", e);
                None
            }
        };

        let room_type = match validate_room_type(self.room_type.as_deref().unwrap_or("")) {
            Ok(t) => Some(t),
            Err(e) => {
                errors.add("type", e);
                None
            }
        };

        let price = match validate_price(self.price_per_night.as_ref().unwrap_or(&Value::Null)) {
            Ok(p) => Some(p),
            Err(e) => {
                errors.add("price_per_night", e);
                None
            }
        };

        let status = match self.status.as_deref() {
            None => Some(RoomStatus::default()),
            Some(raw) => match validate_room_status(raw) {
                Ok(s) => Some(s),
                Err(e) => {
                    errors.add("status", e);
                    None
                }
            },
        };

        errors.finish()?;

        match (room_number, room_type, price, status) {
            (Some(room_number), Some(room_type), Some(price_per_night), Some(status)) => {
                Ok(NewRoom {
                    room_number,
                    room_type,
                    price_per_night,
                    status,
                })
            }
            _ => Err(ApiError::internal("Room validation produced no value")),
        }
    }

    /// Validate a payload for update. Only provided fields are checked and changed.
    pub fn into_changes(self) -> Result<RoomChanges, ApiError> {
        let mut errors = ValidationErrorBuilder::new();
        let mut changes = RoomChanges::default();

        if let Some(raw) = self.room_number.as_deref() {
            match validate_room_number(raw) {
                Ok(n) => changes.room_number = Some(n),
                Err(e) => {
                    errors.add("room_number", e);
                }
            }
        }
        if let Some(raw) = self.room_type.as_deref() {
            match validate_room_type(raw) {
                Ok(t) => changes.room_type = Some(t),
                Err(e) => {
                    errors.add("type", e);
                }
            }
        }
        if let Some(raw) = self.price_per_night.as_ref() {
            match validate_price(raw) {
                Ok(p) => changes.price_per_night = Some(p),
                Err(e) => {
                    errors.add("price_per_night", e);
                }
            }
        }
        if let Some(raw) = self.status.as_deref() {
            match validate_room_status(raw) {
                Ok(s) => changes.status = Some(s),
                Err(e) => {
                    errors.add("status", e);
                }
            }
        }

        errors.finish()?;
        Ok(changes)
    }
}

/// List all rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Vec<Room>>, ApiError> {
    current.authorize(ROOMS_READ)?;
    let rooms = db::list_rooms(&state.db).await?;
    Ok(Json(rooms))
}

/// Get a single room by ID
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Room>, ApiError> {
    current.authorize(ROOMS_READ)?;
    let Path(id) = id?;
    let room = db::find_room(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;
    Ok(Json(room))
}

/// Create a new room
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    payload: Result<Json<RoomPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    current.authorize(ROOMS_WRITE)?;
    let Json(payload) = payload?;
    let new_room = payload.into_new_room()?;

    let room = db::insert_room(&state.db, &new_room).await?;

    tracing::info!(
        room_id = room.id,
        room_number = %room.room_number,
        user_id = current.user_id(),
        "Room created"
    );

    Ok((StatusCode::CREATED, Json(room)))
}

/// Update an existing room (PUT and PATCH both overwrite only the provided fields)
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RoomPayload>, JsonRejection>,
) -> Result<Json<Room>, ApiError> {
    current.authorize(ROOMS_WRITE)?;
    let Path(id) = id?;
    let Json(payload) = payload?;
    let changes = payload.into_changes()?;

    let room = db::update_room(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    tracing::info!(room_id = room.id, user_id = current.user_id(), "Room updated");

    Ok(Json(room))
}

/// Delete a room
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<()>, ApiError> {
    current.authorize(ROOMS_WRITE)?;
    let Path(id) = id?;
    if !db::delete_room(&state.db, id).await? {
        return Err(ApiError::not_found("Room not found"));
    }

    tracing::info!(room_id = id, user_id = current.user_id(), "Room deleted");

    Ok(Envelope::message("Room deleted"))
}
