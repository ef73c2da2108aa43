//! Room inventory model and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RoomType {
    Single,
    Double,
    Suite,
}

impl RoomType {
    pub const ALL: [RoomType; 3] = [RoomType::Single, RoomType::Double, RoomType::Suite];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Single => "single",
            RoomType::Double => "double",
            RoomType::Suite => "suite",
        }
    }
}

impl FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| "Room type must be one of: single, double, suite".to_string())
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub const ALL: [RoomStatus; 3] = [
        RoomStatus::Available,
        RoomStatus::Occupied,
        RoomStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| "Status must be one of: available, occupied, maintenance".to_string())
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub room_number: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub room_type: RoomType,
    pub price_per_night: f64,
    pub status: RoomStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A validated room ready to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoom {
    pub room_number: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub price_per_night: f64,
    pub status: RoomStatus,
}

/// A validated partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_night: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
}

impl RoomChanges {
    pub fn is_empty(&self) -> bool {
        self.room_number.is_none()
            && self.room_type.is_none()
            && self.price_per_night.is_none()
            && self.status.is_none()
    }
}

impl From<NewRoom> for RoomChanges {
    fn from(room: NewRoom) -> Self {
        Self {
            room_number: Some(room.room_number),
            room_type: Some(room.room_type),
            price_per_night: Some(room.price_per_night),
            status: Some(room.status),
        }
    }
}

pub async fn list_rooms(pool: &SqlitePool) -> sqlx::Result<Vec<Room>> {
    sqlx::query_as("SELECT * FROM rooms ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn find_room(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Room>> {
    sqlx::query_as("SELECT * FROM rooms WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_room(pool: &SqlitePool, room: &NewRoom) -> sqlx::Result<Room> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO rooms (room_number, type, price_per_night, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&room.room_number)
    .bind(room.room_type)
    .bind(room.price_per_night)
    .bind(room.status)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM rooms WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

/// Apply `changes` to one room. Returns `None` when the room does not exist.
pub async fn update_room(
    pool: &SqlitePool,
    id: i64,
    changes: &RoomChanges,
) -> sqlx::Result<Option<Room>> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE rooms SET
            room_number = COALESCE(?, room_number),
            type = COALESCE(?, type),
            price_per_night = COALESCE(?, price_per_night),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&changes.room_number)
    .bind(changes.room_type)
    .bind(changes.price_per_night)
    .bind(changes.status)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find_room(pool, id).await
}

/// Delete one room, returning whether a row was removed.
pub async fn delete_room(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn room_101() -> NewRoom {
        NewRoom {
            room_number: "101".to_string(),
            room_type: RoomType::Single,
            price_per_night: 50.0,
            status: RoomStatus::Available,
        }
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("suite".parse::<RoomType>(), Ok(RoomType::Suite));
        assert!("penthouse".parse::<RoomType>().is_err());
        assert_eq!("maintenance".parse::<RoomStatus>(), Ok(RoomStatus::Maintenance));
        assert!("cleaning".parse::<RoomStatus>().is_err());
        assert_eq!(RoomStatus::default(), RoomStatus::Available);
    }

    #[test]
    fn test_room_serializes_type_field() {
        let json = serde_json::to_value(room_101()).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["status"], "available");
        assert!(json.get("room_type").is_none());
    }

    #[tokio::test]
    async fn test_create_then_list_round_trip() {
        let pool = test_pool().await;
        let created = insert_room(&pool, &room_101()).await.unwrap();

        let rooms = list_rooms(&pool).await.unwrap();
        assert_eq!(rooms.len(), 1);
        let listed = &rooms[0];
        assert_eq!(listed.id, created.id);
        assert_eq!(listed.room_number, "101");
        assert_eq!(listed.room_type, RoomType::Single);
        assert_eq!(listed.price_per_night, 50.0);
        assert_eq!(listed.status, RoomStatus::Available);
    }

    #[tokio::test]
    async fn test_room_number_is_not_unique() {
        let pool = test_pool().await;
        insert_room(&pool, &room_101()).await.unwrap();
        insert_room(&pool, &room_101()).await.unwrap();
        assert_eq!(list_rooms(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_touches_only_target() {
        let pool = test_pool().await;
        let a = insert_room(&pool, &room_101()).await.unwrap();
        let b = insert_room(
            &pool,
            &NewRoom {
                room_number: "202".to_string(),
                room_type: RoomType::Double,
                price_per_night: 80.0,
                status: RoomStatus::Occupied,
            },
        )
        .await
        .unwrap();

        let changes = RoomChanges {
            price_per_night: Some(65.5),
            status: Some(RoomStatus::Maintenance),
            ..Default::default()
        };
        let updated = update_room(&pool, a.id, &changes).await.unwrap().unwrap();

        assert_eq!(updated.room_number, "101");
        assert_eq!(updated.room_type, RoomType::Single);
        assert_eq!(updated.price_per_night, 65.5);
        assert_eq!(updated.status, RoomStatus::Maintenance);

        let untouched = find_room(&pool, b.id).await.unwrap().unwrap();
        assert_eq!(untouched, b);
    }

    #[tokio::test]
    async fn test_update_missing_room() {
        let pool = test_pool().await;
        let changes = RoomChanges {
            room_number: Some("9".to_string()),
            ..Default::default()
        };
        assert!(update_room(&pool, 99, &changes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_from_list() {
        let pool = test_pool().await;
        let room = insert_room(&pool, &room_101()).await.unwrap();

        assert!(delete_room(&pool, room.id).await.unwrap());
        assert!(list_rooms(&pool).await.unwrap().is_empty());
        assert!(!delete_room(&pool, room.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_bad_price() {
        let pool = test_pool().await;
        let mut room = room_101();
        room.price_per_night = 0.0;
        assert!(insert_room(&pool, &room).await.is_err());
    }
}
