//! Rooms screen state: the room table plus an add/edit form.

use serde::{Deserialize, Serialize};

use super::{ClientError, RoomsApi};
use crate::db::{Room, RoomStatus};

/// Form inputs as typed by the user. Values are sent as-is and validated
/// server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomFields {
    pub room_number: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub price_per_night: String,
    pub status: String,
}

impl Default for RoomFields {
    fn default() -> Self {
        Self {
            room_number: String::new(),
            room_type: String::new(),
            price_per_night: String::new(),
            status: RoomStatus::default().as_str().to_string(),
        }
    }
}

impl From<&Room> for RoomFields {
    fn from(room: &Room) -> Self {
        Self {
            room_number: room.room_number.clone(),
            room_type: room.room_type.as_str().to_string(),
            price_per_night: room.price_per_night.to_string(),
            status: room.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Hidden,
    Create,
    Edit(i64),
}

impl FormMode {
    pub fn is_visible(&self) -> bool {
        !matches!(self, FormMode::Hidden)
    }

    pub fn edit_target(&self) -> Option<i64> {
        match self {
            FormMode::Edit(id) => Some(*id),
            _ => None,
        }
    }
}

/// Asks the user to confirm a destructive action
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this room?";

pub struct RoomsView<A> {
    api: A,
    rooms: Vec<Room>,
    form: FormMode,
    pub fields: RoomFields,
    error: Option<String>,
    success: Option<String>,
}

impl<A: RoomsApi> RoomsView<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            rooms: Vec::new(),
            form: FormMode::Hidden,
            fields: RoomFields::default(),
            error: None,
            success: None,
        }
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn form(&self) -> FormMode {
        self.form
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    /// Show or hide the form. Either way the edit target is dropped and the
    /// fields go back to their defaults.
    pub fn toggle_form(&mut self) {
        self.form = if self.form.is_visible() {
            FormMode::Hidden
        } else {
            FormMode::Create
        };
        self.fields = RoomFields::default();
    }

    pub fn edit(&mut self, room: &Room) {
        self.fields = RoomFields::from(room);
        self.form = FormMode::Edit(room.id);
    }

    /// Re-fetch the room list
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        match self.api.list_rooms().await {
            Ok(rooms) => {
                self.rooms = rooms;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Listing rooms failed");
                self.error = Some("Failed to load rooms".to_string());
                Err(e)
            }
        }
    }

    /// Create or update from the current fields, then reload the list.
    ///
    /// The list is only replaced by what the server returns afterwards; a
    /// failed reload leaves the mutation in place and records the load error.
    pub async fn submit(&mut self) -> Result<Room, ClientError> {
        self.error = None;
        self.success = None;

        let target = self.form.edit_target();
        let result = match target {
            Some(id) => self.api.update_room(id, &self.fields).await,
            None => self.api.create_room(&self.fields).await,
        };

        let room = match result {
            Ok(room) => room,
            Err(e) => {
                tracing::debug!(error = %e, "Saving room failed");
                self.error = Some(
                    match target {
                        Some(_) => "Failed to update room",
                        None => "Failed to add room",
                    }
                    .to_string(),
                );
                return Err(e);
            }
        };

        self.success = Some(
            match target {
                Some(_) => "Room updated successfully!",
                None => "Room added successfully!",
            }
            .to_string(),
        );
        self.form = FormMode::Hidden;
        self.fields = RoomFields::default();

        let _ = self.refresh().await;
        Ok(room)
    }

    /// Delete after confirmation. Returns whether anything was deleted.
    pub async fn delete<C>(&mut self, id: i64, confirm: &mut C) -> Result<bool, ClientError>
    where
        C: Confirm + ?Sized,
    {
        if !confirm.confirm(DELETE_PROMPT) {
            return Ok(false);
        }

        self.error = None;
        self.success = None;

        if let Err(e) = self.api.delete_room(id).await {
            tracing::debug!(error = %e, id, "Deleting room failed");
            self.error = Some("Failed to delete room".to_string());
            return Err(e);
        }

        self.success = Some("Room deleted successfully".to_string());
        let _ = self.refresh().await;
        Ok(true)
    }
}
