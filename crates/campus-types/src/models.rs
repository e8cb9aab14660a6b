use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;

/// Store-assigned message identifier. Strictly increasing with append order.
pub type MessageId = i64;

/// A class group: one subject taught in one room at one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub subject_name: String,
    pub building: String,
    pub floor_number: i32,
    pub classroom_number: String,
    pub time_slot: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Attributes for a group that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub subject_name: String,
    pub building: String,
    pub floor_number: i32,
    pub classroom_number: String,
    #[serde(default)]
    pub time_slot: Option<String>,
}

impl NewGroup {
    /// Trim every text field and reject the ones that end up empty.
    pub fn normalized(self) -> Result<Self, ChatError> {
        let subject_name = required("subject_name", &self.subject_name)?;
        let building = required("building", &self.building)?;
        let classroom_number = required("classroom_number", &self.classroom_number)?;
        let time_slot = self
            .time_slot
            .map(|slot| slot.trim().to_string())
            .filter(|slot| !slot.is_empty());

        Ok(Self {
            subject_name,
            building,
            floor_number: self.floor_number,
            classroom_number,
            time_slot,
        })
    }
}

/// A chat message as stored. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub group_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Total order within a group: timestamp first, identifier as tie-break.
    pub fn ordering_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }
}

/// A message that passed input validation and may be handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    author: String,
    body: String,
}

impl NewMessage {
    pub fn new(author: &str, body: &str) -> Result<Self, ChatError> {
        Ok(Self {
            author: required("author", author)?,
            body: required("body", body)?,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Direction of a message query, by ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A generated summary together with the messages it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub group_id: Uuid,
    /// Source messages, oldest first.
    pub window: Vec<Message>,
    pub summary: String,
}

fn required(field: &str, value: &str) -> Result<String, ChatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
