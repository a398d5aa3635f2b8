//! Row types mirrored from the backend tables, plus the client-side
//! `CharacterWithVideos` grouping built on every load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::youtube::extract_video_id;

/// Opaque row identifier as issued by the backend.
pub type Id = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: Id,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
  pub id: Id,
  pub name: String,
  #[serde(default)]
  pub image_url: Option<String>,
  pub category_id: Id,
}

/// A posted clip. `character_id == None` marks a standalone edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
  pub id: Id,
  pub title: String,
  pub youtube_link: String,
  pub category_id: Id,
  #[serde(default)]
  pub character_id: Option<Id>,
  pub created_at: DateTime<Utc>,
}

impl Video {
  /// Links without a YouTube id have no player and are never shown.
  pub fn has_embed(&self) -> bool {
    extract_video_id(&self.youtube_link).is_some()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Fulfilled,
}

impl RequestStatus {
  pub fn label(self) -> &'static str {
    match self {
      RequestStatus::Pending => "pending",
      RequestStatus::Fulfilled => "fulfilled",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRequest {
  pub id: Id,
  pub character_name: String,
  pub status: RequestStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub fulfilled_at: Option<DateTime<Utc>>,
}

/// A character together with its attached clips, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterWithVideos {
  pub character: Character,
  pub videos: Vec<Video>,
}

impl CharacterWithVideos {
  pub fn id(&self) -> &str {
    &self.character.id
  }

  pub fn name(&self) -> &str {
    &self.character.name
  }

  /// Videos that can be shown, newest first.
  pub fn playable(&self) -> Vec<&Video> {
    self.videos.iter().filter(|v| v.has_embed()).collect()
  }
}

// --- Insert payloads ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCharacter {
  pub name: String,
  pub category_id: Id,
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewVideo {
  pub title: String,
  pub youtube_link: String,
  pub category_id: Id,
  pub character_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCharacterRequest {
  pub character_name: String,
}

/// An authenticated operator session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: Option<String>,
  pub expires_at: Option<DateTime<Utc>>,
  pub email: Option<String>,
}

impl Session {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|t| t <= now)
  }
}
