//! The managed backend as seen from the client: table reads and inserts,
//! image storage, operator sessions, and the video change feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
  Category, Character, CharacterRequest, Id, NewCharacter, NewCharacterRequest, NewVideo, Session, Video,
};
use crate::realtime::Subscription;

/// Postgres error code for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
  #[error("network error: {0}")]
  Http(#[from] reqwest::Error),

  /// The backend answered with a non-success status.
  #[error("{message} (HTTP {status})")]
  Api { status: u16, code: Option<String>, message: String },

  #[error("not signed in")]
  Unauthenticated,

  #[error("unexpected response: {0}")]
  Decode(String),

  #[error("realtime: {0}")]
  Realtime(String),

  #[error("invalid backend URL: {0}")]
  Url(String),
}

impl BackendError {
  pub fn is_unique_violation(&self) -> bool {
    matches!(self, BackendError::Api { code: Some(code), .. } if code == UNIQUE_VIOLATION)
  }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait Backend: Send + Sync {
  /// All categories, ordered by name.
  async fn categories(&self) -> BackendResult<Vec<Category>>;

  async fn characters(&self) -> BackendResult<Vec<Character>>;

  /// Characters of one category, ordered by name.
  async fn characters_in_category(&self, category_id: &str) -> BackendResult<Vec<Character>>;

  /// All videos, newest first.
  async fn videos(&self) -> BackendResult<Vec<Video>>;

  /// All character requests, pending first, then newest first.
  async fn character_requests(&self) -> BackendResult<Vec<CharacterRequest>>;

  async fn pending_requests(&self) -> BackendResult<Vec<CharacterRequest>>;

  async fn insert_character(&self, character: &NewCharacter) -> BackendResult<()>;

  async fn insert_video(&self, video: &NewVideo) -> BackendResult<()>;

  async fn insert_request(&self, request: &NewCharacterRequest) -> BackendResult<()>;

  /// Mark the given requests fulfilled at `at`.
  async fn fulfill_requests(&self, ids: &[Id], at: DateTime<Utc>) -> BackendResult<()>;

  /// Store an image object and return its public URL.
  async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<String>;

  /// Open a change feed on the video table. Dropping the returned
  /// subscription releases it.
  async fn subscribe_video_changes(&self) -> BackendResult<Subscription>;

  async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session>;

  async fn sign_out(&self) -> BackendResult<()>;

  async fn session(&self) -> Option<Session>;
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unique_violation_is_recognised_by_code() {
    let err = BackendError::Api { status: 409, code: Some("23505".into()), message: "dup".into() };
    assert!(err.is_unique_violation());
    let err = BackendError::Api { status: 500, code: Some("42P01".into()), message: "missing".into() };
    assert!(!err.is_unique_violation());
    assert!(!BackendError::Unauthenticated.is_unique_violation());
  }
}
