//! Visitor character requests: submission with duplicate detection, and the
//! auto-fulfillment sweep run each time the request list is opened.

use chrono::Utc;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError, BackendResult};
use crate::model::{CharacterRequest, Id, NewCharacterRequest, RequestStatus};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
  #[error("Please enter a character name")]
  EmptyName,

  #[error("This character has already been requested")]
  Duplicate,

  #[error("Failed to submit request: {0}")]
  Backend(#[from] BackendError),
}

/// Matching key for character names: lowercase, spaces and hyphens removed.
/// "Son Goku", "son-goku" and "SONGOKU" share one key.
pub fn normalize_name(name: &str) -> String {
  name.chars().filter(|c| !c.is_whitespace() && *c != '-').flat_map(char::to_lowercase).collect()
}

/// Ids of pending requests whose name matches an existing character.
pub fn requests_to_fulfill<'a, I>(requests: &[CharacterRequest], character_names: I) -> Vec<Id>
where
  I: IntoIterator<Item = &'a str>,
{
  let known: HashSet<String> = character_names.into_iter().map(normalize_name).collect();
  requests
    .iter()
    .filter(|r| r.status == RequestStatus::Pending && known.contains(&normalize_name(&r.character_name)))
    .map(|r| r.id.clone())
    .collect()
}

/// Display order: pending before fulfilled, newest first within each.
pub fn sort_for_display(requests: &mut [CharacterRequest]) {
  requests.sort_by(|a, b| a.status.cmp(&b.status).then(b.created_at.cmp(&a.created_at)));
}

/// Submit a request for `raw_name`. Returns the trimmed name on success.
///
/// Empty names are rejected before any backend call. A pending request with
/// the same normalized name, or a unique-constraint violation on insert,
/// yields [`RequestError::Duplicate`].
pub async fn submit_request(backend: &dyn Backend, raw_name: &str) -> Result<String, RequestError> {
  let name = raw_name.trim();
  if name.is_empty() {
    return Err(RequestError::EmptyName);
  }

  let key = normalize_name(name);
  let pending = backend.pending_requests().await?;
  if pending.iter().any(|r| normalize_name(&r.character_name) == key) {
    info!(name, "requests: duplicate pending request");
    return Err(RequestError::Duplicate);
  }

  match backend.insert_request(&NewCharacterRequest { character_name: name.to_string() }).await {
    Ok(()) => {
      info!(name, "requests: submitted");
      Ok(name.to_string())
    }
    Err(e) if e.is_unique_violation() => Err(RequestError::Duplicate),
    Err(e) => {
      warn!(err = %e, "requests: submit failed");
      Err(RequestError::Backend(e))
    }
  }
}

/// Mark pending requests that now match a character as fulfilled.
/// Returns how many were marked.
async fn sweep(backend: &dyn Backend, requests: &[CharacterRequest]) -> BackendResult<usize> {
  let characters = backend.characters().await?;
  let ids = requests_to_fulfill(requests, characters.iter().map(|c| c.name.as_str()));
  if !ids.is_empty() {
    info!(count = ids.len(), "requests: auto-fulfilling");
    backend.fulfill_requests(&ids, Utc::now()).await?;
  }
  Ok(ids.len())
}

/// Load every request. With `auto_fulfill`, pending requests that now match
/// an existing character are marked fulfilled first and the list re-read.
/// A failed sweep is logged and the list is shown as read.
pub async fn load_requests(backend: &dyn Backend, auto_fulfill: bool) -> BackendResult<Vec<CharacterRequest>> {
  let mut requests = backend.character_requests().await?;
  if auto_fulfill {
    match sweep(backend, &requests).await {
      Ok(0) => {}
      Ok(_) => requests = backend.character_requests().await?,
      Err(e) => warn!(err = %e, "requests: auto-fulfill failed, showing list as read"),
    }
  }
  sort_for_display(&mut requests);
  Ok(requests)
}

#[cfg(test)]
mod tests {
  use assert_matches::assert_matches;
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::backend::mock::{MockBackend, MockState};
  use crate::catalog::fixtures::character;

  fn request(id: &str, name: &str, status: RequestStatus, day: u32) -> CharacterRequest {
    CharacterRequest {
      id: id.into(),
      character_name: name.into(),
      status,
      created_at: Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap(),
      fulfilled_at: None,
    }
  }

  #[test]
  fn normalization_collapses_case_spaces_and_hyphens() {
    assert_eq!(normalize_name("Son Goku"), "songoku");
    assert_eq!(normalize_name("son-goku"), "songoku");
    assert_eq!(normalize_name("SONGOKU"), "songoku");
    assert_eq!(normalize_name(" Monkey D.  Luffy "), "monkeyd.luffy");
  }

  #[test]
  fn fulfill_matches_only_pending() {
    let requests = vec![
      request("r1", "son-goku", RequestStatus::Pending, 1),
      request("r2", "Vegeta", RequestStatus::Pending, 2),
      request("r3", "SONGOKU", RequestStatus::Fulfilled, 3),
    ];
    assert_eq!(requests_to_fulfill(&requests, ["Son Goku"]), vec!["r1".to_string()]);
  }

  #[test]
  fn display_order_pending_first_then_newest() {
    let mut requests = vec![
      request("old", "A", RequestStatus::Pending, 1),
      request("done", "B", RequestStatus::Fulfilled, 9),
      request("new", "C", RequestStatus::Pending, 5),
    ];
    sort_for_display(&mut requests);
    let ids: Vec<&str> = requests.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old", "done"]);
  }

  #[tokio::test]
  async fn blank_name_is_rejected_without_network() {
    let backend = MockBackend::default();
    assert_matches!(submit_request(&backend, "   ").await, Err(RequestError::EmptyName));
    assert_eq!(backend.calls(), 0);
  }

  #[tokio::test]
  async fn normalized_duplicate_of_pending_is_rejected() {
    let backend = MockBackend::new(MockState {
      requests: vec![request("r1", "Son Goku", RequestStatus::Pending, 1)],
      ..Default::default()
    });
    assert_matches!(submit_request(&backend, "son-goku").await, Err(RequestError::Duplicate));
    assert_matches!(submit_request(&backend, "SONGOKU").await, Err(RequestError::Duplicate));
    assert_eq!(backend.state.lock().unwrap().requests.len(), 1);
  }

  #[tokio::test]
  async fn fulfilled_name_can_be_requested_again() {
    let backend = MockBackend::new(MockState {
      requests: vec![request("r1", "Goku", RequestStatus::Fulfilled, 1)],
      ..Default::default()
    });
    assert_eq!(submit_request(&backend, "  Goku ").await.unwrap(), "Goku");
    assert_eq!(backend.state.lock().unwrap().requests.len(), 2);
  }

  #[tokio::test]
  async fn unique_violation_maps_to_duplicate() {
    let backend = MockBackend::new(MockState { unique_violation_on_request: true, ..Default::default() });
    assert_matches!(submit_request(&backend, "Naruto").await, Err(RequestError::Duplicate));
  }

  #[tokio::test]
  async fn other_insert_failures_are_generic() {
    let backend = MockBackend::new(MockState { fail_writes: true, ..Default::default() });
    assert_matches!(submit_request(&backend, "Naruto").await, Err(RequestError::Backend(_)));
  }

  #[tokio::test]
  async fn load_sweeps_matching_requests() {
    let backend = MockBackend::new(MockState {
      characters: vec![character("ch1", "Son Goku", "c1")],
      requests: vec![
        request("r1", "son-goku", RequestStatus::Pending, 1),
        request("r2", "Vegeta", RequestStatus::Pending, 2),
      ],
      ..Default::default()
    });
    let list = load_requests(&backend, true).await.unwrap();
    let goku = list.iter().find(|r| r.id == "r1").unwrap();
    assert_eq!(goku.status, RequestStatus::Fulfilled);
    assert!(goku.fulfilled_at.is_some());
    assert_eq!(list[0].id, "r2");
  }

  #[tokio::test]
  async fn load_without_sweep_leaves_requests_pending() {
    let backend = MockBackend::new(MockState {
      characters: vec![character("ch1", "Son Goku", "c1")],
      requests: vec![request("r1", "son-goku", RequestStatus::Pending, 1)],
      ..Default::default()
    });
    let list = load_requests(&backend, false).await.unwrap();
    assert_eq!(list[0].status, RequestStatus::Pending);
    assert_eq!(backend.calls(), 1);
  }

  #[tokio::test]
  async fn failed_sweep_still_returns_the_list() {
    let backend = MockBackend::new(MockState {
      characters: vec![character("ch1", "Son Goku", "c1")],
      requests: vec![
        request("r1", "son-goku", RequestStatus::Pending, 1),
        request("r2", "Vegeta", RequestStatus::Fulfilled, 2),
      ],
      fail_writes: true,
      ..Default::default()
    });
    let list = load_requests(&backend, true).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, "r1");
    assert_eq!(list[0].status, RequestStatus::Pending);
  }

  #[tokio::test]
  async fn unreadable_characters_skip_the_sweep() {
    let backend = MockBackend::new(MockState {
      requests: vec![request("r1", "Goku", RequestStatus::Pending, 1)],
      failing_reads: vec!["characters"],
      ..Default::default()
    });
    let list = load_requests(&backend, true).await.unwrap();
    assert_eq!(list.len(), 1);
  }
}
