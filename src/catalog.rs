//! Data loader: reads categories, characters and videos, then links them
//! into the nested browsing model.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tracing::info;

use crate::backend::{Backend, BackendResult};
use crate::model::{Category, Character, CharacterWithVideos, Id, Video};

/// Label shown when a row's category does not resolve.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// One load's worth of browsing data. Replaced wholesale on every reload.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  pub categories: HashMap<Id, Category>,
  /// Videos with no (resolvable) character, newest first.
  pub standalone: Vec<Video>,
  /// Characters with at least one video, in a per-load shuffled order.
  pub characters: Vec<CharacterWithVideos>,
}

impl Catalog {
  /// Partition and link raw rows.
  ///
  /// Every video lands in exactly one place: the matching character's list,
  /// or `standalone` when `character_id` is absent or does not resolve.
  /// Characters left without videos are dropped. The character order is
  /// shuffled once here so search results stay stable until the next load.
  pub fn assemble<R: Rng + ?Sized>(
    categories: Vec<Category>,
    characters: Vec<Character>,
    mut videos: Vec<Video>,
    rng: &mut R,
  ) -> Self {
    videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut slot_by_id: HashMap<Id, usize> = HashMap::with_capacity(characters.len());
    let mut grouped: Vec<CharacterWithVideos> = Vec::with_capacity(characters.len());
    for character in characters {
      slot_by_id.insert(character.id.clone(), grouped.len());
      grouped.push(CharacterWithVideos { character, videos: Vec::new() });
    }

    let mut standalone = Vec::new();
    for video in videos {
      match video.character_id.as_ref().and_then(|id| slot_by_id.get(id)) {
        Some(&slot) => grouped[slot].videos.push(video),
        None => standalone.push(video),
      }
    }

    grouped.retain(|c| !c.videos.is_empty());
    grouped.shuffle(rng);

    Self { categories: categories.into_iter().map(|c| (c.id.clone(), c)).collect(), standalone, characters: grouped }
  }

  pub fn category_name(&self, category_id: &str) -> Option<&str> {
    self.categories.get(category_id).map(|c| c.name.as_str())
  }

  /// Category name for display, `Unknown` when unresolved.
  pub fn category_label(&self, category_id: &str) -> &str {
    self.category_name(category_id).unwrap_or(UNKNOWN_CATEGORY)
  }

  pub fn character(&self, id: &str) -> Option<&CharacterWithVideos> {
    self.characters.iter().find(|c| c.id() == id)
  }

  pub fn video_count(&self) -> usize {
    self.standalone.len() + self.characters.iter().map(|c| c.videos.len()).sum::<usize>()
  }
}

/// Issue the three reads concurrently and assemble the result.
///
/// Any failed read fails the whole load; callers keep their previous catalog.
pub async fn load_catalog(backend: &dyn Backend) -> BackendResult<Catalog> {
  let (categories, characters, videos) =
    tokio::try_join!(backend.categories(), backend.characters(), backend.videos())?;
  let mut rng = StdRng::from_entropy();
  let catalog = Catalog::assemble(categories, characters, videos, &mut rng);
  info!(
    categories = catalog.categories.len(),
    characters = catalog.characters.len(),
    edits = catalog.standalone.len(),
    "catalog: loaded"
  );
  Ok(catalog)
}

#[cfg(test)]
pub mod fixtures {
  //! Row builders shared by the browsing tests.

  use chrono::{TimeZone, Utc};

  use crate::model::{Category, Character, Video};

  pub fn category(id: &str, name: &str) -> Category {
    Category { id: id.into(), name: name.into() }
  }

  pub fn character(id: &str, name: &str, category_id: &str) -> Character {
    Character { id: id.into(), name: name.into(), image_url: None, category_id: category_id.into() }
  }

  /// A video created `minute` minutes past a fixed epoch.
  pub fn video(id: &str, category_id: &str, character_id: Option<&str>, minute: u32) -> Video {
    Video {
      id: id.into(),
      title: format!("clip {id}"),
      youtube_link: "https://youtu.be/dQw4w9WgXcQ".into(),
      category_id: category_id.into(),
      character_id: character_id.map(Into::into),
      created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap(),
    }
  }

  /// Like `video`, but linking a channel page that carries no video id.
  pub fn channel_video(id: &str, category_id: &str, character_id: Option<&str>, minute: u32) -> Video {
    Video { youtube_link: "https://www.youtube.com/@SomeChannel".into(), ..video(id, category_id, character_id, minute) }
  }
}
