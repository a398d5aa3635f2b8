//! Grouping and filtering of the loaded catalog for the browse view.

use crate::catalog::Catalog;
use crate::constants::constants;
use crate::model::{CharacterWithVideos, Video};

/// Which slice of the catalog the browse view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
  /// Standalone videos ("edits").
  Edits,
  /// Characters of the named category.
  Category(String),
}

impl Selector {
  /// The fixed category bar: edits first, then the configured categories.
  pub fn tabs() -> Vec<Selector> {
    std::iter::once(Selector::Edits).chain(constants().category_tabs.iter().cloned().map(Selector::Category)).collect()
  }

  pub fn label(&self) -> &str {
    match self {
      Selector::Edits => &constants().edits_label,
      Selector::Category(name) => name,
    }
  }
}

/// The displayable list for the current selector and search query.
/// Edits and characters are separate branches and never mixed.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<'a> {
  Edits(Vec<&'a Video>),
  Characters(Vec<&'a CharacterWithVideos>),
}

impl Listing<'_> {
  pub fn len(&self) -> usize {
    match self {
      Listing::Edits(v) => v.len(),
      Listing::Characters(c) => c.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn empty_title(&self) -> &'static str {
    match self {
      Listing::Edits(_) => "No edits yet",
      Listing::Characters(_) => "No characters yet",
    }
  }
}

fn same_category(catalog: &Catalog, category_id: &str, name: &str) -> bool {
  catalog.category_name(category_id).is_some_and(|n| n.to_lowercase() == name.to_lowercase())
}

/// Case-insensitive prefix match on a character name.
pub fn name_starts_with(name: &str, query: &str) -> bool {
  name.to_lowercase().starts_with(&query.to_lowercase())
}

/// Characters whose category resolves to `name` (case-insensitive).
pub fn characters_in_category<'a>(catalog: &'a Catalog, name: &str) -> Vec<&'a CharacterWithVideos> {
  catalog.characters.iter().filter(|c| same_category(catalog, &c.character.category_id, name)).collect()
}

/// Characters whose name starts with `query`, in catalog order, any category.
pub fn characters_matching<'a>(catalog: &'a Catalog, query: &str) -> Vec<&'a CharacterWithVideos> {
  catalog.characters.iter().filter(|c| name_starts_with(c.name(), query)).collect()
}

/// Resolve the listing. A non-empty (trimmed) search query overrides the selector.
pub fn listing<'a>(catalog: &'a Catalog, selector: &Selector, query: &str) -> Listing<'a> {
  let query = query.trim();
  if !query.is_empty() {
    return Listing::Characters(characters_matching(catalog, query));
  }
  match selector {
    Selector::Edits => Listing::Edits(catalog.standalone.iter().filter(|v| v.has_embed()).collect()),
    Selector::Category(name) => Listing::Characters(characters_in_category(catalog, name)),
  }
}
