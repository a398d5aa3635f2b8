//! Search-as-you-type suggestions over the loaded characters.

use ratatui::layout::{Position, Rect};

use crate::browse::name_starts_with;
use crate::input::TextInput;
use crate::model::CharacterWithVideos;

/// Up to `limit` characters whose name starts with `query` (ignoring case),
/// in the order given. An empty query yields nothing.
pub fn suggestions<'a>(characters: &'a [CharacterWithVideos], query: &str, limit: usize) -> Vec<&'a CharacterWithVideos> {
  let query = query.trim();
  if query.is_empty() {
    return Vec::new();
  }
  characters.iter().filter(|c| name_starts_with(c.name(), query)).take(limit).collect()
}

/// The search field and its suggestion dropdown.
#[derive(Debug, Default)]
pub struct SearchBox {
  pub input: TextInput,
  pub open: bool,
  /// Highlighted suggestion row.
  pub highlighted: usize,
  /// Screen area of the dropdown as last drawn, for click-outside dismissal.
  pub area: Option<Rect>,
}

impl SearchBox {
  pub fn query(&self) -> &str {
    &self.input.value
  }

  /// Call after every edit. Opens the dropdown for a non-empty query and
  /// closes it when the query becomes empty.
  pub fn query_changed(&mut self) {
    self.open = !self.input.value.trim().is_empty();
    self.highlighted = 0;
  }

  pub fn dismiss(&mut self) {
    self.open = false;
    self.area = None;
  }

  /// Clear the query and close the dropdown, as after picking a suggestion.
  pub fn reset(&mut self) {
    self.input.clear();
    self.highlighted = 0;
    self.dismiss();
  }

  pub fn highlight_next(&mut self, count: usize) {
    if count > 0 {
      self.highlighted = (self.highlighted + 1) % count;
    }
  }

  pub fn highlight_prev(&mut self, count: usize) {
    if count > 0 {
      self.highlighted = if self.highlighted == 0 { count - 1 } else { self.highlighted - 1 };
    }
  }

  /// A click at `(column, row)`: anything outside the dropdown closes it.
  /// Returns the suggestion row hit, if the click landed inside.
  pub fn click(&mut self, column: u16, row: u16) -> Option<usize> {
    let area = self.area?;
    if !self.open {
      return None;
    }
    if !area.contains(Position::new(column, row)) {
      self.dismiss();
      return None;
    }
    // Skip the top border.
    let offset = row.checked_sub(area.y + 1)?;
    Some(offset as usize)
  }
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;
  use rand::rngs::StdRng;

  use super::*;
  use crate::catalog::Catalog;
  use crate::catalog::fixtures::*;

  fn characters() -> Vec<CharacterWithVideos> {
    let names = ["Gojo", "Goku", "Gon", "Gintoki", "Guts", "Gohan", "Garou", "Asta"];
    let chars = names.iter().enumerate().map(|(i, n)| character(&format!("ch{i}"), n, "c1")).collect();
    let videos = (0..names.len()).map(|i| video(&format!("v{i}"), "c1", Some(format!("ch{i}").as_str()), i as u32)).collect();
    Catalog::assemble(vec![category("c1", "Anime")], chars, videos, &mut StdRng::seed_from_u64(3)).characters
  }

  #[test]
  fn at_most_limit_prefix_matches_in_order() {
    let chars = characters();
    let got = suggestions(&chars, "g", 5);
    assert_eq!(got.len(), 5);
    assert!(got.iter().all(|c| c.name().to_lowercase().starts_with('g')));
    let expected: Vec<&str> = chars.iter().filter(|c| c.name().starts_with('G')).take(5).map(|c| c.id()).collect();
    let got_ids: Vec<&str> = got.iter().map(|c| c.id()).collect();
    assert_eq!(got_ids, expected);
  }

  #[test]
  fn suggestions_are_a_subset_of_characters() {
    let chars = characters();
    for query in ["go", "GO", "gu", "x", "a"] {
      for s in suggestions(&chars, query, 5) {
        assert!(chars.iter().any(|c| c.id() == s.id()));
        assert!(s.name().to_lowercase().starts_with(&query.to_lowercase()));
      }
    }
  }

  #[test]
  fn empty_query_suggests_nothing() {
    assert!(suggestions(&characters(), "  ", 5).is_empty());
  }

  #[test]
  fn dropdown_follows_query() {
    let mut search = SearchBox::default();
    search.input.set("go");
    search.query_changed();
    assert!(search.open);
    search.input.clear();
    search.query_changed();
    assert!(!search.open);
  }

  #[test]
  fn click_outside_dismisses() {
    let mut search = SearchBox::default();
    search.input.set("go");
    search.query_changed();
    search.area = Some(Rect::new(10, 5, 20, 7));
    assert_eq!(search.click(12, 7), Some(1));
    assert!(search.open);
    assert_eq!(search.click(0, 0), None);
    assert!(!search.open);
  }

  #[test]
  fn reset_clears_and_closes() {
    let mut search = SearchBox::default();
    search.input.set("gon");
    search.query_changed();
    search.highlight_next(3);
    search.reset();
    assert_eq!(search.query(), "");
    assert!(!search.open);
    assert_eq!(search.highlighted, 0);
  }

  #[test]
  fn highlight_wraps() {
    let mut search = SearchBox::default();
    search.highlight_prev(3);
    assert_eq!(search.highlighted, 2);
    search.highlight_next(3);
    assert_eq!(search.highlighted, 0);
  }
}
