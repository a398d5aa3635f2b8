//! Incremental "load more" pagination over an in-memory list.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What advances the pager by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceTrigger {
  /// An explicit "load more" action.
  #[default]
  Button,
  /// Moving onto the last visible row (infinite scroll).
  Sentinel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
  page_size: usize,
  visible: usize,
}

impl Pager {
  pub fn new(page_size: usize) -> Self {
    let page_size = page_size.max(1);
    Self { page_size, visible: page_size }
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Number of rows shown for a list of `len` items.
  pub fn visible_count(&self, len: usize) -> usize {
    self.visible.min(len)
  }

  pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
    &items[..self.visible_count(items.len())]
  }

  pub fn has_more(&self, len: usize) -> bool {
    self.visible < len
  }

  pub fn advance(&mut self) {
    self.visible = self.visible.saturating_add(self.page_size);
  }

  /// Back to the first page. Called whenever the active filter changes.
  pub fn reset(&mut self) {
    self.visible = self.page_size;
  }

  /// Sentinel trigger: the row at `index` came into view. Advances when it is
  /// the last visible row and more rows exist. Returns whether it advanced.
  pub fn reveal(&mut self, index: usize, len: usize) -> bool {
    let last = self.visible_count(len).saturating_sub(1);
    if index >= last && self.has_more(len) {
      self.advance();
      return true;
    }
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn starts_at_one_page() {
    let pager = Pager::new(5);
    assert_eq!(pager.visible_count(12), 5);
    assert_eq!(pager.visible_count(3), 3);
    assert!(pager.has_more(12));
    assert!(!pager.has_more(5));
  }

  #[test]
  fn visible_count_after_k_advances() {
    for len in [0usize, 4, 5, 11, 23] {
      for k in 0..6 {
        let mut pager = Pager::new(5);
        for _ in 0..k {
          pager.advance();
        }
        assert_eq!(pager.visible_count(len), (5 + k * 5).min(len), "len={len} k={k}");
      }
    }
  }

  #[test]
  fn reset_returns_to_first_page() {
    let mut pager = Pager::new(12);
    pager.advance();
    pager.advance();
    assert_eq!(pager.visible_count(100), 36);
    pager.reset();
    assert_eq!(pager.visible_count(100), 12);
  }

  #[test]
  fn slice_takes_prefix() {
    let items: Vec<u32> = (0..8).collect();
    let mut pager = Pager::new(3);
    assert_eq!(pager.slice(&items), &[0, 1, 2]);
    pager.advance();
    pager.advance();
    pager.advance();
    assert_eq!(pager.slice(&items), &items[..]);
  }

  #[test]
  fn reveal_only_fires_at_last_visible_row() {
    let mut pager = Pager::new(5);
    assert!(!pager.reveal(2, 20));
    assert!(pager.reveal(4, 20));
    assert_eq!(pager.visible_count(20), 10);
    let mut short = Pager::new(5);
    assert!(!short.reveal(4, 5));
  }

  #[test]
  fn zero_page_size_is_clamped() {
    let pager = Pager::new(0);
    assert_eq!(pager.page_size(), 1);
  }
}
