//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub app_name: String,

  // Browsing
  pub page_size: usize,
  pub suggestion_limit: usize,
  pub edits_label: String,
  pub category_tabs: Vec<String>,

  // Storage
  pub image_bucket: String,
  pub max_image_bytes: u64,
  pub image_cache_control: String,

  // Realtime
  pub video_channel: String,
  pub video_table: String,
  pub realtime_heartbeat_secs: u64,
  /// Cap for the reconnect backoff, which doubles from one second.
  pub realtime_retry_max_secs: u64,

  // Links
  pub download_service: String,
  pub thumbnail_host: String,

  // Status line
  pub notice_ttl_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; a malformed file fails the first test run.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.page_size, 5);
    assert_eq!(c.suggestion_limit, 5);
    assert_eq!(c.category_tabs, vec!["Anime", "Music", "Movies"]);
    assert_eq!(c.max_image_bytes, 5 * 1024 * 1024);
  }
}
