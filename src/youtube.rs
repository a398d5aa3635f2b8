use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;

use crate::constants::constants;

/// Matches the usual YouTube URL shapes and captures the 11-character video id:
/// `youtu.be/ID`, `youtube.com/watch?v=ID`, `/embed/ID`, `/v/ID`, `/e/ID`,
/// and nested paths such as `/user/name/ID`.
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#)
    .expect("video id pattern is a valid regex")
});

/// The 11-character video id embedded in `link`, if any.
pub fn extract_video_id(link: &str) -> Option<&str> {
  VIDEO_ID.captures(link).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// `https://www.youtube.com/embed/{id}` for a recognisable link, else `None`.
/// Cards whose link yields `None` are not rendered.
pub fn embed_url(link: &str) -> Option<String> {
  extract_video_id(link).map(|id| format!("https://www.youtube.com/embed/{id}"))
}

pub fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={video_id}")
}

/// Third-party download page for `link`.
pub fn download_url(link: &str) -> String {
  format!("{}{}", constants().download_service, urlencoding::encode(link))
}

fn thumbnail_urls(video_id: &str) -> [String; 4] {
  let host = &constants().thumbnail_host;
  [
    format!("{host}/{video_id}/maxresdefault.jpg"),
    format!("{host}/{video_id}/sddefault.jpg"),
    format!("{host}/{video_id}/hqdefault.jpg"),
    format!("{host}/{video_id}/0.jpg"),
  ]
}

/// Fetch the best available thumbnail, trying resolutions from highest down.
pub async fn fetch_thumbnail(client: &Client, video_id: &str) -> Result<DynamicImage> {
  for url in &thumbnail_urls(video_id) {
    if let Ok(response) = client.get(url).send().await
      && response.status().is_success()
    {
      let bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?;
      let image =
        image::load_from_memory(&bytes).with_context(|| format!("Failed to decode thumbnail (URL: {})", url))?;
      return Ok(image);
    }
  }
  Err(anyhow!("No thumbnail available for video {}", video_id))
}
