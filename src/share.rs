//! Handing a video link to the outside world: the system browser, the
//! download page, or the terminal clipboard.

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAction {
  /// Watch page in the browser.
  Open,
  /// Raw link to the clipboard.
  Copy,
  /// Third-party download page in the browser.
  Download,
}

/// Open `url` with the platform's default handler.
pub fn open_url(url: &str) -> Result<()> {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  let mut child = std::process::Command::new(cmd)
    .arg(url)
    .stdin(std::process::Stdio::null())
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to run {}", cmd))?;
  // Reap in the background so no zombie is left behind.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}

/// OSC 52 "set clipboard" sequence for `text`.
pub fn osc52_sequence(text: &str) -> String {
  format!("\x1B]52;c;{}\x07", BASE64.encode(text))
}

/// Copy through the terminal (works over SSH on terminals that honour OSC 52).
pub fn copy_to_clipboard(text: &str) -> Result<()> {
  let mut stdout = std::io::stdout();
  write!(stdout, "{}", osc52_sequence(text)).context("Failed to write clipboard sequence")?;
  stdout.flush().context("Failed to flush clipboard sequence")?;
  Ok(())
}
