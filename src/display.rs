use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
  /// No thumbnail previews.
  Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
    }
  }

  /// Image rows drawn per terminal row.
  pub fn rows_per_cell(self) -> u32 {
    match self {
      DisplayMode::Ascii => 1,
      DisplayMode::Direct => 2,
    }
  }
}

fn detect(colorterm: &str) -> DisplayMode {
  match colorterm.to_lowercase().as_str() {
    "truecolor" | "24bit" => DisplayMode::Direct,
    _ => DisplayMode::Ascii,
  }
}

/// Half-block when `COLORTERM` advertises true colour, ASCII otherwise.
pub fn detect_display_mode() -> DisplayMode {
  detect(&std::env::var("COLORTERM").unwrap_or_default())
}

/// `None` disables thumbnail previews.
pub fn resolve_display_mode(cli: CliDisplayMode) -> Option<DisplayMode> {
  match cli {
    CliDisplayMode::Auto => Some(detect_display_mode()),
    CliDisplayMode::Direct => Some(DisplayMode::Direct),
    CliDisplayMode::Ascii => Some(DisplayMode::Ascii),
    CliDisplayMode::Off => None,
  }
}
