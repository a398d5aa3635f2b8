use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub success: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 4] = [
  Theme {
    name: "Neon Vault",
    bg: Color::Rgb(14, 12, 24),
    fg: Color::Rgb(226, 224, 240),
    accent: Color::Rgb(190, 110, 255),
    muted: Color::Rgb(120, 114, 150),
    border: Color::Rgb(64, 56, 96),
    highlight_fg: Color::Rgb(14, 12, 24),
    highlight_bg: Color::Rgb(190, 110, 255),
    stripe_bg: Color::Rgb(22, 19, 36),
    status: Color::Rgb(96, 200, 255),
    error: Color::Rgb(255, 92, 120),
    success: Color::Rgb(120, 230, 160),
    key_fg: Color::Rgb(14, 12, 24),
    key_bg: Color::Rgb(120, 114, 150),
  },
  Theme {
    name: "Midnight",
    bg: Color::Rgb(16, 20, 28),
    fg: Color::Rgb(216, 222, 233),
    accent: Color::Rgb(136, 192, 208),
    muted: Color::Rgb(106, 116, 134),
    border: Color::Rgb(59, 66, 82),
    highlight_fg: Color::Rgb(16, 20, 28),
    highlight_bg: Color::Rgb(136, 192, 208),
    stripe_bg: Color::Rgb(24, 29, 39),
    status: Color::Rgb(235, 203, 139),
    error: Color::Rgb(191, 97, 106),
    success: Color::Rgb(163, 190, 140),
    key_fg: Color::Rgb(16, 20, 28),
    key_bg: Color::Rgb(106, 116, 134),
  },
  Theme {
    name: "Sakura",
    bg: Color::Rgb(253, 246, 248),
    fg: Color::Rgb(70, 52, 62),
    accent: Color::Rgb(214, 92, 140),
    muted: Color::Rgb(160, 132, 146),
    border: Color::Rgb(232, 200, 214),
    highlight_fg: Color::Rgb(253, 246, 248),
    highlight_bg: Color::Rgb(214, 92, 140),
    stripe_bg: Color::Rgb(248, 236, 241),
    status: Color::Rgb(110, 130, 200),
    error: Color::Rgb(200, 60, 60),
    success: Color::Rgb(70, 150, 100),
    key_fg: Color::Rgb(253, 246, 248),
    key_bg: Color::Rgb(160, 132, 146),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Yellow,
    error: Color::Red,
    success: Color::Green,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name == n)).unwrap_or(0)
}
