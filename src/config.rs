use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::constants::constants;
use crate::pager::AdvanceTrigger;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct BackendConfig {
  pub url: Option<String>,
  pub anon_key: Option<String>,
}

/// Persisted preferences, `config.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub page_size: Option<usize>,
  pub advance: Option<AdvanceTrigger>,
  pub auto_fulfill: Option<bool>,
  #[serde(default)]
  pub backend: BackendConfig,
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "editvaults")
}

impl Config {
  pub fn path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
  }

  pub fn load_from(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }

  /// Missing file yields defaults; a broken one is logged and ignored.
  pub fn load() -> Self {
    let Some(path) = Self::path() else { return Self::default() };
    if !path.exists() {
      return Self::default();
    }
    Self::load_from(&path).unwrap_or_else(|e| {
      warn!(err = %format!("{:#}", e), "config: ignoring unreadable config");
      Self::default()
    })
  }

  /// Re-read the file at `path`, apply `update`, and write it back, so fields
  /// this process never touched survive.
  pub fn update_at(path: &Path, update: impl FnOnce(&mut Config)) -> Result<()> {
    let mut config = if path.exists() { Self::load_from(path)? } else { Self::default() };
    update(&mut config);
    config.save_to(path)
  }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub url: Option<String>,
  pub anon_key: Option<String>,
  pub page_size: Option<usize>,
  pub advance: Option<AdvanceTrigger>,
}

/// Effective settings: CLI/env, then config file, then built-in constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub url: String,
  pub anon_key: String,
  pub page_size: usize,
  pub advance: AdvanceTrigger,
  pub auto_fulfill: bool,
  pub theme_name: Option<String>,
}

impl Settings {
  pub fn resolve(cli: Overrides, file: Config) -> Result<Self> {
    let Some(url) = cli.url.or(file.backend.url).filter(|u| !u.trim().is_empty()) else {
      bail!("No backend URL configured. Pass --url, set EDITVAULTS_URL, or add `[backend] url` to config.toml");
    };
    let Some(anon_key) = cli.anon_key.or(file.backend.anon_key).filter(|k| !k.trim().is_empty()) else {
      bail!("No anon key configured. Pass --anon-key, set EDITVAULTS_ANON_KEY, or add `[backend] anon_key` to config.toml");
    };
    Ok(Self {
      url,
      anon_key,
      page_size: cli.page_size.or(file.page_size).unwrap_or(constants().page_size).max(1),
      advance: cli.advance.or(file.advance).unwrap_or_default(),
      auto_fulfill: file.auto_fulfill.unwrap_or(true),
      theme_name: file.theme_name,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn file_config() -> Config {
    Config {
      theme_name: Some("Sakura".into()),
      page_size: Some(12),
      advance: Some(AdvanceTrigger::Sentinel),
      auto_fulfill: Some(false),
      backend: BackendConfig { url: Some("https://file.supabase.co".into()), anon_key: Some("file-key".into()) },
    }
  }

  #[test]
  fn cli_beats_file_beats_constants() {
    let cli = Overrides { url: Some("https://cli.supabase.co".into()), page_size: Some(3), ..Default::default() };
    let settings = Settings::resolve(cli, file_config()).unwrap();
    assert_eq!(settings.url, "https://cli.supabase.co");
    assert_eq!(settings.anon_key, "file-key");
    assert_eq!(settings.page_size, 3);
    assert_eq!(settings.advance, AdvanceTrigger::Sentinel);
    assert!(!settings.auto_fulfill);

    let bare = Config { backend: file_config().backend, ..Default::default() };
    let settings = Settings::resolve(Overrides::default(), bare).unwrap();
    assert_eq!(settings.page_size, 5);
    assert_eq!(settings.advance, AdvanceTrigger::Button);
    assert!(settings.auto_fulfill);
  }

  #[test]
  fn missing_backend_is_an_error() {
    let err = Settings::resolve(Overrides::default(), Config::default()).unwrap_err();
    assert!(err.to_string().contains("--url"));
    let cli = Overrides { url: Some("https://x.supabase.co".into()), ..Default::default() };
    let err = Settings::resolve(cli, Config::default()).unwrap_err();
    assert!(err.to_string().contains("--anon-key"));
  }

  #[test]
  fn toml_round_trip_keeps_backend_table() {
    let text = toml::to_string(&file_config()).unwrap();
    assert!(text.contains("[backend]"));
    assert!(text.contains("advance = \"sentinel\""));
    let back: Config = toml::from_str(&text).unwrap();
    assert_eq!(back, file_config());
  }

  #[test]
  fn update_preserves_other_fields() {
    let path = std::env::temp_dir().join(format!("editvaults-config-{}.toml", std::process::id()));
    file_config().save_to(&path).unwrap();
    Config::update_at(&path, |c| c.theme_name = Some("Midnight".into())).unwrap();
    let back = Config::load_from(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(back.theme_name.as_deref(), Some("Midnight"));
    assert_eq!(back.backend.anon_key.as_deref(), Some("file-key"));
    assert_eq!(back.page_size, Some(12));
  }
}
