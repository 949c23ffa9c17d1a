use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::constants;

/// Environment variable that overrides `api_key` from `prefs.toml`.
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub api_key: Option<String>,
  pub viewer_url: Option<String>,
  pub share_base_url: Option<String>,
  pub theme_name: Option<String>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(path) = Self::path()
      && let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "yside") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }

  fn path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "yside").map(|dirs| dirs.config_dir().join("prefs.toml"))
  }

  /// API key from the environment, falling back to `prefs.toml`.
  pub fn api_key(&self) -> Option<String> {
    Self::pick_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.clone())
  }

  fn pick_api_key(env: Option<String>, file: Option<String>) -> Option<String> {
    env.filter(|k| !k.trim().is_empty()).or(file.filter(|k| !k.trim().is_empty())).map(|k| k.trim().to_string())
  }

  pub fn viewer_url(&self) -> &str {
    self.viewer_url.as_deref().unwrap_or(&constants().viewer_url)
  }

  pub fn share_base_url(&self) -> &str {
    self.share_base_url.as_deref().unwrap_or(&constants().share_base_url)
  }
}
