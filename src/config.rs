use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::api::client::DEFAULT_REMINDER_TEMPLATE;
use crate::offline::DEFAULT_MANIFEST;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
  #[serde(default)]
  pub reminders: RemindersConfig,
  #[serde(default)]
  pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Web app endpoint; every call appends `?action=<operation>`
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
  /// Origin that relative manifest entries are resolved against
  pub origin: Option<String>,
  /// Generation name; bump it whenever the manifest changes
  #[serde(default = "default_generation")]
  pub generation: String,
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      origin: None,
      generation: default_generation(),
      manifest: default_manifest(),
    }
  }
}

fn default_generation() -> String {
  "teaching-record-v1".to_string()
}

fn default_manifest() -> Vec<String> {
  DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemindersConfig {
  /// Message text; `{classroom}` and `{level}` are substituted
  #[serde(default = "default_template")]
  pub template: String,
}

impl Default for RemindersConfig {
  fn default() -> Self {
    Self {
      template: default_template(),
    }
  }
}

fn default_template() -> String {
  DEFAULT_REMINDER_TEMPLATE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Hours after login before a session expires
  #[serde(default = "default_max_age_hours")]
  pub max_age_hours: i64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      max_age_hours: default_max_age_hours(),
    }
  }
}

fn default_max_age_hours() -> i64 {
  8
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./trec.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/trec/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/trec/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("trec.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("trec").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Backend endpoint.
  ///
  /// TREC_API_URL takes precedence over the config file.
  pub fn api_url(&self) -> Result<Url> {
    let raw = std::env::var("TREC_API_URL").unwrap_or_else(|_| self.api.url.clone());
    Url::parse(&raw).map_err(|e| eyre!("Invalid API URL '{}': {}", raw, e))
  }

  /// Origin for relative manifest entries; defaults to the API URL's origin
  pub fn offline_origin(&self) -> Result<Url> {
    match &self.offline.origin {
      Some(origin) => {
        Url::parse(origin).map_err(|e| eyre!("Invalid offline origin '{}': {}", origin, e))
      }
      None => {
        let api = self.api_url()?;
        Url::parse(&api.origin().ascii_serialization())
          .map_err(|e| eyre!("API URL has no usable origin: {}", e))
      }
    }
  }
}

/// Directory for the database and log files
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("trec"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: https://script.example.com/exec\n").unwrap();
    assert_eq!(config.offline.generation, "teaching-record-v1");
    assert_eq!(config.offline.manifest.len(), DEFAULT_MANIFEST.len());
    assert_eq!(config.session.max_age_hours, 8);
    assert!(config.reminders.template.contains("{classroom}"));
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  url: https://script.example.com/exec
offline:
  origin: https://school.example/
  generation: teaching-record-v7
  manifest: ["/", "/index.html"]
reminders:
  template: "{classroom} please report"
session:
  max_age_hours: 2
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.offline.generation, "teaching-record-v7");
    assert_eq!(config.offline.manifest, vec!["/", "/index.html"]);
    assert_eq!(config.reminders.template, "{classroom} please report");
    assert_eq!(config.session.max_age_hours, 2);
    assert_eq!(
      config.offline_origin().unwrap().as_str(),
      "https://school.example/"
    );
  }

  #[test]
  fn test_missing_api_section_is_an_error() {
    assert!(Config::parse("offline:\n  generation: v2\n").is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "api:\n  url: https://script.example.com/exec").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.api.url, "https://script.example.com/exec");
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/trec.yaml"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
  }
}
