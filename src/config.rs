//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::Result;
use crate::error::Error;

/// Environment variables that override values from the config file
pub const ENV_API_BASE_URL: &str = "TASKBOARD_API_BASE_URL";
pub const ENV_APP_ORIGIN: &str = "TASKBOARD_APP_ORIGIN";
pub const ENV_GOOGLE_CLIENT_ID: &str = "TASKBOARD_GOOGLE_CLIENT_ID";
pub const ENV_GITHUB_CLIENT_ID: &str = "TASKBOARD_GITHUB_CLIENT_ID";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Taskboard REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Origin the provider redirects back to; both callback URLs live under it
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// OAuth client identifiers
    #[serde(default)]
    pub oauth: OAuthConfig,
}

/// OAuth client identifiers, one per provider.
///
/// An empty identifier is a valid configuration; signing in with that
/// provider is refused later with `MisconfiguredProvider`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub google_client_id: String,

    #[serde(default)]
    pub github_client_id: String,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_app_origin() -> String {
    "http://127.0.0.1:8085".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            app_origin: default_app_origin(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    /// Apply non-empty values from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_API_BASE_URL) {
            self.api_base_url = v;
        }
        if let Some(v) = get(ENV_APP_ORIGIN) {
            self.app_origin = v;
        }
        if let Some(v) = get(ENV_GOOGLE_CLIENT_ID) {
            self.oauth.google_client_id = v;
        }
        if let Some(v) = get(ENV_GITHUB_CLIENT_ID) {
            self.oauth.github_client_id = v;
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskboard")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file, falling back to defaults, then apply env overrides
pub fn load() -> Result<Config> {
    let path = config_path();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)?
    } else {
        tracing::debug!("No config at {:?}, using defaults", path);
        Config::default()
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Interactive first-time setup
pub fn onboard() -> Result<()> {
    use crate::ui;
    use inquire::Text;

    ui::print_header("Setup Wizard");
    println!("  I'll ask for the backend URL and your OAuth client IDs.\n");

    let current = load().unwrap_or_default();
    let prompt_err = |e: inquire::InquireError| Error::Config(format!("Prompt failed: {}", e));

    let api_base_url = Text::new("Taskboard API base URL:")
        .with_default(&current.api_base_url)
        .prompt()
        .map_err(prompt_err)?;

    let app_origin = Text::new("Callback origin (must match the provider registrations):")
        .with_default(&current.app_origin)
        .prompt()
        .map_err(prompt_err)?;

    let google_client_id = Text::new("Google client ID (leave empty to disable):")
        .with_default(&current.oauth.google_client_id)
        .prompt()
        .map_err(prompt_err)?;

    let github_client_id = Text::new("GitHub client ID (leave empty to disable):")
        .with_default(&current.oauth.github_client_id)
        .prompt()
        .map_err(prompt_err)?;

    let config = Config {
        api_base_url: api_base_url.trim().trim_end_matches('/').to_string(),
        app_origin: app_origin.trim().trim_end_matches('/').to_string(),
        oauth: OAuthConfig {
            google_client_id: google_client_id.trim().to_string(),
            github_client_id: github_client_id.trim().to_string(),
        },
    };

    ui::print_thinking("Saving configuration");
    save(&config)?;

    println!();
    ui::print_success("Setup complete!");
    ui::print_step(&format!("Redirect URIs to register: {}/auth/callback/google and {}/auth/callback/github",
        config.app_origin, config.app_origin));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.app_origin, "http://127.0.0.1:8085");
        assert!(config.oauth.google_client_id.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.app_origin, config.app_origin);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = serde_json::from_str(r#"{"oauth": {"github_client_id": "gh"}}"#).unwrap();
        assert_eq!(parsed.oauth.github_client_id, "gh");
        assert_eq!(parsed.oauth.google_client_id, "");
        assert_eq!(parsed.api_base_url, "http://localhost:8000");
    }

    #[test]
    fn test_env_overrides_skip_empty_values() {
        let env: HashMap<&str, &str> = [
            (ENV_GOOGLE_CLIENT_ID, "google-id"),
            (ENV_GITHUB_CLIENT_ID, "  "),
            (ENV_API_BASE_URL, "https://api.example.com"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.oauth.github_client_id = "from-file".to_string();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.oauth.google_client_id, "google-id");
        assert_eq!(config.oauth.github_client_id, "from-file");
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.app_origin, "http://127.0.0.1:8085");
    }
}
