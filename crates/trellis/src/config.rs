// File: src/config.rs
// Purpose: Configuration parsing from trellis.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use trellis_router::RouterOptions;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Application metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Prefix for every URL the router generates or recognizes
    #[serde(default = "default_root_url")]
    pub root_url: String,
}

/// How URLs are reflected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Plain paths (`/posts/1`)
    History,
    /// Fragment URLs (`#/posts/1`)
    Hash,
    /// URLs are never shown; navigation happens by route name
    #[default]
    None,
}

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    /// Generate and look up loading/error substates (default: true)
    #[serde(default = "default_true")]
    pub enable_loading_substates: bool,

    /// Log every route the router settles in at info level (default: false)
    #[serde(default = "default_false")]
    pub log_transitions: bool,

    #[serde(default)]
    pub location: Location,
}

/// Template discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplatesConfig {
    /// Directory searched recursively for templates (default: "templates")
    #[serde(default = "default_templates_dir")]
    pub dir: String,

    /// Template file extension, without the dot (default: "hbs")
    #[serde(default = "default_extension")]
    pub extension: String,
}

// Default values
fn default_name() -> String {
    "trellis-app".to_string()
}

fn default_root_url() -> String {
    "/".to_string()
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_extension() -> String {
    "hbs".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            root_url: default_root_url(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enable_loading_substates: true,
            log_transitions: false,
            location: Location::default(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
            extension: default_extension(),
        }
    }
}

impl Config {
    /// Load configuration from trellis.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./trellis.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("trellis.toml")
    }

    /// Options handed to the router
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            root_url: self.application.root_url.clone(),
            log_transitions: self.router.log_transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.application.name, "trellis-app");
        assert_eq!(config.application.root_url, "/");
        assert!(config.router.enable_loading_substates);
        assert!(!config.router.log_transitions);
        assert_eq!(config.router.location, Location::None);
        assert_eq!(config.templates.extension, "hbs");
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [router]
            enable_loading_substates = false
            location = "hash"

            [templates]
            dir = "app/templates"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.router.enable_loading_substates);
        assert_eq!(config.router.location, Location::Hash);
        assert_eq!(config.templates.dir, "app/templates");
        assert_eq!(config.templates.extension, "hbs");
        assert_eq!(config.application.name, "trellis-app");
    }

    #[test]
    fn test_load_missing_and_empty_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trellis.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        fs::write(&path, "   \n").unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trellis.toml");
        fs::write(&path, "[router\nlog_transitions = true").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_router_options() {
        let toml = r#"
            [application]
            root_url = "/app"

            [router]
            log_transitions = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let options = config.router_options();
        assert_eq!(options.root_url, "/app");
        assert!(options.log_transitions);
    }
}
