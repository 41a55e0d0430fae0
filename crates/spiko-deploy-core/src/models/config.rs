//! Deploy configuration models

use crate::error::CoreError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT_REF: &str = "qxaflkmpeavucazxqzmu";
pub const DEFAULT_FUNCTION_NAME: &str = "spiko-api";
pub const DEFAULT_CLI: &str = "supabase";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_TELEGRAM_CHANNEL: &str = "https://t.me/SpikoAI";

static PROJECT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{20}$").expect("valid project ref regex"));

static FUNCTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid function name regex"));

/// Supabase project reference (the subdomain of the project URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProjectRef(String);

impl ProjectRef {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let value = value.trim();
        if PROJECT_REF_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(CoreError::InvalidProjectRef {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `https://<ref>.supabase.co`
    pub fn project_url(&self) -> String {
        format!("https://{}.supabase.co", self.0)
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One config file as written on disk; every field is optional so layers
/// can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub project_ref: Option<String>,

    #[serde(default)]
    pub function_name: Option<String>,

    /// Supabase CLI executable
    #[serde(default)]
    pub cli: Option<String>,

    /// Dotenv file, relative paths resolve against the project dir
    #[serde(default)]
    pub env_file: Option<PathBuf>,

    #[serde(default)]
    pub dev_uzbek_override: Option<bool>,

    #[serde(default)]
    pub telegram_channel: Option<String>,
}

impl ConfigLayer {
    /// Overlay `other` on top of `self` (other wins field by field)
    pub fn overlay(mut self, other: ConfigLayer) -> ConfigLayer {
        if other.project_ref.is_some() {
            self.project_ref = other.project_ref;
        }
        if other.function_name.is_some() {
            self.function_name = other.function_name;
        }
        if other.cli.is_some() {
            self.cli = other.cli;
        }
        if other.env_file.is_some() {
            self.env_file = other.env_file;
        }
        if other.dev_uzbek_override.is_some() {
            self.dev_uzbek_override = other.dev_uzbek_override;
        }
        if other.telegram_channel.is_some() {
            self.telegram_channel = other.telegram_channel;
        }
        self
    }
}

/// Fully resolved deploy configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployConfig {
    pub project_ref: ProjectRef,
    pub function_name: String,
    pub cli: String,
    /// Absolute, or relative to the working directory
    pub env_file: PathBuf,
    /// True when the env file path came from config rather than the default
    pub env_file_explicit: bool,
    pub dev_uzbek_override: bool,
    pub telegram_channel: String,
}

impl DeployConfig {
    /// Build the final config from merged layers, filling defaults
    pub fn from_layer(layer: ConfigLayer, project_dir: &Path) -> Result<Self, CoreError> {
        let project_ref =
            ProjectRef::parse(layer.project_ref.as_deref().unwrap_or(DEFAULT_PROJECT_REF))?;

        let function_name = layer
            .function_name
            .unwrap_or_else(|| DEFAULT_FUNCTION_NAME.to_string());
        if !FUNCTION_NAME_RE.is_match(&function_name) {
            return Err(CoreError::InvalidConfig {
                message: format!("function_name '{}' is not a valid slug", function_name),
            });
        }

        let cli = layer.cli.unwrap_or_else(|| DEFAULT_CLI.to_string());
        if cli.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "cli must not be empty".to_string(),
            });
        }

        let env_file_explicit = layer.env_file.is_some();
        let env_file = layer
            .env_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
        let env_file = if env_file.is_absolute() {
            env_file
        } else {
            project_dir.join(env_file)
        };

        Ok(Self {
            project_ref,
            function_name,
            cli,
            env_file,
            env_file_explicit,
            dev_uzbek_override: layer.dev_uzbek_override.unwrap_or(true),
            telegram_channel: layer
                .telegram_channel
                .unwrap_or_else(|| DEFAULT_TELEGRAM_CHANNEL.to_string()),
        })
    }

    /// Defaults with no config files at all
    pub fn defaults(project_dir: &Path) -> Result<Self, CoreError> {
        Self::from_layer(ConfigLayer::default(), project_dir)
    }

    pub fn project_url(&self) -> String {
        self.project_ref.project_url()
    }

    /// `<project-url>/functions/v1/<function>`
    pub fn function_base_url(&self) -> String {
        format!("{}/functions/v1/{}", self.project_url(), self.function_name)
    }

    /// Where the API lives once deployed
    pub fn api_base_url(&self) -> String {
        format!("{}/api/", self.function_base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_ref_parse() {
        let r = ProjectRef::parse("qxaflkmpeavucazxqzmu").unwrap();
        assert_eq!(r.project_url(), "https://qxaflkmpeavucazxqzmu.supabase.co");

        assert!(ProjectRef::parse("short").is_err());
        assert!(ProjectRef::parse("QXAFLKMPEAVUCAZXQZMU").is_err());
        assert!(ProjectRef::parse("qxaflkmpeavucazxqzm.").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = DeployConfig::defaults(Path::new("/srv/spiko")).unwrap();
        assert_eq!(config.project_ref.as_str(), DEFAULT_PROJECT_REF);
        assert_eq!(config.function_name, "spiko-api");
        assert_eq!(config.cli, "supabase");
        assert_eq!(config.env_file, PathBuf::from("/srv/spiko/.env"));
        assert!(!config.env_file_explicit);
        assert!(config.dev_uzbek_override);
        assert_eq!(config.telegram_channel, "https://t.me/SpikoAI");
    }

    #[test]
    fn test_urls() {
        let config = DeployConfig::defaults(Path::new(".")).unwrap();
        assert_eq!(
            config.function_base_url(),
            "https://qxaflkmpeavucazxqzmu.supabase.co/functions/v1/spiko-api"
        );
        assert_eq!(
            config.api_base_url(),
            "https://qxaflkmpeavucazxqzmu.supabase.co/functions/v1/spiko-api/api/"
        );
    }

    #[test]
    fn test_overlay_later_layer_wins() {
        let global = ConfigLayer {
            project_ref: Some("aaaaaaaaaaaaaaaaaaaa".into()),
            cli: Some("/opt/supabase".into()),
            ..Default::default()
        };
        let project = ConfigLayer {
            project_ref: Some("bbbbbbbbbbbbbbbbbbbb".into()),
            dev_uzbek_override: Some(false),
            ..Default::default()
        };

        let merged = global.overlay(project);
        assert_eq!(merged.project_ref.as_deref(), Some("bbbbbbbbbbbbbbbbbbbb"));
        assert_eq!(merged.cli.as_deref(), Some("/opt/supabase"));
        assert_eq!(merged.dev_uzbek_override, Some(false));
    }

    #[test]
    fn test_absolute_env_file_kept() {
        let layer = ConfigLayer {
            env_file: Some(PathBuf::from("/run/secrets/spiko.env")),
            ..Default::default()
        };
        let config = DeployConfig::from_layer(layer, Path::new("/srv/spiko")).unwrap();
        assert_eq!(config.env_file, PathBuf::from("/run/secrets/spiko.env"));
        assert!(config.env_file_explicit);
    }

    #[test]
    fn test_invalid_function_name() {
        let layer = ConfigLayer {
            function_name: Some("spiko api".into()),
            ..Default::default()
        };
        let err = DeployConfig::from_layer(layer, Path::new(".")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<ConfigLayer, _> = toml::from_str("projectRef = \"x\"");
        assert!(result.is_err());
    }
}
