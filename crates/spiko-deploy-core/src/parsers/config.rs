//! Deploy config parser with layered merge

use crate::error::{CoreError, LoadReport};
use crate::models::{ConfigLayer, DeployConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up in the project directory
pub const PROJECT_CONFIG_FILE: &str = "spiko-deploy.toml";

/// Parser for spiko-deploy TOML config files
pub struct ConfigParser {
    global_dir: Option<PathBuf>,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParser {
    /// Uses `<config_dir>/spiko-deploy/` for the global layer
    pub fn new() -> Self {
        Self {
            global_dir: dirs::config_dir().map(|d| d.join("spiko-deploy")),
        }
    }

    /// Override (or disable with `None`) the global config directory
    pub fn with_global_dir(global_dir: Option<PathBuf>) -> Self {
        Self { global_dir }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|d| d.join("config.toml"))
    }

    /// Parse a single config file
    pub async fn parse(&self, path: &Path) -> Result<ConfigLayer, CoreError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CoreError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        toml::from_str(&content).map_err(|e| CoreError::TomlParse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
            source: e,
        })
    }

    /// Parse an optional layer; problems become report warnings
    pub async fn parse_graceful(
        &self,
        path: &Path,
        source_name: &str,
        report: &mut LoadReport,
    ) -> Option<ConfigLayer> {
        match self.parse(path).await {
            Ok(layer) => {
                debug!(?path, "Loaded config layer");
                report.layers_loaded.push(path.to_path_buf());
                Some(layer)
            }
            Err(CoreError::FileNotFound { .. }) => {
                debug!(?path, "Config file not found (optional)");
                None
            }
            Err(e) => {
                warn!(?path, error = %e, "Ignoring unreadable config layer");
                report.add_warning(source_name, e.to_string());
                None
            }
        }
    }

    /// Load and merge all layers
    ///
    /// Priority: explicit > project > global. An explicit file must exist
    /// and parse; the other two are optional.
    pub async fn load_merged(
        &self,
        project_dir: &Path,
        explicit: Option<&Path>,
        report: &mut LoadReport,
    ) -> Result<DeployConfig, CoreError> {
        let mut merged = ConfigLayer::default();

        if let Some(global_path) = self.global_config_path() {
            if let Some(layer) = self
                .parse_graceful(&global_path, "config.global", report)
                .await
            {
                merged = merged.overlay(layer);
            }
        }

        let project_path = project_dir.join(PROJECT_CONFIG_FILE);
        if let Some(layer) = self
            .parse_graceful(&project_path, "config.project", report)
            .await
        {
            merged = merged.overlay(layer);
        }

        if let Some(path) = explicit {
            let layer = self.parse(path).await?;
            debug!(?path, "Loaded explicit config");
            report.layers_loaded.push(path.to_path_buf());
            merged = merged.overlay(layer);
        }

        DeployConfig::from_layer(merged, project_dir)
    }
}
