//! Error types for spiko-deploy-core
//!
//! One `thiserror` hierarchy for every failure the deploy tooling can hit,
//! plus a load report that collects non-fatal config problems.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for spiko-deploy operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // IO Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    // ===================
    // Parse Errors
    // ===================
    #[error("Failed to parse TOML in {path}: {message}")]
    TomlParse {
        path: PathBuf,
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Malformed line {line_number} in {path}: {message}")]
    EnvFileParse {
        path: PathBuf,
        line_number: usize,
        message: String,
    },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid project ref '{value}': expected 20 lowercase letters or digits")]
    InvalidProjectRef { value: String },

    // ===================
    // Secret Errors
    // ===================
    #[error("Missing value for secret(s): {}", .keys.join(", "))]
    MissingSecrets { keys: Vec<String> },

    #[error("Invalid value for {key}: {reason}")]
    InvalidSecret { key: String, reason: String },

    // ===================
    // External CLI Errors
    // ===================
    #[error("'{program}' was not found on PATH")]
    CliNotFound { program: String },

    #[error("Failed to spawn '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed ({}): {command}", exit_status_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_status_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl CoreError {
    /// Process exit code the binary should use for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::CommandFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Actionable next step for the operator, when there is an obvious one
    pub fn suggestion(&self) -> Option<String> {
        match self {
            CoreError::CliNotFound { program } if program == "npm" || program == "node" => {
                Some("Install Node.js first: https://nodejs.org/".to_string())
            }
            CoreError::CliNotFound { program } => Some(format!(
                "Install it with 'npm install -g {}' or rerun with --install-cli",
                program
            )),
            CoreError::MissingSecrets { .. } => Some(
                "Export the variables or add them to the env file (see 'spiko-deploy secrets')"
                    .to_string(),
            ),
            CoreError::EnvFileParse {
                path, line_number, ..
            } => Some(format!(
                "Inspect line: sed -n '{}p' {}",
                line_number,
                path.display()
            )),
            CoreError::TomlParse { path, .. } => {
                Some(format!("Check TOML syntax in {}", path.display()))
            }
            CoreError::CommandFailed { stderr, .. } if !stderr.trim().is_empty() => {
                Some(format!("CLI output: {}", stderr.trim()))
            }
            _ => None,
        }
    }
}

/// Individual entry in a load report
#[derive(Debug, Clone)]
pub struct LoadError {
    pub source: String,
    pub message: String,
}

impl LoadError {
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Report of what happened while loading config layers
///
/// Optional layers that fail to load are recorded here instead of
/// aborting the command.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub errors: Vec<LoadError>,
    /// Config files that were read and merged, lowest priority first
    pub layers_loaded: Vec<PathBuf>,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.errors.push(LoadError::warning(source, message));
    }

    /// Returns true if any layer was skipped because of an error
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: LoadReport) {
        self.errors.extend(other.errors);
        self.layers_loaded.extend(other.layers_loaded);
    }
}
