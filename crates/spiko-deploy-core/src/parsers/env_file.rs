//! Dotenv file parser
//!
//! Supports the subset operators actually write: comments, `export`
//! prefixes, single/double quotes and inline comments. No interpolation,
//! no multi-line values.

use crate::error::CoreError;
use crate::models::DeployConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid env key regex"));

/// Parsed dotenv file, entries in file order
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    pub path: PathBuf,
    entries: Vec<(String, String)>,
}

impl EnvFile {
    /// Read and parse a dotenv file
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
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

        let env = Self::parse_str(&content, path)?;
        debug!(?path, entries = env.entries.len(), "Loaded env file");
        Ok(env)
    }

    /// Like [`EnvFile::load`] but a missing file yields `None`
    pub async fn load_optional(path: &Path) -> Result<Option<Self>, CoreError> {
        match Self::load(path).await {
            Ok(env) => Ok(Some(env)),
            Err(CoreError::FileNotFound { .. }) => {
                debug!(?path, "Env file not found (optional)");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Env file for a command run.
    ///
    /// A path given on the command line, or set as `env_file` in config,
    /// must exist. The default `.env` in the project directory may be absent.
    pub async fn load_for(
        config: &DeployConfig,
        override_path: Option<&Path>,
    ) -> Result<Option<Self>, CoreError> {
        match override_path {
            Some(path) => Self::load(path).await.map(Some),
            None if config.env_file_explicit => Self::load(&config.env_file).await.map(Some),
            None => Self::load_optional(&config.env_file).await,
        }
    }

    pub fn parse_str(content: &str, path: &Path) -> Result<Self, CoreError> {
        let mut entries: Vec<(String, String)> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = parse_line(line).map_err(|message| CoreError::EnvFileParse {
                path: path.to_path_buf(),
                line_number: idx + 1,
                message,
            })?;

            // Later definitions override earlier ones
            if let Some(existing) = entries.iter_mut().find(|(k, _)| *k == key) {
                existing.1 = value;
            } else {
                entries.push((key, value));
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> Result<(String, String), String> {
    let line = line
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(line);

    let (key, rest) = line
        .split_once('=')
        .ok_or_else(|| "expected KEY=VALUE".to_string())?;

    let key = key.trim();
    if !KEY_RE.is_match(key) {
        return Err(format!("invalid key '{}'", key));
    }

    let rest = rest.trim_start();
    let value = if let Some(body) = rest.strip_prefix('"') {
        parse_double_quoted(body)?
    } else if let Some(body) = rest.strip_prefix('\'') {
        parse_single_quoted(body)?
    } else {
        strip_inline_comment(rest).trim_end().to_string()
    };

    Ok((key.to_string(), value))
}

fn parse_double_quoted(body: &str) -> Result<String, String> {
    let mut value = String::new();
    let mut chars = body.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            '"' => {
                check_trailing(&body[idx + 1..])?;
                return Ok(value);
            }
            _ => value.push(c),
        }
    }

    Err("unterminated double quote".to_string())
}

fn parse_single_quoted(body: &str) -> Result<String, String> {
    match body.find('\'') {
        Some(end) => {
            check_trailing(&body[end + 1..])?;
            Ok(body[..end].to_string())
        }
        None => Err("unterminated single quote".to_string()),
    }
}

fn check_trailing(rest: &str) -> Result<(), String> {
    let rest = rest.trim();
    if rest.is_empty() || rest.starts_with('#') {
        Ok(())
    } else {
        Err(format!("unexpected characters after closing quote: '{}'", rest))
    }
}

/// `value # comment` → `value`; a `#` glued to the value is kept
fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &value[..i];
        }
    }
    value
}
