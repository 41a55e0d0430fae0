//! Secret resolution from out-of-band sources
//!
//! Lookup order per key: process environment, dotenv file, then a config
//! default for non-credentials. Credentials have no default.

use crate::error::CoreError;
use crate::models::{DeployConfig, ResolvedSecret, SecretKey, SecretSet, SecretSource, SecretValue};
use crate::parsers::EnvFile;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

static BOT_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+:[A-Za-z0-9_-]+$").expect("valid bot token regex"));

pub struct SecretResolver<'a> {
    config: &'a DeployConfig,
    env_file: Option<&'a EnvFile>,
    process_env: HashMap<String, String>,
}

impl<'a> SecretResolver<'a> {
    pub fn new(config: &'a DeployConfig) -> Self {
        Self {
            config,
            env_file: None,
            process_env: HashMap::new(),
        }
    }

    pub fn with_env_file(mut self, env_file: Option<&'a EnvFile>) -> Self {
        self.env_file = env_file;
        self
    }

    /// Snapshot of the process environment (only the five keys are read)
    pub fn with_process_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.process_env = vars
            .into_iter()
            .filter(|(k, _)| k.parse::<SecretKey>().is_ok())
            .collect();
        self
    }

    /// Resolve and validate all five secrets.
    ///
    /// Every missing key is reported in a single error, even when another
    /// key also has an invalid value. Invalid values are reported only once
    /// nothing is missing.
    pub fn resolve(&self) -> Result<SecretSet, CoreError> {
        let mut resolved = Vec::with_capacity(SecretKey::ALL.len());
        let mut missing = Vec::new();
        let mut first_invalid = None;

        for key in SecretKey::ALL {
            let Some((raw, source)) = self.lookup(key) else {
                missing.push(key.as_str().to_string());
                continue;
            };

            match validate(key, &raw) {
                Ok(value) => {
                    debug!(key = %key, source = %source, "Resolved secret");
                    if key == SecretKey::ProjectUrl {
                        self.check_project_url(&value, &source);
                    }
                    resolved.push(ResolvedSecret {
                        key,
                        value: SecretValue::new(value),
                        source,
                    });
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "Rejected secret value");
                    first_invalid.get_or_insert(e);
                }
            }
        }

        if !missing.is_empty() {
            return Err(CoreError::MissingSecrets { keys: missing });
        }
        if let Some(e) = first_invalid {
            return Err(e);
        }

        Ok(SecretSet::from_ordered(resolved))
    }

    /// An overridden PROJECT_URL pointing elsewhere than the linked project
    fn check_project_url(&self, value: &str, source: &SecretSource) {
        let expected = self.config.project_url();
        if value != expected {
            warn!(
                %source,
                resolved = value,
                expected = %expected,
                project_ref = %self.config.project_ref,
                "PROJECT_URL does not match the linked project"
            );
        }
    }

    fn lookup(&self, key: SecretKey) -> Option<(String, SecretSource)> {
        if let Some(value) = self.process_env.get(key.as_str()) {
            return Some((value.clone(), SecretSource::Environment));
        }

        if let Some(env) = self.env_file {
            if let Some(value) = env.get(key.as_str()) {
                return Some((
                    value.to_string(),
                    SecretSource::EnvFile {
                        path: env.path.clone(),
                    },
                ));
            }
        }

        match key {
            SecretKey::ProjectUrl => Some((self.config.project_url(), SecretSource::Derived)),
            SecretKey::TelegramChannelUsername => {
                Some((self.config.telegram_channel.clone(), SecretSource::Config))
            }
            SecretKey::DevUzbekOverride => Some((
                self.config.dev_uzbek_override.to_string(),
                SecretSource::Config,
            )),
            SecretKey::OpenRouterApiKey | SecretKey::TelegramBotToken => None,
        }
    }
}

/// Validate and normalise a raw value for `key`
pub fn validate(key: SecretKey, raw: &str) -> Result<String, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidSecret {
        key: key.as_str().to_string(),
        reason: reason.to_string(),
    };

    let value = raw.trim();
    if value.is_empty() {
        return Err(invalid("value is empty"));
    }
    if value.contains(['\n', '\r', '\0']) {
        return Err(invalid("value contains a line break or NUL byte"));
    }

    match key {
        SecretKey::ProjectUrl => {
            if !value.starts_with("https://") || value.len() == "https://".len() {
                return Err(invalid("must be an https:// URL"));
            }
            Ok(value.trim_end_matches('/').to_string())
        }
        SecretKey::TelegramBotToken => {
            if BOT_TOKEN_RE.is_match(value) {
                Ok(value.to_string())
            } else {
                Err(invalid("expected <bot id>:<token>"))
            }
        }
        SecretKey::DevUzbekOverride => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok("true".to_string()),
            "false" | "0" | "no" | "off" => Ok("false".to_string()),
            _ => Err(invalid("expected true or false")),
        },
        SecretKey::OpenRouterApiKey | SecretKey::TelegramChannelUsername => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config() -> DeployConfig {
        DeployConfig::defaults(Path::new("/srv/spiko")).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_credentials_from_env_rest_from_defaults() {
        let config = config();
        let set = SecretResolver::new(&config)
            .with_process_env(env(&[
                ("OPENROUTER_API_KEY", "sk-or-v1-test"),
                ("TELEGRAM_BOT_TOKEN", "7262255753:AAtest_token-1"),
                ("HOME", "/root"),
            ]))
            .resolve()
            .unwrap();

        assert_eq!(set.len(), 5);
        let keys: Vec<_> = set.iter().map(|s| s.key).collect();
        assert_eq!(keys, SecretKey::ALL.to_vec());

        let url = set.get(SecretKey::ProjectUrl).unwrap();
        assert_eq!(url.value.expose(), "https://qxaflkmpeavucazxqzmu.supabase.co");
        assert_eq!(url.source, SecretSource::Derived);

        let flag = set.get(SecretKey::DevUzbekOverride).unwrap();
        assert_eq!(flag.value.expose(), "true");
        assert_eq!(flag.source, SecretSource::Config);

        let channel = set.get(SecretKey::TelegramChannelUsername).unwrap();
        assert_eq!(channel.value.expose(), "https://t.me/SpikoAI");
    }

    #[test]
    fn test_env_beats_env_file_beats_config() {
        let config = config();
        let file = EnvFile::parse_str(
            "OPENROUTER_API_KEY=from-file\nTELEGRAM_BOT_TOKEN=1:file\nDEV_UZBEK_OVERRIDE=no\n",
            Path::new("/srv/spiko/.env"),
        )
        .unwrap();

        let set = SecretResolver::new(&config)
            .with_env_file(Some(&file))
            .with_process_env(env(&[("OPENROUTER_API_KEY", "from-env")]))
            .resolve()
            .unwrap();

        let api = set.get(SecretKey::OpenRouterApiKey).unwrap();
        assert_eq!(api.value.expose(), "from-env");
        assert_eq!(api.source, SecretSource::Environment);

        let token = set.get(SecretKey::TelegramBotToken).unwrap();
        assert_eq!(token.value.expose(), "1:file");
        assert!(matches!(token.source, SecretSource::EnvFile { .. }));

        let flag = set.get(SecretKey::DevUzbekOverride).unwrap();
        assert_eq!(flag.value.expose(), "false");
    }

    #[test]
    fn test_all_missing_credentials_reported_together() {
        let config = config();
        let err = SecretResolver::new(&config).resolve().unwrap_err();
        match err {
            CoreError::MissingSecrets { keys } => {
                assert_eq!(keys, vec!["OPENROUTER_API_KEY", "TELEGRAM_BOT_TOKEN"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_rules() {
        assert_eq!(
            validate(SecretKey::ProjectUrl, "https://x.supabase.co/").unwrap(),
            "https://x.supabase.co"
        );
        assert!(validate(SecretKey::ProjectUrl, "http://x.supabase.co").is_err());
        assert!(validate(SecretKey::ProjectUrl, "https://").is_err());

        assert!(validate(SecretKey::TelegramBotToken, "123:abc_DEF-9").is_ok());
        assert!(validate(SecretKey::TelegramBotToken, "abc").is_err());

        assert_eq!(validate(SecretKey::DevUzbekOverride, "TRUE").unwrap(), "true");
        assert_eq!(validate(SecretKey::DevUzbekOverride, "off").unwrap(), "false");
        assert!(validate(SecretKey::DevUzbekOverride, "maybe").is_err());

        assert!(validate(SecretKey::OpenRouterApiKey, "   ").is_err());
        assert!(validate(SecretKey::OpenRouterApiKey, "a\nb").is_err());
        assert_eq!(
            validate(SecretKey::OpenRouterApiKey, "  sk-or-v1-x  ").unwrap(),
            "sk-or-v1-x"
        );
    }

    #[test]
    fn test_invalid_value_names_the_key() {
        let config = config();
        let err = SecretResolver::new(&config)
            .with_process_env(env(&[
                ("OPENROUTER_API_KEY", "sk"),
                ("TELEGRAM_BOT_TOKEN", "not-a-token"),
            ]))
            .resolve()
            .unwrap_err();

        match err {
            CoreError::InvalidSecret { key, .. } => assert_eq!(key, "TELEGRAM_BOT_TOKEN"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_reported_over_invalid_value() {
        let config = config();
        let err = SecretResolver::new(&config)
            .with_process_env(env(&[("TELEGRAM_BOT_TOKEN", "bad")]))
            .resolve()
            .unwrap_err();

        match err {
            CoreError::MissingSecrets { keys } => assert_eq!(keys, vec!["OPENROUTER_API_KEY"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_project_url_override_is_kept() {
        // A mismatching URL is only warned about, never rewritten
        let config = config();
        let set = SecretResolver::new(&config)
            .with_process_env(env(&[
                ("OPENROUTER_API_KEY", "sk-or-v1-test"),
                ("TELEGRAM_BOT_TOKEN", "1:abc"),
                ("PROJECT_URL", "https://otherprojectrefxxxx.supabase.co/"),
            ]))
            .resolve()
            .unwrap();

        let url = set.get(SecretKey::ProjectUrl).unwrap();
        assert_eq!(url.value.expose(), "https://otherprojectrefxxxx.supabase.co");
        assert_eq!(url.source, SecretSource::Environment);
    }
}
