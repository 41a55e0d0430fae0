//! Secret keys pushed to the edge function runtime

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The secrets the Spiko edge function reads from its environment.
///
/// Declaration order is provisioning order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecretKey {
    #[serde(rename = "OPENROUTER_API_KEY")]
    OpenRouterApiKey,
    #[serde(rename = "PROJECT_URL")]
    ProjectUrl,
    #[serde(rename = "TELEGRAM_BOT_TOKEN")]
    TelegramBotToken,
    #[serde(rename = "TELEGRAM_CHANNEL_USERNAME")]
    TelegramChannelUsername,
    #[serde(rename = "DEV_UZBEK_OVERRIDE")]
    DevUzbekOverride,
}

impl SecretKey {
    pub const ALL: [SecretKey; 5] = [
        SecretKey::OpenRouterApiKey,
        SecretKey::ProjectUrl,
        SecretKey::TelegramBotToken,
        SecretKey::TelegramChannelUsername,
        SecretKey::DevUzbekOverride,
    ];

    /// Environment variable name, as seen by the function
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKey::OpenRouterApiKey => "OPENROUTER_API_KEY",
            SecretKey::ProjectUrl => "PROJECT_URL",
            SecretKey::TelegramBotToken => "TELEGRAM_BOT_TOKEN",
            SecretKey::TelegramChannelUsername => "TELEGRAM_CHANNEL_USERNAME",
            SecretKey::DevUzbekOverride => "DEV_UZBEK_OVERRIDE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SecretKey::OpenRouterApiKey => "API key for the OpenRouter LLM gateway",
            SecretKey::ProjectUrl => "Base URL of the Supabase project",
            SecretKey::TelegramBotToken => "Telegram bot token for subscription checks",
            SecretKey::TelegramChannelUsername => "Telegram channel users must join",
            SecretKey::DevUzbekOverride => "Force the Uzbekistan free tier (true/false)",
        }
    }

    /// Credentials never get a config fallback and are always masked
    pub fn is_credential(&self) -> bool {
        matches!(
            self,
            SecretKey::OpenRouterApiKey | SecretKey::TelegramBotToken
        )
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecretKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown secret key: {}", s))
    }
}

/// A secret value that refuses to print itself.
///
/// `Debug` and `Display` show a masked form; use [`SecretValue::expose`]
/// at the single point where the raw value is handed to the CLI.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form for display: "sk-or-v1-f5fe...1203" → "sk-or-v••••1203"
    pub fn masked(&self) -> String {
        let key = &self.0;
        let len = key.chars().count();
        if len <= 10 {
            // Short value: keep at most the first 3 chars
            format!("{}••••", key.chars().take(3).collect::<String>())
        } else {
            let prefix = key.chars().take(7).collect::<String>();
            let suffix = key.chars().skip(len - 4).collect::<String>();
            format!("{}••••{}", prefix, suffix)
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", self.masked())
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretSource {
    /// Process environment variable
    Environment,
    /// Dotenv file
    EnvFile { path: PathBuf },
    /// Non-credential default from the deploy config
    Config,
    /// Computed from the project ref
    Derived,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Environment => f.write_str("environment"),
            SecretSource::EnvFile { path } => write!(f, "env file ({})", path.display()),
            SecretSource::Config => f.write_str("config"),
            SecretSource::Derived => f.write_str("derived"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSecret {
    pub key: SecretKey,
    pub value: SecretValue,
    pub source: SecretSource,
}

impl ResolvedSecret {
    /// Value as it may be shown to the operator
    pub fn display_value(&self) -> String {
        if self.key.is_credential() {
            self.value.masked()
        } else {
            self.value.expose().to_string()
        }
    }
}

/// All five secrets, complete and in [`SecretKey::ALL`] order.
///
/// Only constructed by the resolver, which guarantees completeness.
#[derive(Debug, Clone)]
pub struct SecretSet {
    entries: Vec<ResolvedSecret>,
}

impl SecretSet {
    pub(crate) fn from_ordered(entries: Vec<ResolvedSecret>) -> Self {
        debug_assert!(entries
            .iter()
            .map(|e| e.key)
            .eq(SecretKey::ALL.iter().copied()));
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedSecret> {
        self.entries.iter()
    }

    pub fn get(&self, key: SecretKey) -> Option<&ResolvedSecret> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order_and_names() {
        let names: Vec<_> = SecretKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "OPENROUTER_API_KEY",
                "PROJECT_URL",
                "TELEGRAM_BOT_TOKEN",
                "TELEGRAM_CHANNEL_USERNAME",
                "DEV_UZBEK_OVERRIDE",
            ]
        );
    }

    #[test]
    fn test_key_from_str() {
        assert_eq!(
            "TELEGRAM_BOT_TOKEN".parse::<SecretKey>().unwrap(),
            SecretKey::TelegramBotToken
        );
        assert!("telegram_bot_token".parse::<SecretKey>().is_err());
    }

    #[test]
    fn test_key_serde_uses_env_name() {
        let json = serde_json::to_string(&SecretKey::DevUzbekOverride).unwrap();
        assert_eq!(json, "\"DEV_UZBEK_OVERRIDE\"");
    }

    #[test]
    fn test_only_api_key_and_bot_token_are_credentials() {
        let credentials: Vec<_> = SecretKey::ALL
            .iter()
            .filter(|k| k.is_credential())
            .collect();
        assert_eq!(
            credentials,
            vec![&SecretKey::OpenRouterApiKey, &SecretKey::TelegramBotToken]
        );
    }

    #[test]
    fn test_value_masking() {
        let long = SecretValue::new("sk-or-v1-0123456789abcdef");
        assert_eq!(long.masked(), "sk-or-v••••cdef");
        assert_eq!(long.to_string(), "sk-or-v••••cdef");
        assert!(!format!("{:?}", long).contains("0123456789"));

        let short = SecretValue::new("true");
        assert_eq!(short.masked(), "tru••••");
    }

    #[test]
    fn test_masking_multibyte() {
        // Char-based slicing, must not panic on non-ASCII
        let value = SecretValue::new("ключ-секретный-123");
        assert!(value.masked().ends_with("-123"));
    }

    #[test]
    fn test_display_value_only_masks_credentials() {
        let url = ResolvedSecret {
            key: SecretKey::ProjectUrl,
            value: SecretValue::new("https://qxaflkmpeavucazxqzmu.supabase.co"),
            source: SecretSource::Derived,
        };
        assert_eq!(url.display_value(), "https://qxaflkmpeavucazxqzmu.supabase.co");

        let token = ResolvedSecret {
            key: SecretKey::TelegramBotToken,
            value: SecretValue::new("123456:ABCDEFGHIJKLMNOP"),
            source: SecretSource::Environment,
        };
        assert_eq!(token.display_value(), "123456:••••MNOP");
    }
}
