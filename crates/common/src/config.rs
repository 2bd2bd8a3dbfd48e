//! Client configuration.
//!
//! Configuration is loaded from environment variables. The provider token
//! is redacted in Debug output.

use crate::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default conferencing provider when `AV_PROVIDER` is unset.
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::Skylark;

/// Default classroom actor mailbox size.
pub const DEFAULT_MAILBOX_BUFFER: usize = 64;

/// Default local audio publish state after joining.
pub const DEFAULT_AUDIO_ON: bool = true;

/// Default local video publish state after joining.
pub const DEFAULT_VIDEO_ON: bool = true;

/// The conferencing back-end to run against.
///
/// All three satisfy the same audio/video contract; the choice only
/// affects which vendor transport carries the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Skylark Meetings (per-room meeting/attendee sessions).
    Skylark,
    /// Tessera Video (token-per-session rooms with passcodes).
    Tessera,
    /// Harbor RTC (session plus publisher-token rooms).
    Harbor,
}

impl ProviderKind {
    /// Lowercase name used in configuration and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Skylark => "skylark",
            ProviderKind::Tessera => "tessera",
            ProviderKind::Harbor => "harbor",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skylark" => Ok(ProviderKind::Skylark),
            "tessera" => Ok(ProviderKind::Tessera),
            "harbor" => Ok(ProviderKind::Harbor),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown provider `{other}` (expected skylark, tessera, or harbor)"
            ))),
        }
    }
}

/// Classroom client configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Conferencing provider to use (default: skylark).
    pub provider: ProviderKind,

    /// Classroom room name; the main session and all breakout rooms
    /// derive their names from it.
    pub room: String,

    /// API token for the provider's credential endpoint.
    /// Protected by `SecretString` to prevent accidental logging.
    pub provider_token: SecretString,

    /// Classroom actor mailbox size (default: 64).
    pub mailbox_buffer: usize,

    /// Whether the local user publishes audio right after joining
    /// (default: true).
    pub default_audio_on: bool,

    /// Whether the local user publishes video right after joining
    /// (default: true).
    pub default_video_on: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("room", &self.room)
            .field("provider_token", &"[REDACTED]")
            .field("mailbox_buffer", &self.mailbox_buffer)
            .field("default_audio_on", &self.default_audio_on)
            .field("default_video_on", &self.default_video_on)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let room = vars
            .get("CLASSROOM_ROOM")
            .ok_or_else(|| ConfigError::MissingEnvVar("CLASSROOM_ROOM".to_string()))?
            .clone();

        let provider_token = SecretString::from(
            vars.get("AV_PROVIDER_TOKEN")
                .ok_or_else(|| ConfigError::MissingEnvVar("AV_PROVIDER_TOKEN".to_string()))?
                .clone(),
        );

        let provider = match vars.get("AV_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => DEFAULT_PROVIDER,
        };

        let mailbox_buffer = match vars.get("AV_MAILBOX_BUFFER") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("AV_MAILBOX_BUFFER must be a number, got `{raw}`"))
            })?,
            None => DEFAULT_MAILBOX_BUFFER,
        };

        let default_audio_on = parse_bool(vars, "AV_DEFAULT_AUDIO_ON", DEFAULT_AUDIO_ON)?;
        let default_video_on = parse_bool(vars, "AV_DEFAULT_VIDEO_ON", DEFAULT_VIDEO_ON)?;

        Ok(Config {
            provider,
            room,
            provider_token,
            mailbox_buffer,
            default_audio_on,
            default_video_on,
        })
    }
}

fn parse_bool(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key).map(String::as_str) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(format!(
            "{key} must be true or false, got `{other}`"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("CLASSROOM_ROOM".to_string(), "class-47".to_string()),
            ("AV_PROVIDER_TOKEN".to_string(), "tok-12345".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.room, "class-47");
        assert_eq!(config.provider_token.expose_secret(), "tok-12345");
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.mailbox_buffer, DEFAULT_MAILBOX_BUFFER);
        assert_eq!(config.default_audio_on, DEFAULT_AUDIO_ON);
        assert_eq!(config.default_video_on, DEFAULT_VIDEO_ON);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("AV_PROVIDER".to_string(), "harbor".to_string());
        vars.insert("AV_MAILBOX_BUFFER".to_string(), "128".to_string());
        vars.insert("AV_DEFAULT_AUDIO_ON".to_string(), "false".to_string());
        vars.insert("AV_DEFAULT_VIDEO_ON".to_string(), "false".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.provider, ProviderKind::Harbor);
        assert_eq!(config.mailbox_buffer, 128);
        assert!(!config.default_audio_on);
        assert!(!config.default_video_on);
    }

    #[test]
    fn test_from_vars_missing_room() {
        let mut vars = base_vars();
        vars.remove("CLASSROOM_ROOM");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "CLASSROOM_ROOM"));
    }

    #[test]
    fn test_from_vars_missing_provider_token() {
        let mut vars = base_vars();
        vars.remove("AV_PROVIDER_TOKEN");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AV_PROVIDER_TOKEN"));
    }

    #[test]
    fn test_from_vars_unknown_provider() {
        let mut vars = base_vars();
        vars.insert("AV_PROVIDER".to_string(), "carrier-pigeon".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_provider_kind_round_trip() {
        for kind in [
            ProviderKind::Skylark,
            ProviderKind::Tessera,
            ProviderKind::Harbor,
        ] {
            let parsed: ProviderKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tok-12345"));
    }
}
