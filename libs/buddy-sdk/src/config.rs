//! Provider configuration.
//!
//! Three keys are recognized: `token`, `base_url` and `insecure`. Values are
//! layered with `figment`, lowest precedence first:
//!
//! 1. built-in defaults (`base_url = https://api.buddy.works`, `insecure = false`)
//! 2. environment: `BUDDY_TOKEN`, `BUDDY_BASE_URL`, `BUDDY_INSECURE`
//! 3. values supplied by the engine, when set

use buddy_http::HttpError;
use figment::Figment;
use figment::providers::{Env, Serialized};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public Buddy.Works API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.buddy.works";

/// Prefix of the environment variables read by [`ProviderConfig::load`]
pub const ENV_PREFIX: &str = "BUDDY_";

const KEYS: [&str; 3] = ["token", "base_url", "insecure"];

/// Configuration loading and client construction errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid provider configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("missing API token: set `token` or {ENV_PREFIX}TOKEN")]
    MissingToken,

    #[error("invalid client configuration: {0}")]
    Client(#[from] HttpError),
}

/// One configuration layer. Unset fields are skipped when merged, so a
/// layer only overrides what it actually carries.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

impl ProviderSettings {
    fn defaults() -> Self {
        Self {
            token: None,
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            insecure: Some(false),
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("insecure", &self.insecure)
            .finish()
    }
}

/// Resolved provider configuration
#[derive(Clone)]
pub struct ProviderConfig {
    pub token: SecretString,
    pub base_url: String,
    /// Skip TLS peer verification (self-signed on-premises installs)
    pub insecure: bool,
}

impl ProviderConfig {
    /// Configuration with the default endpoint and TLS verification on
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            base_url: DEFAULT_BASE_URL.to_owned(),
            insecure: false,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Layered figment: defaults, then `BUDDY_*` variables, then `overrides`
    #[must_use]
    pub fn figment(overrides: &ProviderSettings) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(ProviderSettings::defaults()))
            .merge(Env::prefixed(ENV_PREFIX).only(&KEYS))
            .merge(Serialized::defaults(overrides))
    }

    /// Resolve the configuration from the environment and `overrides`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingToken`] when no layer supplies a non-empty token,
    /// [`ConfigError::Figment`] when a value has the wrong type.
    pub fn load(overrides: &ProviderSettings) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(overrides))
    }

    /// Extract the configuration from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: ProviderSettings = figment.extract().map_err(Box::new)?;

        let token = settings
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            token: SecretString::from(token),
            base_url: settings
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            insecure: settings.insecure.unwrap_or(false),
        })
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("insecure", &self.insecure)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::Jail;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_apply_when_only_token_is_set() {
        Jail::expect_with(|_jail| {
            let config = ProviderConfig::load(&ProviderSettings {
                token: Some("t0ken".to_owned()),
                ..ProviderSettings::default()
            })
            .map_err(|e| e.to_string())?;

            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert!(!config.insecure);
            assert_eq!(config.token.expose_secret(), "t0ken");
            Ok(())
        });
    }

    #[test]
    fn test_environment_supplies_all_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("BUDDY_TOKEN", "from-env");
            jail.set_env("BUDDY_BASE_URL", "https://buddy.internal/api");
            jail.set_env("BUDDY_INSECURE", "true");

            let config =
                ProviderConfig::load(&ProviderSettings::default()).map_err(|e| e.to_string())?;

            assert_eq!(config.token.expose_secret(), "from-env");
            assert_eq!(config.base_url, "https://buddy.internal/api");
            assert!(config.insecure);
            Ok(())
        });
    }

    #[test]
    fn test_engine_values_win_over_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("BUDDY_TOKEN", "from-env");
            jail.set_env("BUDDY_BASE_URL", "https://env.example");

            let config = ProviderConfig::load(&ProviderSettings {
                token: Some("from-engine".to_owned()),
                base_url: None,
                insecure: Some(true),
            })
            .map_err(|e| e.to_string())?;

            assert_eq!(config.token.expose_secret(), "from-engine");
            // unset engine value falls through to the environment
            assert_eq!(config.base_url, "https://env.example");
            assert!(config.insecure);
            Ok(())
        });
    }

    #[test]
    fn test_unrelated_variables_are_ignored() {
        Jail::expect_with(|jail| {
            jail.set_env("BUDDY_TOKEN", "t");
            jail.set_env("BUDDY_WORKSPACE", "acme");

            let config =
                ProviderConfig::load(&ProviderSettings::default()).map_err(|e| e.to_string())?;
            assert_eq!(config.token.expose_secret(), "t");
            Ok(())
        });
    }

    #[test]
    fn test_missing_token_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("BUDDY_TOKEN", "   ");
            let err = ProviderConfig::load(&ProviderSettings::default()).unwrap_err();
            assert!(matches!(err, ConfigError::MissingToken));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_flag_is_reported() {
        Jail::expect_with(|jail| {
            jail.set_env("BUDDY_TOKEN", "t");
            jail.set_env("BUDDY_INSECURE", "sometimes");
            let err = ProviderConfig::load(&ProviderSettings::default()).unwrap_err();
            assert!(matches!(err, ConfigError::Figment(_)));
            Ok(())
        });
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::new("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));

        let settings = ProviderSettings {
            token: Some("hunter2".to_owned()),
            ..ProviderSettings::default()
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
