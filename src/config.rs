//! Configuration loading for vsbot.
//!
//! Everything comes from the environment. Missing credentials are fatal:
//! `main` exits with status 1 when [`Settings::from_env`] reports
//! [`Error::MissingCredentials`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ENV_USER: &str = "VSBOT_USER";
pub const ENV_PASSWORD: &str = "VSBOT_PASSWORD";
pub const ENV_PROVIDER: &str = "VSBOT_PROVIDER";
pub const ENV_REGION: &str = "VSBOT_REGION";
pub const ENV_AUTH_URL: &str = "VSBOT_AUTH_URL";
pub const ENV_AUTH_VERSION: &str = "VSBOT_AUTH_VERSION";
pub const ENV_DOMAIN_NAME: &str = "VSBOT_DOMAIN_NAME";
pub const ENV_PROJECT: &str = "VSBOT_PROJECT";
pub const ENV_NAME: &str = "VSBOT_NAME";
pub const ENV_LOCALE: &str = "VSBOT_LOCALE";

/// Compute provider backends.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenStack,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openstack" => Ok(ProviderKind::OpenStack),
            other => Err(Error::Config(format!("unsupported provider '{}'", other))),
        }
    }
}

/// Identity (Keystone) protocol version.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AuthVersion {
    #[serde(rename = "v2.0")]
    V2,
    #[default]
    #[serde(rename = "v3")]
    V3,
}

impl FromStr for AuthVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "v3" | "3" => Ok(AuthVersion::V3),
            "v2" | "v2.0" | "2" => Ok(AuthVersion::V2),
            other => Err(Error::Config(format!("unsupported auth version '{}'", other))),
        }
    }
}

/// vsbot settings.
#[derive(Serialize, Deserialize, Clone)]
pub struct Settings {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub provider: ProviderKind,
    pub region: Option<String>,
    pub auth_url: Option<String>,
    #[serde(default)]
    pub auth_version: AuthVersion,
    pub domain_name: Option<String>,
    pub project: Option<String>,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_bot_name() -> String {
    "vsbot".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("auth_url", &self.auth_url)
            .field("auth_version", &self.auth_version)
            .field("domain_name", &self.domain_name)
            .field("project", &self.project)
            .field("bot_name", &self.bot_name)
            .field("locale", &self.locale)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let username = get(ENV_USER).ok_or(Error::MissingCredentials(ENV_USER))?;
        let password = get(ENV_PASSWORD).ok_or(Error::MissingCredentials(ENV_PASSWORD))?;

        let provider = match get(ENV_PROVIDER) {
            Some(p) => p.parse()?,
            None => ProviderKind::default(),
        };
        let auth_version = match get(ENV_AUTH_VERSION) {
            Some(v) => v.parse()?,
            None => AuthVersion::default(),
        };
        let auth_url = get(ENV_AUTH_URL).map(|url| normalize_auth_url(&url));

        let settings = Settings {
            username,
            password,
            provider,
            region: get(ENV_REGION),
            auth_url,
            auth_version,
            domain_name: get(ENV_DOMAIN_NAME),
            project: get(ENV_PROJECT),
            bot_name: get(ENV_NAME).unwrap_or_else(default_bot_name),
            locale: get(ENV_LOCALE).unwrap_or_else(default_locale),
        };

        tracing::debug!(?settings, "Loaded settings from environment");
        Ok(settings)
    }

    /// Identity endpoint, or a config error when none was given.
    pub fn require_auth_url(&self) -> Result<&str> {
        self.auth_url
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{} not set", ENV_AUTH_URL)))
    }
}

/// Strip an identity URL down to its scheme and host.
///
/// Operators tend to paste `OS_AUTH_URL` from an rc file, which carries a
/// version path (`/v3`); the client appends its own.
pub fn normalize_auth_url(url: &str) -> String {
    let url = url.trim();
    Regex::new(r"(?i)^(https?://)?[^/]*")
        .ok()
        .and_then(|re| re.find(url).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| url.to_string())
}
