//! Portal settings and credentials
//!
//! Settings come from an optional TOML file; every key has a default that
//! matches the live portal. Credentials only come from the environment
//! (a `.env` file is loaded first when present).

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const USERNAME_VAR: &str = "EMPOWER_USERNAME";
pub const PASSWORD_VAR: &str = "EMPOWER_PASSWORD";
pub const HEADLESS_VAR: &str = "EMPOWER_HEADLESS";

/// Portal settings loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Login page of the portal
    pub url: String,
    /// Visible label of the upload category option
    pub upload_category: String,
    /// Browser profile kept between runs (cookies, session)
    pub profile_dir: PathBuf,
    /// How long to wait for an element to appear (default: 30)
    pub element_timeout_secs: u64,
    pub selectors: Selectors,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: "https://participant.empower-retirement.com".to_string(),
            upload_category: "Incoming rollovers".to_string(),
            profile_dir: PathBuf::from("./browser_persist"),
            element_timeout_secs: 30,
            selectors: Selectors::default(),
        }
    }
}

impl PortalConfig {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from a TOML string
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        if config.element_timeout_secs == 0 {
            bail!("element_timeout_secs must be at least 1");
        }
        Ok(config)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

/// CSS selectors for each element the upload flow touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub username: String,
    pub password: String,
    pub login_submit: String,
    pub upload_link: String,
    pub category_select: String,
    pub file_input: String,
    pub upload_submit: String,
    /// Element that only shows up once the upload went through
    pub confirmation: Option<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            username: "#usernameInput".to_string(),
            password: "#passwordInput".to_string(),
            login_submit: "#submit".to_string(),
            upload_link: r#"[data-testid="uploadDocument"]"#.to_string(),
            category_select: "#fileUploadCategory".to_string(),
            file_input: r#"input[type="file"]"#.to_string(),
            upload_submit: "button#submit".to_string(),
            confirmation: None,
        }
    }
}

/// Portal login
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials through `lookup`; both must be present and non-empty
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => bail!("{} must be set (environment or .env)", name),
        };
        Ok(Self {
            username: required(USERNAME_VAR)?,
            password: required(PASSWORD_VAR)?,
        })
    }
}

/// Whether to run without a window: `EMPOWER_HEADLESS`, default true
pub fn headless_from_lookup<F>(lookup: F) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(HEADLESS_VAR) {
        None => Ok(true),
        Some(raw) => parse_bool_flag(&raw)
            .with_context(|| format!("{} must be true or false, got '{}'", HEADLESS_VAR, raw)),
    }
}

/// Lenient boolean: true/false, 1/0, yes/no, on/off
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
