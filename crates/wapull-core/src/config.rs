//! Run configuration.
//!
//! Settings are layered: built-in defaults, an optional TOML file
//! (`wapull.toml`), `SENDPULSE_*` / `WAPULL_*` environment variables, then
//! command-line overrides. The merged layer is validated once into a
//! [`HarvestConfig`] that every component borrows.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::endpoints::DateRange;
use crate::paginate::PageLimits;
use wapull_auth_bridge::ClientCredentials;

pub const DEFAULT_API_BASE: &str = "https://api.sendpulse.com";
pub const DEFAULT_CONFIG_FILE: &str = "wapull.toml";
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_MAX_ITEMS: usize = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONCURRENCY: usize = 1;
const DEFAULT_OUT_DIR: &str = "out";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    MissingCredential(&'static str),

    #[error("invalid api_base {value:?}: {source}")]
    InvalidApiBase {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("api_base {0:?} cannot carry a path")]
    OpaqueApiBase(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// One partial configuration layer. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_base: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub bot_id: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub verbose: Option<bool>,
    pub page_size: Option<usize>,
    pub max_items: Option<usize>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub out_dir: Option<PathBuf>,
}

impl Settings {
    /// Load a TOML layer. A missing file yields an empty layer.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the environment layer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the environment layer from an arbitrary lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            api_base: get("SENDPULSE_API_BASE"),
            client_id: get("SENDPULSE_CLIENT_ID"),
            client_secret: get("SENDPULSE_CLIENT_SECRET"),
            bot_id: get("SENDPULSE_BOT_ID"),
            since: get("SENDPULSE_SINCE"),
            until: get("SENDPULSE_UNTIL"),
            verbose: get("SENDPULSE_DEBUG")
                .map(|v| parse_flag("SENDPULSE_DEBUG", &v))
                .transpose()?,
            page_size: parse_opt("WAPULL_PAGE_SIZE", get("WAPULL_PAGE_SIZE"))?,
            max_items: parse_opt("WAPULL_MAX_ITEMS", get("WAPULL_MAX_ITEMS"))?,
            concurrency: parse_opt("WAPULL_CONCURRENCY", get("WAPULL_CONCURRENCY"))?,
            timeout_secs: parse_opt("WAPULL_TIMEOUT_SECS", get("WAPULL_TIMEOUT_SECS"))?,
            out_dir: get("WAPULL_OUT_DIR").map(PathBuf::from),
        })
    }

    /// Overlay `other` on top of `self`; set fields in `other` win.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            api_base: other.api_base.or(self.api_base),
            client_id: other.client_id.or(self.client_id),
            client_secret: other.client_secret.or(self.client_secret),
            bot_id: other.bot_id.or(self.bot_id),
            since: other.since.or(self.since),
            until: other.until.or(self.until),
            verbose: other.verbose.or(self.verbose),
            page_size: other.page_size.or(self.page_size),
            max_items: other.max_items.or(self.max_items),
            concurrency: other.concurrency.or(self.concurrency),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            out_dir: other.out_dir.or(self.out_dir),
        }
    }

    /// Validate into a [`HarvestConfig`]. Credentials are checked first so a
    /// run without them fails before any network call.
    pub fn resolve(self) -> Result<HarvestConfig, ConfigError> {
        let client_id = non_empty(self.client_id)
            .ok_or(ConfigError::MissingCredential("SENDPULSE_CLIENT_ID"))?;
        let client_secret = non_empty(self.client_secret)
            .ok_or(ConfigError::MissingCredential("SENDPULSE_CLIENT_SECRET"))?;

        let raw_base = self.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = Url::parse(&raw_base).map_err(|source| ConfigError::InvalidApiBase {
            value: raw_base.clone(),
            source,
        })?;
        if api_base.cannot_be_a_base() {
            return Err(ConfigError::OpaqueApiBase(raw_base));
        }

        let page_size = at_least_one("page_size", self.page_size.unwrap_or(DEFAULT_PAGE_SIZE))?;
        let max_items = at_least_one("max_items", self.max_items.unwrap_or(DEFAULT_MAX_ITEMS))?;
        let concurrency =
            at_least_one("concurrency", self.concurrency.unwrap_or(DEFAULT_CONCURRENCY))?;
        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Zero("timeout_secs"));
        }

        Ok(HarvestConfig {
            api_base,
            credentials: ClientCredentials {
                client_id,
                client_secret,
            },
            bot_id: non_empty(self.bot_id),
            dates: DateRange {
                since: non_empty(self.since),
                until: non_empty(self.until),
            },
            verbose: self.verbose.unwrap_or(false),
            limits: PageLimits {
                page_size,
                max_items,
            },
            concurrency,
            timeout: Duration::from_secs(timeout_secs),
            out_dir: self.out_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR)),
        })
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub api_base: Url,
    pub credentials: ClientCredentials,
    /// Fixed bot; auto-detected when absent.
    pub bot_id: Option<String>,
    pub dates: DateRange,
    pub verbose: bool,
    /// Paging for chats and for each chat's messages.
    pub limits: PageLimits,
    /// Chats whose messages are fetched at the same time.
    pub concurrency: usize,
    pub timeout: Duration,
    pub out_dir: PathBuf,
}

impl HarvestConfig {
    /// Load file, environment and `overrides`, in increasing precedence.
    ///
    /// An explicitly given file must exist; the default `wapull.toml` is optional.
    pub fn load(config_path: Option<&Path>, overrides: Settings) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Read {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "file not found",
                        ),
                    });
                }
                Settings::load(path)?
            }
            None => Settings::load(Path::new(DEFAULT_CONFIG_FILE))?,
        };

        file.merge(Settings::from_env()?).merge(overrides).resolve()
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/access_token", self.api_base.as_str().trim_end_matches('/'))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn at_least_one(key: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero(key))
    } else {
        Ok(value)
    }
}

fn parse_opt<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| match v.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::InvalidValue { key, value: v }),
        })
        .transpose()
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
