//! Typed configuration, read once from the environment at startup.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://3.basecampapi.com";
pub const DEFAULT_LAUNCHPAD_URL: &str = "https://launchpad.37signals.com";
pub const DEFAULT_CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 1200;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Settings for one run of the tool
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub account_id: i64,
    pub project_id: i64,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub access_token: Option<String>,
    pub token_storage_path: PathBuf,
    pub card_table_url: Option<String>,
    pub card_table_id: Option<i64>,
    pub user_agent: String,
    pub api_base: String,
    pub launchpad_url: String,
    pub http_timeout: Duration,
    pub claude_api_key: String,
    pub claude_model: String,
    pub claude_api_url: String,
    pub claude_max_tokens: u32,
    pub prd_path: PathBuf,
}

impl Config {
    /// Load `.env` (if present) and read the process environment
    pub fn load(env_file: &Path) -> Result<Self> {
        if env_file.is_file() {
            dotenv::from_path(env_file).map_err(|e| Error::InvalidConfig {
                key: "--env-file",
                value: format!("{}: {e}", env_file.display()),
            })?;
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string = |key: &str| get(key).unwrap_or_default();

        Ok(Config {
            account_id: parse_or(get("BASECAMP_ACCOUNT_ID"), "BASECAMP_ACCOUNT_ID", 0)?,
            project_id: parse_or(get("BASECAMP_PROJECT_ID"), "BASECAMP_PROJECT_ID", 0)?,
            client_id: string("BASECAMP_CLIENT_ID"),
            client_secret: string("BASECAMP_CLIENT_SECRET"),
            redirect_uri: string("BASECAMP_REDIRECT_URI"),
            access_token: get("BASECAMP_ACCESS_TOKEN"),
            token_storage_path: get("BASECAMP_TOKEN_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("basecamp_token.json")),
            card_table_url: get("BASECAMP_CARD_TABLE_URL"),
            card_table_id: get("BASECAMP_CARD_TABLE_ID")
                .map(|v| parse_value(&v, "BASECAMP_CARD_TABLE_ID"))
                .transpose()?,
            user_agent: string("BASECAMP_USER_AGENT"),
            api_base: trim_slash(get("BASECAMP_API_BASE"), DEFAULT_API_BASE),
            launchpad_url: trim_slash(get("BASECAMP_LAUNCHPAD_URL"), DEFAULT_LAUNCHPAD_URL),
            http_timeout: Duration::from_secs(parse_or(
                get("HTTP_TIMEOUT_SECS"),
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            claude_api_key: string("CLAUDE_API_KEY"),
            claude_model: get("CLAUDE_MODEL").unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
            claude_api_url: get("CLAUDE_API_URL")
                .unwrap_or_else(|| DEFAULT_CLAUDE_API_URL.to_string()),
            claude_max_tokens: parse_or(
                get("CLAUDE_MAX_TOKENS"),
                "CLAUDE_MAX_TOKENS",
                DEFAULT_MAX_TOKENS,
            )?,
            prd_path: get("PRD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("PRD.json")),
        })
    }

    /// Apply `--card-table-id` / `--card-table-url`
    pub fn with_overrides(
        mut self,
        card_table_id: Option<i64>,
        card_table_url: Option<String>,
    ) -> Self {
        if card_table_id.is_some() {
            self.card_table_id = card_table_id;
        }
        if let Some(url) = card_table_url.filter(|u| !u.is_empty()) {
            self.card_table_url = Some(url);
        }
        self
    }

    /// Board calls are meaningless without both ids
    pub fn require_board_ids(&self) -> Result<()> {
        if self.account_id == 0 {
            return Err(Error::MissingConfig("BASECAMP_ACCOUNT_ID"));
        }
        if self.project_id == 0 {
            return Err(Error::MissingConfig("BASECAMP_PROJECT_ID"));
        }
        Ok(())
    }

    /// `https://3.basecampapi.com/{account}`
    pub fn account_base_url(&self) -> String {
        format!("{}/{}", self.api_base, self.account_id)
    }

    pub fn card_table_url_for(&self, card_table_id: i64) -> String {
        format!(
            "{}/buckets/{}/card_tables/{}.json",
            self.account_base_url(),
            self.project_id,
            card_table_id
        )
    }
}

fn parse_value<T: std::str::FromStr>(value: &str, key: &'static str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidConfig {
        key,
        value: value.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T> {
    match value {
        Some(v) => parse_value(&v, key),
        None => Ok(default),
    }
}

fn trim_slash(value: Option<String>, default: &str) -> String {
    value
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
