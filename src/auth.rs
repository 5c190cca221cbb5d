//! OAuth2 authorization-code bootstrap against Launchpad.
//!
//! The rest of the crate only ever sees the resulting bearer token.

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Token response as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredToken {
    fn usable_access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Token file next to the working directory
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TokenStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Missing or unparseable files read as an empty token
    pub fn load(&self) -> StoredToken {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return StoredToken::default();
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            debug!(path = %self.path.display(), error = %e, "ignoring unreadable token file");
            StoredToken::default()
        })
    }

    pub fn save(&self, token: &StoredToken) -> Result<()> {
        let payload = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

/// URL the operator opens in a browser to grant access
pub fn authorize_url(config: &Config) -> String {
    let base = format!("{}/authorization/new", config.launchpad_url);
    let params = [
        ("type", "web_server"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];
    match Url::parse_with_params(&base, &params) {
        Ok(url) => url.to_string(),
        Err(_) => base,
    }
}

/// Trade an authorization code for a token
pub fn exchange_code(client: &Client, config: &Config, code: &str) -> Result<StoredToken> {
    let url = format!("{}/authorization/token", config.launchpad_url);
    let form = [
        ("type", "web_server"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
    ];

    let response = client
        .post(&url)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, config.user_agent.as_str())
        .form(&form)
        .send()
        .map_err(|source| Error::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    let body = response.text().map_err(|source| Error::Transport {
        url: url.clone(),
        source,
    })?;
    if !status.is_success() {
        return Err(Error::protocol(&url, status.as_u16(), &body));
    }

    let mut token: StoredToken =
        serde_json::from_str(&body).map_err(|e| Error::malformed("token endpoint", e))?;
    if let Some(expires_in) = token.expires_in {
        token.expires_at = Some(Utc::now().timestamp() + expires_in);
    }
    Ok(token)
}

/// Resolve the bearer token: environment, then token file, then code exchange
pub fn bootstrap_access_token(config: &Config, code: Option<&str>) -> Result<String> {
    if let Some(token) = config.access_token.as_deref() {
        return Ok(token.to_string());
    }

    let store = TokenStore::new(&config.token_storage_path);
    if let Some(token) = store.load().usable_access_token() {
        debug!(path = %config.token_storage_path.display(), "using stored access token");
        return Ok(token.to_string());
    }

    let Some(code) = code.filter(|c| !c.is_empty()) else {
        return Err(Error::AuthorizationRequired(authorize_url(config)));
    };

    let client = Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|source| Error::Transport {
            url: config.launchpad_url.clone(),
            source,
        })?;
    let token = exchange_code(&client, config, code)?;
    store.save(&token)?;
    info!(path = %config.token_storage_path.display(), "saved new access token");

    token
        .usable_access_token()
        .map(str::to_string)
        .ok_or(Error::MissingAccessToken)
}
