use thiserror::Error;

/// Longest slice of a response body kept in error messages
pub const BODY_EXCERPT_LEN: usize = 500;

/// All possible errors in the card table browser
#[derive(Error, Debug)]
pub enum Error {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request failed ({status}) for {url}\n{body}")]
    Protocol {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {origin}: {detail}")]
    MalformedResponse { origin: String, detail: String },

    #[error("Summarizer response missing epic/tasks")]
    MissingFields,

    #[error("No card tables found for this project.")]
    NoCardTables,

    #[error("No columns found for this card table.")]
    NoColumns,

    #[error(
        "Could not find a card table URL. Set BASECAMP_CARD_TABLE_URL explicitly or use --card-table-id."
    )]
    NoCardTableUrl,

    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    #[error(
        "No access token found.\nOpen this URL to authorize, then rerun with --code=YOUR_CODE:\n{0}"
    )]
    AuthorizationRequired(String),

    #[error("Token response missing access_token")]
    MissingAccessToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}

impl Error {
    /// Build a protocol error, keeping only the head of the body
    pub fn protocol(url: &str, status: u16, body: &str) -> Self {
        Error::Protocol {
            url: url.to_string(),
            status,
            body: excerpt(body),
        }
    }

    pub fn malformed(origin: impl Into<String>, detail: impl ToString) -> Self {
        Error::MalformedResponse {
            origin: origin.into(),
            detail: detail.to_string(),
        }
    }
}

/// Truncate a response body for diagnostics
pub fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
