//! Turns selected cards into one PRD epic via the Claude messages API.

use crate::backlog::Backlog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Epic, Item};
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const SUMMARIZER: &str = "summarizer";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Generates an epic for a set of cards
pub trait Summarizer {
    fn generate_epic(&self, items: &[Item], backlog: &Backlog) -> Result<Epic>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Claude messages API client
pub struct ClaudeSummarizer {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeSummarizer {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT.max(config.http_timeout))
            .build()
            .map_err(|source| Error::Transport {
                url: config.claude_api_url.clone(),
                source,
            })?;
        Ok(ClaudeSummarizer {
            http,
            api_url: config.claude_api_url.clone(),
            api_key: config.claude_api_key.clone(),
            model: config.claude_model.clone(),
            max_tokens: config.claude_max_tokens,
        })
    }

    /// One non-streaming call; returns the concatenated text blocks
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(url = %self.api_url, model = %self.model, "summarizer request");
        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .map_err(|source| Error::Transport {
                url: self.api_url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.text().map_err(|source| Error::Transport {
            url: self.api_url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(Error::protocol(&self.api_url, status.as_u16(), &body));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|e| Error::malformed(SUMMARIZER, e))?;
        Ok(response_text(&parsed))
    }
}

impl Summarizer for ClaudeSummarizer {
    fn generate_epic(&self, items: &[Item], backlog: &Backlog) -> Result<Epic> {
        let prompt = build_prompt(items, backlog)?;
        let text = self.complete(&prompt)?;
        parse_epic(extract_json(&text)?)
    }
}

fn response_text(response: &MessagesResponse) -> String {
    response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect()
}

/// The generation contract sent to the model
pub fn build_prompt(items: &[Item], backlog: &Backlog) -> Result<String> {
    let backlog_json = serde_json::to_string_pretty(backlog)?;
    let tickets = items
        .iter()
        .map(|item| {
            format!(
                "- ID: {}\n  Title: {}\n  Description: {}",
                item.id,
                item.title,
                item.description.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        r#"You are turning Basecamp cards into one PRD epic with tasks.

Respond with ONLY valid JSON in exactly this shape:
{{
  "epic": "string",
  "tasks": [
    {{
      "id": "string",
      "title": "string",
      "passes": false,
      "scope": ["string"],
      "acceptance": ["string"]
    }}
  ]
}}

Rules:
- The epic summarizes the shared objective of the selected cards.
- Split the work into as many tasks as it needs; one card may become several tasks.
- Keep scope and acceptance items short, concrete and specific.
- Ids are short, lowercase and unique (for example "pm-1", "pm-2").
- Read the existing PRD below and do not repeat epics or tasks it already has.

Existing PRD (JSON array):
{backlog_json}

Cards:
{tickets}"#
    ))
}

/// Pull a JSON object out of free-form model output.
///
/// The whole trimmed text is tried first, then the widest `{...}` span.
pub fn extract_json(text: &str) -> Result<Value> {
    static OBJECT_SPAN: OnceLock<Regex> = OnceLock::new();

    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let span = OBJECT_SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
    let Some(found) = span.find(trimmed) else {
        return Err(Error::malformed(SUMMARIZER, "no JSON object in response"));
    };

    match serde_json::from_str::<Value>(found.as_str()) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(Error::malformed(SUMMARIZER, "response is not a JSON object")),
        Err(e) => Err(Error::malformed(SUMMARIZER, e)),
    }
}

/// Shape-check an extracted object as an [`Epic`]
pub fn parse_epic(value: Value) -> Result<Epic> {
    let has_fields = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("epic") && obj.contains_key("tasks"));
    if !has_fields {
        return Err(Error::MissingFields);
    }
    serde_json::from_value(value).map_err(|e| Error::malformed(SUMMARIZER, e))
}
