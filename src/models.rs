use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A kanban board discovered in a project's dock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTable {
    pub id: i64,
    pub title: String,
    pub url: String,
}

/// A lane within a card table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawColumn")]
pub struct Column {
    pub id: i64,
    pub name: String,
    pub cards_url: Option<String>,
}

#[derive(Deserialize)]
struct RawColumn {
    id: i64,
    name: Option<String>,
    title: Option<String>,
    cards_url: Option<String>,
}

impl From<RawColumn> for Column {
    fn from(raw: RawColumn) -> Self {
        let name = raw
            .name
            .or(raw.title)
            .unwrap_or_else(|| format!("Column {}", raw.id));
        Column {
            id: raw.id,
            name,
            cards_url: raw.cards_url,
        }
    }
}

/// A card in a column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawCard")]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Deserialize)]
struct RawCard {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    status: Option<String>,
    #[serde(default)]
    archived: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    content: Option<String>,
    description: Option<String>,
    notes: Option<String>,
    url: Option<String>,
}

impl From<RawCard> for Item {
    fn from(raw: RawCard) -> Self {
        let status = raw.status.unwrap_or_else(|| {
            if raw.archived { "archived" } else { "active" }.to_string()
        });
        Item {
            id: raw.id,
            title: raw
                .title
                .or(raw.name)
                .unwrap_or_else(|| "(untitled)".to_string()),
            status,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            description: raw.content.or(raw.description).or(raw.notes),
            url: raw.url,
        }
    }
}

impl Item {
    /// Minimal item, mostly useful for fakes and tests
    pub fn new(id: i64, title: &str) -> Self {
        Item {
            id,
            title: title.to_string(),
            status: "active".to_string(),
            created_at: None,
            updated_at: None,
            description: None,
            url: None,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.title)
    }
}

/// Project resource, only the parts needed for discovery
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub dock: Vec<DockEntry>,
}

/// One tool in a project's dock
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A generated backlog task
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub passes: bool,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub acceptance: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn new(id: &str, title: &str) -> Self {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }
}

/// A backlog entry grouping the tasks generated from one selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Epic {
    pub epic: String,
    pub tasks: Vec<Task>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Epic {
    pub fn new(epic: &str, tasks: Vec<Task>) -> Self {
        Epic {
            epic: epic.to_string(),
            tasks,
            extra: Map::new(),
        }
    }
}
