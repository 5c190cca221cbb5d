//! Basecamp card-table reads and card mutations.

use crate::config::Config;
use crate::error::{Error, Result, excerpt};
use crate::models::{CardTable, Column, Item, Project};
use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Dock tool names that denote a kanban board
pub const CARD_TABLE_TOOLS: [&str; 2] = ["card_table", "kanban_board"];

/// Read and write surface of the board, as seen by the navigator
pub trait BoardApi {
    /// Card tables reachable from the configured project
    fn list_card_tables(&self) -> Result<Vec<CardTable>>;

    /// Columns of a card table, in server order
    fn list_columns(&self, table: &CardTable) -> Result<Vec<Column>>;

    fn list_items(&self, table: &CardTable, column: &Column) -> Result<Vec<Item>>;

    fn get_item_details(&self, table: &CardTable, item: &Item) -> Result<Item>;

    /// `Ok(false)` when the server refused the comment
    fn post_comment(&self, item: &Item, content: &str) -> Result<bool>;

    /// `Ok(false)` when the server refused the move
    fn move_item(&self, item: &Item, column_id: i64) -> Result<bool>;
}

// ==================== Discovery ====================

/// Card tables listed in a project's dock, with configured fallbacks.
///
/// An explicit card table URL short-circuits discovery. When the dock yields
/// nothing, a configured card table id is turned into a URL.
pub fn discover_card_tables(project: &Project, config: &Config) -> Vec<CardTable> {
    if let Some(url) = &config.card_table_url {
        if let Some(id) = config.card_table_id.or_else(|| extract_card_table_id(url)) {
            return vec![CardTable {
                id,
                title: format!("Card Table {id}"),
                url: url.clone(),
            }];
        }
        warn!(
            %url,
            "card table URL has no /card_tables/<id>, falling back to the project dock"
        );
    }

    let mut tables: Vec<CardTable> = project
        .dock
        .iter()
        .filter(|tool| CARD_TABLE_TOOLS.contains(&tool.name.as_str()))
        .filter_map(|tool| {
            let url = tool.url.clone()?;
            let Some(id) = tool.id.or_else(|| extract_card_table_id(&url)) else {
                debug!(%url, "skipping dock entry without an id");
                return None;
            };
            let title = tool.title.clone().unwrap_or_else(|| tool.name.clone());
            Some(CardTable { id, title, url })
        })
        .collect();

    if tables.is_empty() {
        if let Some(id) = config.card_table_id {
            tables.push(CardTable {
                id,
                title: format!("Card Table {id}"),
                url: config.card_table_url_for(id),
            });
        }
    }

    tables
}

/// The one card table the listing mode reports on: explicit URL, explicit id,
/// then the first kanban tool in the dock.
pub fn resolve_card_table(project: &Project, config: &Config) -> Option<CardTable> {
    if config.card_table_url.is_none() {
        if let Some(id) = config.card_table_id {
            return Some(CardTable {
                id,
                title: format!("Card Table {id}"),
                url: config.card_table_url_for(id),
            });
        }
    }
    discover_card_tables(project, config).into_iter().next()
}

/// Numeric id following `/card_tables/` in a URL
pub fn extract_card_table_id(url: &str) -> Option<i64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"/card_tables/(\d+)").expect("valid regex"));
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ==================== Probing ====================

/// Where a card table keeps its columns, in the order tried.
///
/// The API has shipped more than one shape for this; the first source that
/// is present wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    ListsUrl,
    ColumnsUrl,
    EmbeddedLists,
    EmbeddedColumns,
}

pub const COLUMN_SOURCES: [ColumnSource; 4] = [
    ColumnSource::ListsUrl,
    ColumnSource::ColumnsUrl,
    ColumnSource::EmbeddedLists,
    ColumnSource::EmbeddedColumns,
];

/// Card table resource, only the column-bearing parts
#[derive(Debug, Default, Deserialize)]
pub struct CardTableDoc {
    #[serde(default)]
    pub lists_url: Option<String>,
    #[serde(default)]
    pub columns_url: Option<String>,
    #[serde(default)]
    pub lists: Option<Vec<Column>>,
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
}

/// Where a column's cards can be fetched from, in the order tried.
///
/// Without a `cards_url` the path is guessed; which guess is canonical is
/// undocumented, so both are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    CardsUrl,
    GuessedListsPath,
    GuessedColumnsPath,
}

pub const ITEM_SOURCES: [ItemSource; 3] = [
    ItemSource::CardsUrl,
    ItemSource::GuessedListsPath,
    ItemSource::GuessedColumnsPath,
];

// ==================== HTTP Client ====================

/// Blocking Basecamp client
pub struct BasecampClient {
    http: Client,
    config: Config,
}

impl BasecampClient {
    pub fn new(config: &Config, access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {access_token}"), "BASECAMP_ACCESS_TOKEN")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            header_value(&config.user_agent, "BASECAMP_USER_AGENT")?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()
            .map_err(|source| Error::Transport {
                url: config.api_base.clone(),
                source,
            })?;

        Ok(BasecampClient {
            http,
            config: config.clone(),
        })
    }

    fn base(&self) -> String {
        self.config.account_base_url()
    }

    pub fn fetch_project(&self) -> Result<Project> {
        let url = format!("{}/projects/{}.json", self.base(), self.config.project_id);
        self.get_json(&url)
    }

    /// Columns for the table at `url`, walking [`COLUMN_SOURCES`]
    pub fn columns_at(&self, url: &str) -> Result<Vec<Column>> {
        let doc: CardTableDoc = self.get_json(url)?;
        for source in COLUMN_SOURCES {
            let found = match source {
                ColumnSource::ListsUrl => match &doc.lists_url {
                    Some(lists_url) => Some(self.get_json(lists_url)?),
                    None => None,
                },
                ColumnSource::ColumnsUrl => match &doc.columns_url {
                    Some(columns_url) => Some(self.get_json(columns_url)?),
                    None => None,
                },
                ColumnSource::EmbeddedLists => doc.lists.clone(),
                ColumnSource::EmbeddedColumns => doc.columns.clone(),
            };
            if let Some(columns) = found {
                debug!(?source, count = columns.len(), "resolved columns");
                return Ok(columns);
            }
        }
        Ok(Vec::new())
    }

    fn guessed_items_url(
        &self,
        source: ItemSource,
        table_id: i64,
        column_id: i64,
    ) -> Option<String> {
        let segment = match source {
            ItemSource::CardsUrl => return None,
            ItemSource::GuessedListsPath => "lists",
            ItemSource::GuessedColumnsPath => "columns",
        };
        Some(format!(
            "{}/buckets/{}/card_tables/{}/{}/{}/cards.json",
            self.base(),
            self.config.project_id,
            table_id,
            segment,
            column_id
        ))
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        debug!(%url, "request");
        request.send().map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })
    }

    fn read_body(url: &str, response: Response) -> Result<(u16, String)> {
        let status = response.status().as_u16();
        let body = response.text().map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok((status, body))
    }

    /// GET that the caller cannot proceed without
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(url, self.http.get(url))?;
        let (status, body) = Self::read_body(url, response)?;
        if !(200..300).contains(&status) {
            return Err(Error::protocol(url, status, &body));
        }
        serde_json::from_str(&body).map_err(|e| Error::malformed(url, e))
    }

    /// GET used for probing: refusals and unparseable bodies yield `None`
    fn try_get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let response = self.send(url, self.http.get(url))?;
        let (status, body) = Self::read_body(url, response)?;
        if !(200..300).contains(&status) {
            debug!(%url, status, "probe refused");
            return Ok(None);
        }
        match serde_json::from_str(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(%url, error = %e, "probe returned unusable body");
                Ok(None)
            }
        }
    }

    fn post_mutation(&self, url: &str, payload: serde_json::Value, what: &str) -> Result<bool> {
        let response = self.send(url, self.http.post(url).json(&payload))?;
        let (status, body) = Self::read_body(url, response)?;
        if (200..300).contains(&status) {
            return Ok(true);
        }
        warn!(%url, status, body = %excerpt(&body), "{what} failed");
        Ok(false)
    }
}

impl BoardApi for BasecampClient {
    fn list_card_tables(&self) -> Result<Vec<CardTable>> {
        let project = self.fetch_project()?;
        Ok(discover_card_tables(&project, &self.config))
    }

    fn list_columns(&self, table: &CardTable) -> Result<Vec<Column>> {
        self.columns_at(&table.url)
    }

    fn list_items(&self, table: &CardTable, column: &Column) -> Result<Vec<Item>> {
        for source in ITEM_SOURCES {
            match source {
                ItemSource::CardsUrl => {
                    if let Some(url) = &column.cards_url {
                        return self.get_json(url);
                    }
                }
                ItemSource::GuessedListsPath | ItemSource::GuessedColumnsPath => {
                    let Some(url) = self.guessed_items_url(source, table.id, column.id) else {
                        continue;
                    };
                    if let Some(items) = self.try_get_json(&url)? {
                        debug!(?source, "resolved items");
                        return Ok(items);
                    }
                }
            }
        }
        Ok(Vec::new())
    }

    fn get_item_details(&self, table: &CardTable, item: &Item) -> Result<Item> {
        let url = item.url.clone().unwrap_or_else(|| {
            format!(
                "{}/buckets/{}/card_tables/{}/cards/{}.json",
                self.base(),
                self.config.project_id,
                table.id,
                item.id
            )
        });
        self.get_json(&url)
    }

    fn post_comment(&self, item: &Item, content: &str) -> Result<bool> {
        let url = format!(
            "{}/buckets/{}/recordings/{}/comments.json",
            self.base(),
            self.config.project_id,
            item.id
        );
        self.post_mutation(&url, json!({ "content": content }), "comment")
    }

    fn move_item(&self, item: &Item, column_id: i64) -> Result<bool> {
        let url = format!(
            "{}/buckets/{}/card_tables/cards/{}/moves.json",
            self.base(),
            self.config.project_id,
            item.id
        );
        self.post_mutation(&url, json!({ "column_id": column_id }), "move")
    }
}

fn header_value(value: &str, key: &'static str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::InvalidConfig {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DockEntry;
    use mockito::{Matcher, Server, ServerGuard};
    use std::collections::HashMap;

    fn config_for(server: &ServerGuard, extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("BASECAMP_ACCOUNT_ID".to_string(), "999".to_string()),
            ("BASECAMP_PROJECT_ID".to_string(), "1".to_string()),
            ("BASECAMP_USER_AGENT".to_string(), "cardtable-tests (ops@example.test)".to_string()),
            ("BASECAMP_API_BASE".to_string(), server.url()),
        ]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn setup() -> (ServerGuard, BasecampClient) {
        let server = Server::new();
        let client = BasecampClient::new(&config_for(&server, &[]), "tok").unwrap();
        (server, client)
    }

    fn table(server: &ServerGuard) -> CardTable {
        CardTable {
            id: 5,
            title: "Board".to_string(),
            url: format!("{}/999/buckets/1/card_tables/5.json", server.url()),
        }
    }

    fn dock_project(entries: Vec<DockEntry>) -> Project {
        Project {
            dock: entries,
            ..Default::default()
        }
    }

    fn dock(name: &str, id: Option<i64>, url: Option<&str>) -> DockEntry {
        DockEntry {
            id,
            name: name.to_string(),
            title: None,
            url: url.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_card_table_id() {
        assert_eq!(
            extract_card_table_id("https://x/1/buckets/2/card_tables/345.json"),
            Some(345)
        );
        assert_eq!(extract_card_table_id("https://x/1/buckets/2/todosets/3.json"), None);
    }

    #[test]
    fn test_discover_filters_dock() {
        let server = Server::new();
        let config = config_for(&server, &[]);
        let project = dock_project(vec![
            dock("message_board", Some(1), Some("https://x/message_boards/1.json")),
            dock("card_table", Some(2), Some("https://x/card_tables/2.json")),
            dock("kanban_board", None, Some("https://x/card_tables/3.json")),
            dock("card_table", Some(4), None),
        ]);

        let tables = discover_card_tables(&project, &config);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].id, 2);
        assert_eq!(tables[0].title, "card_table");
        assert_eq!(tables[1].id, 3);
    }

    #[test]
    fn test_discover_falls_back_to_configured_id() {
        let server = Server::new();
        let config = config_for(&server, &[("BASECAMP_CARD_TABLE_ID", "77")]);
        let tables = discover_card_tables(&Project::default(), &config);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].url,
            format!("{}/999/buckets/1/card_tables/77.json", server.url())
        );
    }

    #[test]
    fn test_resolve_prefers_explicit_url() {
        let server = Server::new();
        let config = config_for(
            &server,
            &[("BASECAMP_CARD_TABLE_URL", "https://x/card_tables/9.json")],
        );
        let project = dock_project(vec![dock(
            "card_table",
            Some(2),
            Some("https://x/card_tables/2.json"),
        )]);
        let table = resolve_card_table(&project, &config).unwrap();
        assert_eq!(table.id, 9);

        let none = resolve_card_table(&Project::default(), &config_for(&server, &[]));
        assert!(none.is_none());
    }

    #[test]
    fn test_url_without_id_falls_back_to_dock() {
        let server = Server::new();
        let config = config_for(
            &server,
            &[("BASECAMP_CARD_TABLE_URL", "https://x/boards/main.json")],
        );
        let project = dock_project(vec![dock(
            "kanban_board",
            Some(2),
            Some("https://x/card_tables/2.json"),
        )]);

        let tables = discover_card_tables(&project, &config);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].url, "https://x/card_tables/2.json");

        let config = config_for(
            &server,
            &[
                ("BASECAMP_CARD_TABLE_URL", "https://x/boards/main.json"),
                ("BASECAMP_CARD_TABLE_ID", "8"),
            ],
        );
        let table = resolve_card_table(&project, &config).unwrap();
        assert_eq!(table.id, 8);
        assert_eq!(table.url, "https://x/boards/main.json");
    }

    #[test]
    fn test_list_card_tables_sends_auth_headers() {
        let (mut server, client) = setup();
        let body = json!({
            "id": 1,
            "dock": [{
                "id": 5,
                "name": "kanban_board",
                "title": "Roadmap",
                "url": "https://x/card_tables/5.json"
            }]
        });
        let mock = server
            .mock("GET", "/999/projects/1.json")
            .match_header("authorization", "Bearer tok")
            .match_header("accept", "application/json")
            .match_header("user-agent", "cardtable-tests (ops@example.test)")
            .with_status(200)
            .with_body(body.to_string())
            .create();

        let tables = client.list_card_tables().unwrap();
        mock.assert();
        assert_eq!(tables[0].title, "Roadmap");
    }

    #[test]
    fn test_project_fetch_failure_is_fatal() {
        let (mut server, client) = setup();
        server
            .mock("GET", "/999/projects/1.json")
            .with_status(404)
            .with_body("not found")
            .create();

        let result = client.list_card_tables();
        assert!(matches!(
            result,
            Err(Error::Protocol { status: 404, ref body, .. }) if body == "not found"
        ));
    }

    #[test]
    fn test_columns_prefer_lists_url() {
        let (mut server, client) = setup();
        let table = table(&server);
        let doc = json!({
            "lists_url": format!("{}/lists.json", server.url()),
            "columns_url": format!("{}/columns.json", server.url()),
            "lists": [{"id": 1, "title": "Embedded"}]
        });
        server
            .mock("GET", "/999/buckets/1/card_tables/5.json")
            .with_body(doc.to_string())
            .create();
        server
            .mock("GET", "/lists.json")
            .with_body(
                json!([{"id": 10, "title": "Todo"}, {"id": 11, "title": "Done"}]).to_string(),
            )
            .create();
        let columns_mock = server.mock("GET", "/columns.json").expect(0).create();

        let columns = client.list_columns(&table).unwrap();
        assert_eq!(
            columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["Todo", "Done"]
        );
        columns_mock.assert();
    }

    #[test]
    fn test_columns_fall_back_to_embedded() {
        let (mut server, client) = setup();
        let table = table(&server);
        server
            .mock("GET", "/999/buckets/1/card_tables/5.json")
            .with_body(json!({"columns": [{"id": 3, "name": "Triage"}]}).to_string())
            .create();

        let columns = client.list_columns(&table).unwrap();
        assert_eq!(
            columns,
            vec![Column {
                id: 3,
                name: "Triage".to_string(),
                cards_url: None,
            }]
        );
    }

    #[test]
    fn test_columns_url_beats_embedded_lists() {
        let (mut server, client) = setup();
        let table = table(&server);
        let doc = json!({
            "columns_url": format!("{}/columns.json", server.url()),
            "lists": [{"id": 1, "title": "Embedded"}]
        });
        server
            .mock("GET", "/999/buckets/1/card_tables/5.json")
            .with_body(doc.to_string())
            .create();
        let columns_mock = server
            .mock("GET", "/columns.json")
            .with_body(json!([{"id": 20, "name": "Via URL"}]).to_string())
            .create();

        let columns = client.list_columns(&table).unwrap();
        columns_mock.assert();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].id, 20);
        assert_eq!(columns[0].name, "Via URL");
    }

    #[test]
    fn test_embedded_lists_beat_embedded_columns() {
        let (mut server, client) = setup();
        let table = table(&server);
        let doc = json!({
            "columns": [{"id": 3, "name": "Triage"}],
            "lists": [{"id": 1, "title": "Backlog"}, {"id": 2, "title": "Doing"}]
        });
        server
            .mock("GET", "/999/buckets/1/card_tables/5.json")
            .with_body(doc.to_string())
            .create();

        let columns = client.list_columns(&table).unwrap();
        assert_eq!(
            columns.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_columns_empty_when_no_source() {
        let (mut server, client) = setup();
        let table = table(&server);
        server
            .mock("GET", "/999/buckets/1/card_tables/5.json")
            .with_body(json!({"title": "Board"}).to_string())
            .create();

        assert!(client.list_columns(&table).unwrap().is_empty());
    }

    #[test]
    fn test_items_from_cards_url() {
        let (mut server, client) = setup();
        let table = table(&server);
        server
            .mock("GET", "/cards/10.json")
            .with_body(json!([{"id": 100, "title": "A"}]).to_string())
            .create();
        let column = Column {
            id: 10,
            name: "Todo".to_string(),
            cards_url: Some(format!("{}/cards/10.json", server.url())),
        };

        let items = client.list_items(&table, &column).unwrap();
        assert_eq!(items, vec![Item::new(100, "A")]);
    }

    #[test]
    fn test_items_probe_guessed_paths_in_order() {
        let (mut server, client) = setup();
        let table = table(&server);
        let lists = server
            .mock("GET", "/999/buckets/1/card_tables/5/lists/10/cards.json")
            .with_status(404)
            .create();
        let columns = server
            .mock("GET", "/999/buckets/1/card_tables/5/columns/10/cards.json")
            .with_body(json!([{"id": 1, "title": "Guessed"}]).to_string())
            .create();
        let column = Column {
            id: 10,
            name: "Todo".to_string(),
            cards_url: None,
        };

        let items = client.list_items(&table, &column).unwrap();
        lists.assert();
        columns.assert();
        assert_eq!(items[0].title, "Guessed");
    }

    #[test]
    fn test_items_empty_when_probes_fail() {
        let (mut server, client) = setup();
        let table = table(&server);
        server
            .mock("GET", "/999/buckets/1/card_tables/5/lists/10/cards.json")
            .with_body("<html>")
            .create();
        server
            .mock("GET", "/999/buckets/1/card_tables/5/columns/10/cards.json")
            .with_status(500)
            .create();
        let column = Column {
            id: 10,
            name: "Todo".to_string(),
            cards_url: None,
        };

        assert!(client.list_items(&table, &column).unwrap().is_empty());
    }

    #[test]
    fn test_item_details_built_url() {
        let (mut server, client) = setup();
        let table = table(&server);
        server
            .mock("GET", "/999/buckets/1/card_tables/5/cards/42.json")
            .with_body(json!({"id": 42, "title": "Full", "content": "Body"}).to_string())
            .create();

        let details = client.get_item_details(&table, &Item::new(42, "Short")).unwrap();
        assert_eq!(details.description.as_deref(), Some("Body"));
    }

    #[test]
    fn test_item_details_invalid_json_is_malformed() {
        let (mut server, client) = setup();
        let table = table(&server);
        server
            .mock("GET", "/999/buckets/1/card_tables/5/cards/42.json")
            .with_body("oops")
            .create();

        let result = client.get_item_details(&table, &Item::new(42, "Short"));
        assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    }

    #[test]
    fn test_post_comment() {
        let (mut server, client) = setup();
        let mock = server
            .mock("POST", "/999/buckets/1/recordings/42/comments.json")
            .match_body(Matcher::Json(json!({"content": "hello"})))
            .with_status(201)
            .with_body("{}")
            .create();

        assert!(client.post_comment(&Item::new(42, "A"), "hello").unwrap());
        mock.assert();
    }

    #[test]
    fn test_move_item_no_content_and_refusal() {
        let (mut server, client) = setup();
        let ok = server
            .mock("POST", "/999/buckets/1/card_tables/cards/42/moves.json")
            .match_body(Matcher::Json(json!({"column_id": 11})))
            .with_status(204)
            .create();
        assert!(client.move_item(&Item::new(42, "A"), 11).unwrap());
        ok.assert();

        server
            .mock("POST", "/999/buckets/1/card_tables/cards/43/moves.json")
            .with_status(403)
            .with_body("forbidden")
            .create();
        assert!(!client.move_item(&Item::new(43, "B"), 11).unwrap());
    }
}
