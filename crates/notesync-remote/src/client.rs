//! Notion API client
//!
//! [`NotionClient`] implements [`IRemoteStore`] over the Notion REST API:
//!
//! | Operation          | Requests                                               |
//! |--------------------|--------------------------------------------------------|
//! | `check_connection` | `GET /users/me`                                        |
//! | `get_metadata`     | `GET /pages/{id}`, falling back to `GET /databases/{id}` |
//! | `fetch_content`    | `GET /blocks/{id}/children` (paginated)                |
//! | `create_or_update` | `POST /pages` or `PATCH /pages/{id}` + block rewrite   |
//! | `delete`           | `PATCH /pages/{id}` with `archived: true`              |
//! | `list_children`    | child blocks of a page, or `POST /databases/{id}/query` |
//!
//! Every request passes through the shared [`RateLimiter`] and carries the
//! configured timeout. HTTP 429 throttles the limiter and is returned as
//! [`RemoteError::RateLimited`]; retrying is left to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use notesync_core::config::RemoteConfig;
use notesync_core::domain::{RemoteId, RemoteKind};
use notesync_core::ports::{IRemoteStore, RemoteContent, RemoteError, RemoteMetadata};

use crate::blocks::{self, Block, RichText, MAX_CHILDREN_PER_REQUEST};
use crate::rate_limit::{parse_retry_after, RateLimitConfig, RateLimiter};

/// Used when a 429 response carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

const PAGE_SIZE: u32 = 100;

// ============================================================================
// Notion response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UserResponse {
    object: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ParentRef {
    page_id: Option<String>,
    database_id: Option<String>,
    block_id: Option<String>,
}

impl ParentRef {
    fn id(&self) -> Option<RemoteId> {
        let raw = self
            .page_id
            .as_ref()
            .or(self.database_id.as_ref())
            .or(self.block_id.as_ref())?;
        RemoteId::new(raw.clone()).ok()
    }
}

#[derive(Debug, Deserialize)]
struct PageProperty {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
struct PageObject {
    id: String,
    last_edited_time: DateTime<Utc>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    in_trash: bool,
    parent: Option<ParentRef>,
    #[serde(default)]
    properties: HashMap<String, PageProperty>,
}

impl PageObject {
    fn title(&self) -> String {
        self.properties
            .values()
            .find(|p| p.kind == "title")
            .map(|p| p.title.iter().map(|t| t.plain_text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct DatabaseProperty {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseObject {
    id: String,
    last_edited_time: DateTime<Utc>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    in_trash: bool,
    parent: Option<ParentRef>,
    #[serde(default)]
    title: Vec<RichText>,
    #[serde(default)]
    properties: HashMap<String, DatabaseProperty>,
}

impl DatabaseObject {
    /// Name of the database's title column
    fn title_property(&self) -> String {
        self.properties
            .iter()
            .find(|(_, p)| p.kind == "title")
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "title".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// A page or database looked up by id
enum NotionObject {
    Page(PageObject),
    Database(DatabaseObject),
}

impl NotionObject {
    fn is_gone(&self) -> bool {
        match self {
            NotionObject::Page(p) => p.archived || p.in_trash,
            NotionObject::Database(d) => d.archived || d.in_trash,
        }
    }

    fn into_metadata(self) -> Result<RemoteMetadata, RemoteError> {
        match self {
            NotionObject::Page(page) => Ok(RemoteMetadata {
                id: parse_id(&page.id)?,
                kind: RemoteKind::Item,
                title: page.title(),
                parent_id: page.parent.as_ref().and_then(ParentRef::id),
                last_edited: page.last_edited_time,
            }),
            NotionObject::Database(db) => Ok(RemoteMetadata {
                id: parse_id(&db.id)?,
                kind: RemoteKind::Collection,
                title: db.title.iter().map(|t| t.plain_text.as_str()).collect(),
                parent_id: db.parent.as_ref().and_then(ParentRef::id),
                last_edited: db.last_edited_time,
            }),
        }
    }
}

fn parse_id(raw: &str) -> Result<RemoteId, RemoteError> {
    RemoteId::new(raw.to_string())
        .map_err(|e| RemoteError::InvalidResponse(format!("bad object id {raw:?}: {e}")))
}

fn title_property(title: &str) -> Value {
    json!({ "title": blocks::rich_text(title) })
}

// ============================================================================
// NotionClient
// ============================================================================

/// HTTP accessor for a Notion workspace
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    api_version: String,
    rate_limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl NotionClient {
    /// Build a client from the `remote` config section
    ///
    /// # Errors
    /// `RemoteError::Network` when the HTTP client cannot be initialized
    pub fn new(config: &RemoteConfig, token: impl Into<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            api_version: config.api_version.clone(),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::from(config))),
        })
    }

    /// Share a rate limiter with other clients of the same integration
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticated request builder for `path` relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
    }

    /// Send a request and decode a JSON response
    ///
    /// `subject` names the object a 404 refers to.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        subject: Option<&RemoteId>,
    ) -> Result<T, RemoteError> {
        self.rate_limiter.acquire().await;

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limiter.on_throttle();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER));
            warn!(?retry_after, "Remote store returned 429");
            return Err(RemoteError::RateLimited { retry_after });
        }

        if !status.is_success() {
            return Err(status_error(status, response, subject).await);
        }

        self.rate_limiter.on_success();
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    /// Page or database `id`, or `None` when neither exists
    async fn fetch_object(&self, id: &RemoteId) -> Result<Option<NotionObject>, RemoteError> {
        let page = self
            .send::<PageObject>(self.request(Method::GET, &format!("/pages/{id}")), Some(id))
            .await;
        match page {
            Ok(page) => return Ok(Some(NotionObject::Page(page))),
            Err(RemoteError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let database = self
            .send::<DatabaseObject>(
                self.request(Method::GET, &format!("/databases/{id}")),
                Some(id),
            )
            .await;
        match database {
            Ok(db) => Ok(Some(NotionObject::Database(db))),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every child block of `id`, following pagination
    async fn fetch_blocks(&self, id: &RemoteId) -> Result<Vec<Block>, RemoteError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.clone()));
            }
            let page: ListResponse<Block> = self
                .send(
                    self.request(Method::GET, &format!("/blocks/{id}/children"))
                        .query(&query),
                    Some(id),
                )
                .await?;
            all.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        debug!(id = %id, blocks = all.len(), "Fetched block children");
        Ok(all)
    }

    /// Every row of database `id`, following pagination
    async fn query_database(&self, id: &RemoteId) -> Result<Vec<PageObject>, RemoteError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let page: ListResponse<PageObject> = self
                .send(
                    self.request(Method::POST, &format!("/databases/{id}/query"))
                        .json(&body),
                    Some(id),
                )
                .await?;
            all.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(all)
    }

    async fn append_blocks(&self, id: &RemoteId, children: &[Value]) -> Result<(), RemoteError> {
        for batch in children.chunks(MAX_CHILDREN_PER_REQUEST) {
            let _: Value = self
                .send(
                    self.request(Method::PATCH, &format!("/blocks/{id}/children"))
                        .json(&json!({ "children": batch })),
                    Some(id),
                )
                .await?;
        }
        Ok(())
    }

    /// Replace the text blocks of page `id`; nested pages and databases stay
    async fn replace_blocks(&self, id: &RemoteId, children: &[Value]) -> Result<(), RemoteError> {
        for block in self.fetch_blocks(id).await? {
            if block.is_child_object() {
                continue;
            }
            let block_id = parse_id(&block.id)?;
            let _: Value = self
                .send(
                    self.request(Method::DELETE, &format!("/blocks/{block_id}")),
                    Some(&block_id),
                )
                .await?;
        }
        self.append_blocks(id, children).await
    }

    async fn create_page(
        &self,
        parent: &RemoteId,
        content: &RemoteContent,
    ) -> Result<RemoteId, RemoteError> {
        let object = self
            .fetch_object(parent)
            .await?
            .ok_or_else(|| RemoteError::NotFound(parent.clone()))?;

        let (parent_ref, title_key) = match &object {
            NotionObject::Page(_) => (json!({ "page_id": parent.as_str() }), "title".to_string()),
            NotionObject::Database(db) => (
                json!({ "database_id": parent.as_str() }),
                db.title_property(),
            ),
        };

        let children = blocks::body_to_blocks(&content.body);
        let (first, rest) = children.split_at(children.len().min(MAX_CHILDREN_PER_REQUEST));
        let mut properties = serde_json::Map::new();
        properties.insert(title_key, title_property(&content.title));

        let created: CreatedObject = self
            .send(
                self.request(Method::POST, "/pages").json(&json!({
                    "parent": parent_ref,
                    "properties": properties,
                    "children": first,
                })),
                Some(parent),
            )
            .await?;
        let id = parse_id(&created.id)?;

        if !rest.is_empty() {
            self.append_blocks(&id, rest).await?;
        }
        debug!(id = %id, parent = %parent, "Created page");
        Ok(id)
    }

    async fn update_page(&self, id: &RemoteId, content: &RemoteContent) -> Result<(), RemoteError> {
        let _: PageObject = self
            .send(
                self.request(Method::PATCH, &format!("/pages/{id}"))
                    .json(&json!({ "properties": { "title": title_property(&content.title) } })),
                Some(id),
            )
            .await?;
        self.replace_blocks(id, &blocks::body_to_blocks(&content.body))
            .await?;
        debug!(id = %id, bytes = content.body.len(), "Updated page");
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(e.to_string())
    }
}

async fn status_error(
    status: StatusCode,
    response: Response,
    subject: Option<&RemoteId>,
) -> RemoteError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(text);
    let code = status.as_u16();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        StatusCode::NOT_FOUND => match subject {
            Some(id) => RemoteError::NotFound(id.clone()),
            None => RemoteError::Rejected {
                status: code,
                message,
            },
        },
        s if s.is_server_error() => RemoteError::Server {
            status: code,
            message,
        },
        _ => RemoteError::Rejected {
            status: code,
            message,
        },
    }
}

#[async_trait::async_trait]
impl IRemoteStore for NotionClient {
    #[instrument(skip(self))]
    async fn check_connection(&self) -> Result<(), RemoteError> {
        let user: UserResponse = self
            .send(self.request(Method::GET, "/users/me"), None)
            .await?;
        if user.object != "user" {
            return Err(RemoteError::InvalidResponse(format!(
                "expected a user object, got {:?}",
                user.object
            )));
        }
        debug!("Remote store connection verified");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_metadata(&self, id: &RemoteId) -> Result<Option<RemoteMetadata>, RemoteError> {
        match self.fetch_object(id).await? {
            Some(object) if !object.is_gone() => object.into_metadata().map(Some),
            _ => Ok(None),
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_content(&self, id: &RemoteId) -> Result<RemoteContent, RemoteError> {
        let metadata = self
            .get_metadata(id)
            .await?
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;

        let body = match metadata.kind {
            RemoteKind::Item => blocks::blocks_to_body(&self.fetch_blocks(id).await?),
            // A collection reads as the titles of its rows
            RemoteKind::Collection => self
                .query_database(id)
                .await?
                .iter()
                .filter(|row| !row.archived && !row.in_trash)
                .map(PageObject::title)
                .collect::<Vec<_>>()
                .join("\n")
                .into_bytes(),
        };
        Ok(RemoteContent::new(metadata.title, body))
    }

    #[instrument(skip(self, content), fields(parent = ?parent, existing = ?existing))]
    async fn create_or_update(
        &self,
        parent: Option<&RemoteId>,
        existing: Option<&RemoteId>,
        content: &RemoteContent,
    ) -> Result<RemoteId, RemoteError> {
        match (existing, parent) {
            (Some(id), _) => {
                self.update_page(id, content).await?;
                Ok(id.clone())
            }
            (None, Some(parent)) => self.create_page(parent, content).await,
            (None, None) => Err(RemoteError::Rejected {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: "a parent is required to create a page".to_string(),
            }),
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        let path = match self.fetch_object(id).await? {
            Some(NotionObject::Page(_)) => format!("/pages/{id}"),
            Some(NotionObject::Database(_)) => format!("/databases/{id}"),
            None => return Err(RemoteError::NotFound(id.clone())),
        };
        let _: Value = self
            .send(
                self.request(Method::PATCH, &path)
                    .json(&json!({ "archived": true })),
                Some(id),
            )
            .await?;
        debug!(id = %id, "Archived remote object");
        Ok(())
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn list_children(&self, parent: &RemoteId) -> Result<Vec<RemoteMetadata>, RemoteError> {
        let object = self
            .fetch_object(parent)
            .await?
            .ok_or_else(|| RemoteError::NotFound(parent.clone()))?;

        match object {
            NotionObject::Page(_) => self
                .fetch_blocks(parent)
                .await?
                .into_iter()
                .filter(Block::is_child_object)
                .map(|block| {
                    Ok(RemoteMetadata {
                        id: parse_id(&block.id)?,
                        kind: if block.kind == "child_database" {
                            RemoteKind::Collection
                        } else {
                            RemoteKind::Item
                        },
                        title: block.child_title().unwrap_or_default().to_string(),
                        parent_id: Some(parent.clone()),
                        last_edited: block.last_edited_time.unwrap_or_else(Utc::now),
                    })
                })
                .collect(),
            NotionObject::Database(_) => self
                .query_database(parent)
                .await?
                .into_iter()
                .filter(|row| !row.archived && !row.in_trash)
                .map(|row| NotionObject::Page(row).into_metadata())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NotionClient {
        NotionClient::new(&RemoteConfig::default(), "secret-token").unwrap()
    }

    #[test]
    fn test_request_carries_auth_and_version() {
        let request = client().request(Method::GET, "/users/me").build().unwrap();
        assert_eq!(request.url().as_str(), "https://api.notion.com/v1/users/me");
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer secret-token"
        );
        assert_eq!(request.headers().get("notion-version").unwrap(), "2022-06-28");
    }

    #[test]
    fn test_trailing_slash_in_base_url() {
        let config = RemoteConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..RemoteConfig::default()
        };
        let client = NotionClient::new(&config, "t").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_page_object_title_and_parent() {
        let page: PageObject = serde_json::from_value(json!({
            "object": "page",
            "id": "59833787-2cf9-4fdf-8782-e53db20768a5",
            "last_edited_time": "2026-10-01T08:30:00.000Z",
            "archived": false,
            "parent": { "type": "page_id", "page_id": "aaaa-bbbb" },
            "properties": {
                "Status": { "id": "s", "type": "select", "select": null },
                "Name": {
                    "id": "title",
                    "type": "title",
                    "title": [{ "plain_text": "Meeting " }, { "plain_text": "notes" }]
                }
            }
        }))
        .unwrap();

        let meta = NotionObject::Page(page).into_metadata().unwrap();
        assert_eq!(meta.title, "Meeting notes");
        assert_eq!(meta.kind, RemoteKind::Item);
        assert_eq!(meta.parent_id.unwrap().as_str(), "aaaa-bbbb");
    }

    #[test]
    fn test_database_title_property_name() {
        let db: DatabaseObject = serde_json::from_value(json!({
            "object": "database",
            "id": "db1",
            "last_edited_time": "2026-10-01T08:30:00.000Z",
            "title": [{ "plain_text": "Tasks" }],
            "parent": { "type": "workspace", "workspace": true },
            "properties": {
                "Done": { "id": "d", "type": "checkbox", "checkbox": {} },
                "Task name": { "id": "title", "type": "title", "title": {} }
            }
        }))
        .unwrap();

        assert_eq!(db.title_property(), "Task name");
        let meta = NotionObject::Database(db).into_metadata().unwrap();
        assert_eq!(meta.kind, RemoteKind::Collection);
        assert_eq!(meta.title, "Tasks");
        assert!(meta.parent_id.is_none());
    }
}
