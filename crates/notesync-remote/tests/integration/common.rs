//! Shared wiremock helpers for Notion API tests

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notesync_core::config::RemoteConfig;
use notesync_core::domain::RemoteId;
use notesync_remote::NotionClient;

pub const TOKEN: &str = "test-integration-token";
pub const EDITED: &str = "2026-10-01T08:30:00.000Z";

/// Client pointed at `server` with a rate ceiling tests never hit
pub fn client_for(server: &MockServer) -> NotionClient {
    client_with(server, |_| {})
}

pub fn client_with(server: &MockServer, adjust: impl FnOnce(&mut RemoteConfig)) -> NotionClient {
    let mut config = RemoteConfig {
        base_url: server.uri(),
        requests_per_second: 1000.0,
        burst: 100,
        ..RemoteConfig::default()
    };
    adjust(&mut config);
    NotionClient::new(&config, TOKEN).unwrap()
}

pub fn rid(id: &str) -> RemoteId {
    RemoteId::new(id.to_string()).unwrap()
}

pub fn page_json(id: &str, title: &str, parent: &str) -> Value {
    json!({
        "object": "page",
        "id": id,
        "last_edited_time": EDITED,
        "archived": false,
        "in_trash": false,
        "parent": { "type": "page_id", "page_id": parent },
        "properties": {
            "title": {
                "id": "title",
                "type": "title",
                "title": [{ "type": "text", "plain_text": title, "text": { "content": title } }]
            }
        }
    })
}

pub fn database_json(id: &str, title: &str) -> Value {
    json!({
        "object": "database",
        "id": id,
        "last_edited_time": EDITED,
        "title": [{ "type": "text", "plain_text": title }],
        "parent": { "type": "workspace", "workspace": true },
        "properties": {
            "Task name": { "id": "title", "type": "title", "title": {} },
            "Done": { "id": "d", "type": "checkbox", "checkbox": {} }
        }
    })
}

pub fn paragraph_json(id: &str, text: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "paragraph",
        "last_edited_time": EDITED,
        "has_children": false,
        "paragraph": {
            "rich_text": [{ "type": "text", "plain_text": text, "text": { "content": text } }]
        }
    })
}

pub fn child_page_json(id: &str, title: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "child_page",
        "last_edited_time": EDITED,
        "has_children": true,
        "child_page": { "title": title }
    })
}

pub fn list_json(results: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "object": "list",
        "results": results,
        "next_cursor": next_cursor,
        "has_more": next_cursor.is_some()
    })
}

pub fn error_json(status: u16, code: &str, message: &str) -> Value {
    json!({ "object": "error", "status": status, "code": code, "message": message })
}

pub async fn mount_page(server: &MockServer, id: &str, title: &str, parent: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/pages/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(id, title, parent)))
        .mount(server)
        .await;
}

pub async fn mount_not_found(server: &MockServer, http_method: &str, route: &str) {
    Mock::given(method(http_method))
        .and(path(route.to_string()))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_json(404, "object_not_found", "nope")),
        )
        .mount(server)
        .await;
}

pub async fn mount_blocks(server: &MockServer, id: &str, blocks: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/blocks/{id}/children")))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(blocks, None)))
        .mount(server)
        .await;
}
