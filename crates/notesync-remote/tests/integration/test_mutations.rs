//! Page creation, updates and archiving

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notesync_core::ports::{IRemoteStore, RemoteContent, RemoteError};

use crate::common::{
    child_page_json, client_for, database_json, mount_blocks, mount_not_found, mount_page,
    page_json, paragraph_json, rid,
};

#[tokio::test]
async fn test_create_under_page_parent() {
    let server = MockServer::start().await;
    mount_page(&server, "P1", "Parent", "X").await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .and(body_partial_json(json!({
            "parent": { "page_id": "P1" },
            "properties": { "title": { "title": [{ "text": { "content": "a" } }] } },
            "children": [
                { "type": "paragraph", "paragraph": { "rich_text": [{ "text": { "content": "hello" } }] } },
                { "type": "paragraph", "paragraph": { "rich_text": [{ "text": { "content": "world" } }] } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("NEW1", "a", "P1")))
        .expect(1)
        .mount(&server)
        .await;

    let id = client_for(&server)
        .create_or_update(
            Some(&rid("P1")),
            None,
            &RemoteContent::new("a", b"hello\nworld".to_vec()),
        )
        .await
        .unwrap();
    assert_eq!(id, rid("NEW1"));
}

#[tokio::test]
async fn test_create_under_database_uses_title_column() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/DB1").await;
    Mock::given(method("GET"))
        .and(path("/databases/DB1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(database_json("DB1", "Tasks")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .and(body_partial_json(json!({
            "parent": { "database_id": "DB1" },
            "properties": { "Task name": { "title": [{ "text": { "content": "Ship" } }] } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("T9", "Ship", "DB1")))
        .expect(1)
        .mount(&server)
        .await;

    let id = client_for(&server)
        .create_or_update(Some(&rid("DB1")), None, &RemoteContent::new("Ship", Vec::new()))
        .await
        .unwrap();
    assert_eq!(id, rid("T9"));
}

#[tokio::test]
async fn test_create_appends_blocks_beyond_first_batch() {
    let server = MockServer::start().await;
    mount_page(&server, "P1", "Parent", "X").await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("NEW1", "big", "P1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/blocks/NEW1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let body = vec!["line"; 150].join("\n").into_bytes();
    client_for(&server)
        .create_or_update(Some(&rid("P1")), None, &RemoteContent::new("big", body))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_without_parent_is_rejected() {
    let server = MockServer::start().await;
    let err = client_for(&server)
        .create_or_update(None, None, &RemoteContent::new("a", b"x".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn test_update_rewrites_text_blocks_only() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/pages/R1"))
        .and(body_partial_json(json!({
            "properties": { "title": { "title": [{ "text": { "content": "renamed" } }] } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("R1", "renamed", "P1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_blocks(
        &server,
        "R1",
        vec![paragraph_json("b1", "old text"), child_page_json("C1", "Keep me")],
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/blocks/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paragraph_json("b1", "old text")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/blocks/C1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/blocks/R1/children"))
        .and(body_partial_json(json!({
            "children": [{ "paragraph": { "rich_text": [{ "text": { "content": "new text" } }] } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client_for(&server)
        .create_or_update(
            None,
            Some(&rid("R1")),
            &RemoteContent::new("renamed", b"new text".to_vec()),
        )
        .await
        .unwrap();
    assert_eq!(id, rid("R1"));
}

#[tokio::test]
async fn test_update_of_missing_page_is_not_found() {
    let server = MockServer::start().await;
    mount_not_found(&server, "PATCH", "/pages/R9").await;

    let err = client_for(&server)
        .create_or_update(None, Some(&rid("R9")), &RemoteContent::new("a", b"x".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err, RemoteError::NotFound(rid("R9")));
}

#[tokio::test]
async fn test_delete_archives_page() {
    let server = MockServer::start().await;
    mount_page(&server, "R1", "Doomed", "P1").await;
    Mock::given(method("PATCH"))
        .and(path("/pages/R1"))
        .and(body_partial_json(json!({ "archived": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("R1", "Doomed", "P1")))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).delete(&rid("R1")).await.unwrap();
}

#[tokio::test]
async fn test_delete_missing_object_is_not_found() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/R9").await;
    mount_not_found(&server, "GET", "/databases/R9").await;

    let err = client_for(&server).delete(&rid("R9")).await.unwrap_err();
    assert_eq!(err, RemoteError::NotFound(rid("R9")));
}
