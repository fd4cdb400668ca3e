//! Metadata lookup, content reads and child listings

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notesync_core::domain::RemoteKind;
use notesync_core::ports::{IRemoteStore, RemoteError};

use crate::common::{
    child_page_json, client_for, database_json, list_json, mount_blocks, mount_not_found,
    mount_page, page_json, paragraph_json, rid,
};

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_get_metadata_for_page() {
    let server = MockServer::start().await;
    mount_page(&server, "R1", "Meeting notes", "P1").await;

    let meta = client_for(&server)
        .get_metadata(&rid("R1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(meta.id, rid("R1"));
    assert_eq!(meta.kind, RemoteKind::Item);
    assert_eq!(meta.title, "Meeting notes");
    assert_eq!(meta.parent_id, Some(rid("P1")));
    assert_eq!(meta.last_edited.to_rfc3339(), "2026-10-01T08:30:00+00:00");
}

#[tokio::test]
async fn test_get_metadata_falls_back_to_database() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/DB1").await;
    Mock::given(method("GET"))
        .and(path("/databases/DB1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(database_json("DB1", "Tasks")))
        .mount(&server)
        .await;

    let meta = client_for(&server)
        .get_metadata(&rid("DB1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.kind, RemoteKind::Collection);
    assert_eq!(meta.title, "Tasks");
}

#[tokio::test]
async fn test_missing_object_has_no_metadata() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/R9").await;
    mount_not_found(&server, "GET", "/databases/R9").await;

    let client = client_for(&server);
    assert!(client.get_metadata(&rid("R9")).await.unwrap().is_none());
    assert!(!client.exists(&rid("R9")).await.unwrap());
    assert!(matches!(
        client.modified_time(&rid("R9")).await,
        Err(RemoteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_archived_page_counts_as_gone() {
    let server = MockServer::start().await;
    let mut page = page_json("R1", "old", "P1");
    page["archived"] = serde_json::json!(true);
    Mock::given(method("GET"))
        .and(path("/pages/R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page))
        .mount(&server)
        .await;

    assert!(client_for(&server)
        .get_metadata(&rid("R1"))
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Content
// ============================================================================

#[tokio::test]
async fn test_fetch_content_follows_pagination() {
    let server = MockServer::start().await;
    mount_page(&server, "R1", "Notes", "P1").await;

    // Cursor-specific mock first so it wins over the generic one
    Mock::given(method("GET"))
        .and(path("/blocks/R1/children"))
        .and(query_param("start_cursor", "cursor-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(
            vec![paragraph_json("b3", "third")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocks/R1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(
            vec![paragraph_json("b1", "first"), paragraph_json("b2", "second")],
            Some("cursor-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let content = client_for(&server).fetch_content(&rid("R1")).await.unwrap();
    assert_eq!(content.title, "Notes");
    assert_eq!(content.body, b"first\nsecond\nthird");
}

#[tokio::test]
async fn test_fetch_content_skips_child_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "R1", "Notes", "P1").await;
    mount_blocks(
        &server,
        "R1",
        vec![
            paragraph_json("b1", "intro"),
            child_page_json("C1", "Sub page"),
            paragraph_json("b2", "outro"),
        ],
    )
    .await;

    let content = client_for(&server).fetch_content(&rid("R1")).await.unwrap();
    assert_eq!(content.body, b"intro\noutro");
}

#[tokio::test]
async fn test_fetch_content_of_missing_object() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/R9").await;
    mount_not_found(&server, "GET", "/databases/R9").await;

    let err = client_for(&server)
        .fetch_content(&rid("R9"))
        .await
        .unwrap_err();
    assert_eq!(err, RemoteError::NotFound(rid("R9")));
}

#[tokio::test]
async fn test_collection_content_lists_row_titles() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/DB1").await;
    Mock::given(method("GET"))
        .and(path("/databases/DB1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(database_json("DB1", "Tasks")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/databases/DB1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(
            vec![page_json("T1", "Write docs", "DB1"), page_json("T2", "Ship", "DB1")],
            None,
        )))
        .mount(&server)
        .await;

    let content = client_for(&server).fetch_content(&rid("DB1")).await.unwrap();
    assert_eq!(content.title, "Tasks");
    assert_eq!(content.body, b"Write docs\nShip");
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_children_of_page() {
    let server = MockServer::start().await;
    mount_page(&server, "P1", "Workspace root", "X").await;
    mount_blocks(
        &server,
        "P1",
        vec![
            paragraph_json("b1", "text"),
            child_page_json("C1", "Alpha"),
            child_page_json("C2", "Beta"),
        ],
    )
    .await;

    let children = client_for(&server).list_children(&rid("P1")).await.unwrap();
    let titles: Vec<_> = children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Beta"]);
    assert!(children.iter().all(|c| c.parent_id == Some(rid("P1"))));
}

#[tokio::test]
async fn test_list_children_of_database() {
    let server = MockServer::start().await;
    mount_not_found(&server, "GET", "/pages/DB1").await;
    Mock::given(method("GET"))
        .and(path("/databases/DB1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(database_json("DB1", "Tasks")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/databases/DB1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(
            vec![page_json("T1", "Write docs", "DB1")],
            None,
        )))
        .mount(&server)
        .await;

    let children = client_for(&server).list_children(&rid("DB1")).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, rid("T1"));
    assert_eq!(children[0].kind, RemoteKind::Item);
}
