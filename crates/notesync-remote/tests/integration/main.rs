//! Integration tests for notesync-remote
//!
//! Uses wiremock to simulate the Notion API and verifies request shapes,
//! pagination and HTTP status mapping of `NotionClient`.

mod common;

mod test_connection;
mod test_content;
mod test_mutations;
