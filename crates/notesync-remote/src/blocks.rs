//! Mapping between plain-text bodies and Notion blocks
//!
//! Each line of a body becomes one `paragraph` block. Reading goes the other
//! way for every block type that carries `rich_text`, so headings, list items
//! and quotes written in the Notion UI still contribute their text. Blocks
//! without text (dividers, images, child pages) are not part of the body.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Longest `text.content` the API accepts in one rich-text object
pub const MAX_TEXT_CHUNK: usize = 2000;

/// Most children the API accepts in one append request
pub const MAX_CHILDREN_PER_REQUEST: usize = 100;

/// Text fragment in a Notion response
#[derive(Debug, Clone, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

/// A block as returned by `GET /blocks/{id}/children`
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub last_edited_time: Option<DateTime<Utc>>,
    /// Type-specific payload, keyed by `kind`
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Block {
    fn content(&self) -> Option<&Value> {
        self.payload.get(&self.kind)
    }

    /// Concatenated plain text, or `None` for blocks without `rich_text`
    pub fn text(&self) -> Option<String> {
        let fragments = self.content()?.get("rich_text")?.as_array()?;
        Some(
            fragments
                .iter()
                .filter_map(|f| f.get("plain_text").and_then(Value::as_str))
                .collect(),
        )
    }

    /// Whether this block is a nested page or database
    pub fn is_child_object(&self) -> bool {
        matches!(self.kind.as_str(), "child_page" | "child_database")
    }

    /// Title of a `child_page` / `child_database` block
    pub fn child_title(&self) -> Option<&str> {
        if !self.is_child_object() {
            return None;
        }
        self.content()?.get("title")?.as_str()
    }
}

/// Rich-text array for `text`, split into API-sized chunks
pub fn rich_text(text: &str) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_TEXT_CHUNK)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": content } })
        })
        .collect()
}

fn paragraph(line: &str) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": { "rich_text": rich_text(line) }
    })
}

/// One paragraph block per line; an empty body has no blocks
pub fn body_to_blocks(body: &[u8]) -> Vec<Value> {
    if body.is_empty() {
        return Vec::new();
    }
    String::from_utf8_lossy(body)
        .split('\n')
        .map(paragraph)
        .collect()
}

/// Text lines of `blocks` joined with `\n`
pub fn blocks_to_body(blocks: &[Block]) -> Vec<u8> {
    blocks
        .iter()
        .filter_map(Block::text)
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(value: Value) -> Block {
        serde_json::from_value(value).unwrap()
    }

    fn text_block(kind: &str, parts: &[&str]) -> Block {
        let rich: Vec<Value> = parts
            .iter()
            .map(|p| json!({ "type": "text", "plain_text": p, "text": { "content": p } }))
            .collect();
        block(json!({
            "object": "block",
            "id": "b1",
            "type": kind,
            "last_edited_time": "2026-10-01T12:00:00.000Z",
            kind: { "rich_text": rich }
        }))
    }

    #[test]
    fn test_body_lines_become_paragraphs() {
        let blocks = body_to_blocks(b"first\n\nthird");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["type"], "paragraph");
        assert_eq!(blocks[0]["paragraph"]["rich_text"][0]["text"]["content"], "first");
        assert!(blocks[1]["paragraph"]["rich_text"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_empty_body_has_no_blocks() {
        assert!(body_to_blocks(b"").is_empty());
        assert!(blocks_to_body(&[]).is_empty());
    }

    #[test]
    fn test_long_lines_are_chunked() {
        let line = "é".repeat(MAX_TEXT_CHUNK * 2 + 5);
        let chunks = rich_text(&line);
        assert_eq!(chunks.len(), 3);
        let rebuilt: String = chunks
            .iter()
            .map(|c| c["text"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(rebuilt, line);
    }

    #[test]
    fn test_text_from_any_rich_text_block() {
        let blocks = vec![
            text_block("heading_1", &["Title"]),
            text_block("paragraph", &["Hello, ", "world"]),
            text_block("bulleted_list_item", &["item"]),
        ];
        assert_eq!(blocks_to_body(&blocks), b"Title\nHello, world\nitem");
    }

    #[test]
    fn test_blocks_without_text_are_skipped() {
        let divider = block(json!({ "id": "d", "type": "divider", "divider": {} }));
        let child = block(json!({
            "id": "c",
            "type": "child_page",
            "child_page": { "title": "Sub page" }
        }));
        let blocks = vec![text_block("paragraph", &["a"]), divider, child.clone()];

        assert_eq!(blocks_to_body(&blocks), b"a");
        assert!(child.is_child_object());
        assert_eq!(child.child_title(), Some("Sub page"));
    }

    #[test]
    fn test_written_body_reads_back_identically() {
        let body = b"line one\n\n  indented\ntrailing\n".to_vec();
        let written = body_to_blocks(&body);
        // The API echoes content as plain_text
        let read: Vec<Block> = written
            .iter()
            .map(|b| {
                let parts: Vec<&str> = b["paragraph"]["rich_text"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|r| r["text"]["content"].as_str().unwrap())
                    .collect();
                text_block("paragraph", &parts)
            })
            .collect();
        assert_eq!(blocks_to_body(&read), body);
    }
}
