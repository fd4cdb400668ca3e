//! notesync Remote - Notion-compatible HTTP accessor
//!
//! Implements the `IRemoteStore` port against the Notion REST API.
//!
//! ## Modules
//!
//! - [`client`] - `NotionClient`, the port implementation
//! - [`blocks`] - Mapping between plain-text bodies and Notion blocks
//! - [`rate_limit`] - Adaptive token bucket and `Retry-After` parsing

pub mod blocks;
pub mod client;
pub mod rate_limit;

pub use client::NotionClient;
pub use rate_limit::{RateLimitConfig, RateLimiter};
