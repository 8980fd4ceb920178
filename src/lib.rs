//! A forgiving feed normalizer: heterogeneous, frequently malformed
//! syndication documents (RSS 0.9x/1.0/2.0, CDF, Atom 0.3/1.0) in, one
//! canonical in-memory document model out.
//!
//! The pipeline:
//!
//! - **Encoding resolution**: sniff byte signatures, weigh the HTTP
//!   content-type against the XML declaration, and walk a fallback ladder
//!   until something decodes.
//! - **Tag state machine**: an event-driven dispatcher that builds
//!   feed/entry records, tracking namespaces, `xml:base` and `xml:lang`.
//! - **Post-processing**: base64 and entity decoding, relative-URI
//!   resolution, allowlist HTML sanitization, permissive date parsing.
//!
//! Parsing never raises. A malformed document gets one retry through a
//! lenient tokenizer; whatever could be recovered comes back with
//! [`ParseResult::bozo`] set and the cause captured.
//!
//! # Example
//!
//! ```
//! let rss = br#"<?xml version="1.0"?>
//! <rss version="2.0"><channel>
//!   <title>Example Feed</title>
//!   <link>https://example.com/</link>
//!   <item><title>First Post</title><guid>post-1</guid></item>
//! </channel></rss>"#;
//!
//! let result = sift::parse(rss);
//! assert!(!result.bozo);
//! assert_eq!(result.version, "rss20");
//! assert_eq!(result.feed.get_str("title"), Some("Example Feed"));
//! assert_eq!(result.entries.len(), 1);
//! assert_eq!(result.entries[0].get_str("guid"), Some("post-1"));
//! ```

pub mod dates;
mod encoding;
mod error;
pub mod model;
mod namespace;
mod parse;
pub mod sanitize;
mod uri;

pub use error::BozoError;
pub use model::{ContentBlock, FeedDate, Link, ParseResult, Record, Tag, Value};
pub use parse::{parse, parse_with, EventSink, ParseOptions};
