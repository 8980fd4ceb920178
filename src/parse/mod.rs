//! Parse orchestration: encoding resolution, the strict pass, the single
//! lenient retry, and assembly of the final [`ParseResult`].
//!
//! The state machine itself lives in [`machine`]; the two in-crate drivers
//! ([`strict`] over quick-xml, [`loose`] as a tolerant tokenizer) are thin
//! translation layers onto the [`EventSink`] contract, and double as the
//! reference implementations for external backends.

mod handlers;
mod loose;
mod machine;
mod post;
mod state;
mod strict;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::encoding;
use crate::model::{ParseResult, Record};

use machine::FeedParser;

pub use machine::EventSink;

/// Per-parse configuration, all fields defaulted so callers override any
/// subset. The fetch layer stays outside this crate: whatever response
/// metadata the caller has is passed in here.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Response headers, lowercase names. Only `content-type` influences
    /// parsing (encoding resolution); `content-location` seeds the base URI
    /// and `content-language` the feed language. The full map is echoed on
    /// the result.
    pub headers: BTreeMap<String, String>,
    /// HTTP status, echoed on the result
    pub status: Option<u16>,
    /// Scrub embedded HTML through the sanitizer allowlists
    pub sanitize_html: bool,
    /// Rewrite relative references inside HTML-typed values
    pub resolve_relative_uris: bool,
    /// Injectable "today" for the date parser's current-year/day defaulting;
    /// `None` uses the real clock
    pub today: Option<NaiveDate>,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            headers: BTreeMap::new(),
            status: None,
            sanitize_html: true,
            resolve_relative_uris: true,
            today: None,
        }
    }
}

impl ParseOptions {
    pub(crate) fn today_or_now(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

/// Parse a feed document with default options.
pub fn parse(data: &[u8]) -> ParseResult {
    parse_with(data, &ParseOptions::default())
}

/// Parse a feed document.
///
/// Never returns an error: recoverable problems set `bozo` and capture the
/// cause on the result, a fatal strict-pass error triggers one retry through
/// the lenient driver, and even a doubly-failed parse yields whatever partial
/// document model was built.
pub fn parse_with(data: &[u8], options: &ParseOptions) -> ParseResult {
    let decoded = encoding::convert_to_utf8(data, &options.headers);
    let advisory = decoded.bozo;

    if decoded.text.is_empty() {
        return ParseResult {
            feed: Record::new(),
            entries: Vec::new(),
            encoding: decoded.encoding,
            version: String::new(),
            bozo: advisory.is_some(),
            bozo_exception: advisory,
            namespaces: BTreeMap::new(),
            headers: options.headers.clone(),
            status: options.status,
        };
    }

    let mut parser = FeedParser::new(options, true);
    strict::run(&decoded.text, &mut parser);

    let fatal = parser.take_fault();
    if let Some(error) = &fatal {
        tracing::debug!(%error, "strict parse failed, retrying with the lenient driver");
        // Discard all partial state and start over leniently
        parser = FeedParser::new(options, false);
        loose::run(&decoded.text, &mut parser);
        parser.take_fault();
    }

    let bozo = fatal.or(advisory);
    if let Some(error) = &bozo {
        tracing::warn!(%error, "document parsed with problems");
    }

    let version = parser.effective_version();
    let namespaces = parser.namespaces();
    ParseResult {
        feed: parser.feed,
        entries: parser.entries,
        encoding: decoded.encoding,
        version,
        bozo: bozo.is_some(),
        bozo_exception: bozo,
        namespaces,
        headers: options.headers.clone(),
        status: options.status,
    }
}
