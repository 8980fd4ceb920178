//! The tag state machine.
//!
//! An event driver pushes abstract XML events into [`FeedParser`]; the
//! machine tracks element, base-URI and language stacks, registers namespace
//! declarations, dispatches known tags to their handlers, echoes literal
//! markup while inside inline XHTML content, and hands closing elements to
//! the content post-processor. One value of this type is one parse; nothing
//! is shared between parses except the read-only lookup tables.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::BozoError;
use crate::model::Record;
use crate::namespace::NamespaceTracker;
use crate::uri;

use super::handlers;
use super::state::{attr, ContentParams, ElementFrame};
use super::ParseOptions;

/// The abstract event contract a backend driver must satisfy. Strict SAX
/// sources pre-decode entity references into `characters`; lenient sources
/// emit them separately through `entity_ref` and the post-processor decodes
/// them later.
pub trait EventSink {
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str);
    fn start_element(&mut self, name: &str, attrs: &[(String, String)]);
    fn end_element(&mut self, name: &str);
    fn characters(&mut self, text: &str);
    fn cdata(&mut self, text: &str);
    fn comment(&mut self, text: &str);
    fn entity_ref(&mut self, name: &str);
    /// Record a fatal structural error; the driver must stop afterwards.
    fn fatal(&mut self, error: BozoError);
    /// Whether a fatal error has been recorded.
    fn failed(&self) -> bool;
}

/// Tags that open the document and set the feed-level language.
const FEED_ROOT_TAGS: &[&str] = &["feed", "rss", "rdf:rdf"];

/// Elements that may legitimately appear inside `<textinput>`; anything else
/// means an ill-formed feed left the flag dangling.
const TEXTINPUT_CHILDREN: &[&str] = &["title", "link", "description", "name"];

/// Same, for `<image>`.
const IMAGE_CHILDREN: &[&str] = &[
    "title", "link", "description", "url", "href", "width", "height",
];

pub(crate) struct FeedParser {
    // Document model under construction
    pub(crate) feed: Record,
    pub(crate) entries: Vec<Record>,
    pub(crate) source: Record,
    pub(crate) version: String,
    pub(crate) tracker: NamespaceTracker,

    // Stacks
    pub(crate) stack: Vec<ElementFrame>,
    base_stack: Vec<String>,
    lang_stack: Vec<Option<String>>,
    pub(crate) base_uri: String,
    pub(crate) lang: Option<String>,
    /// Fallbacks restored when the stacks drain: the caller-supplied
    /// content-location and content-language
    document_base: String,
    document_lang: Option<String>,

    // Context flags
    pub(crate) in_feed: bool,
    pub(crate) in_entry: bool,
    pub(crate) in_source: bool,
    pub(crate) in_image: bool,
    pub(crate) in_textinput: bool,
    pub(crate) in_author: bool,
    pub(crate) in_contributor: bool,
    pub(crate) in_publisher: bool,

    // Inline content tracking
    pub(crate) in_content: u32,
    pub(crate) content_params: Option<ContentParams>,
    /// Depth of literal tags echoed inside XHTML content
    xhtml_depth: u32,
    pub(crate) guid_is_link: bool,
    pub(crate) summary_as_content: bool,

    // Per-parse configuration
    pub(crate) strict: bool,
    pub(crate) sanitize_html: bool,
    pub(crate) resolve_relative_uris: bool,
    pub(crate) today: NaiveDate,

    fault: Option<BozoError>,
}

impl FeedParser {
    pub(crate) fn new(options: &ParseOptions, strict: bool) -> FeedParser {
        let base_uri = options
            .headers
            .get("content-location")
            .map(|location| uri::resolve("", location))
            .unwrap_or_default();
        let lang = options.headers.get("content-language").cloned();
        FeedParser {
            feed: Record::new(),
            entries: Vec::new(),
            source: Record::new(),
            version: String::new(),
            tracker: NamespaceTracker::new(),
            stack: Vec::new(),
            base_stack: Vec::new(),
            lang_stack: Vec::new(),
            document_base: base_uri.clone(),
            document_lang: lang.clone(),
            base_uri,
            lang,
            in_feed: false,
            in_entry: false,
            in_source: false,
            in_image: false,
            in_textinput: false,
            in_author: false,
            in_contributor: false,
            in_publisher: false,
            in_content: 0,
            content_params: None,
            xhtml_depth: 0,
            guid_is_link: false,
            summary_as_content: false,
            strict,
            sanitize_html: options.sanitize_html,
            resolve_relative_uris: options.resolve_relative_uris,
            today: options.today_or_now(),
            fault: None,
        }
    }

    pub(crate) fn take_fault(&mut self) -> Option<BozoError> {
        self.fault.take()
    }

    /// Handler-set version if any, else the one inferred from namespaces.
    pub(crate) fn effective_version(&self) -> String {
        if !self.version.is_empty() {
            return self.version.clone();
        }
        self.tracker.version().unwrap_or("").to_owned()
    }

    pub(crate) fn track_namespace(&mut self, prefix: &str, uri: &str) {
        self.tracker.track(prefix, uri);
        if self.version.is_empty() {
            if let Some(version) = self.tracker.version() {
                self.version = version.to_owned();
            }
        }
    }

    /// True while buffering literal markup inside `application/xhtml+xml`
    /// inline content.
    fn in_xhtml_content(&self) -> bool {
        self.in_content > 0
            && self
                .content_params
                .as_ref()
                .is_some_and(|params| params.content_type == "application/xhtml+xml")
    }

    /// Append a text piece to the innermost open frame; dropped when no
    /// element is open.
    pub(crate) fn append_text(&mut self, text: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.pieces.push(text.to_owned());
        }
    }

    pub(crate) fn push_frame(&mut self, name: impl Into<String>, expecting_text: bool) {
        self.stack.push(ElementFrame::new(name, expecting_text));
    }

    // ------------------------------------------------------------------
    // Event methods
    // ------------------------------------------------------------------

    fn on_start_element(&mut self, name: &str, attrs: &[(String, String)]) {
        let name = name.trim().to_lowercase();

        // Normalize attributes: lowercase names, lowercase rel/type values
        let attrs: Vec<(String, String)> = attrs
            .iter()
            .map(|(key, value)| {
                let key = key.to_lowercase();
                let value = if key == "rel" || key == "type" {
                    value.to_lowercase()
                } else {
                    value.clone()
                };
                (key, value)
            })
            .collect();

        // Register prefix declarations before resolving this tag's own prefix
        for (key, value) in &attrs {
            if key == "xmlns" {
                self.track_namespace("", value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.track_namespace(prefix, value);
            }
        }

        // xml:base inherits and joins
        if let Some(base) = attr(&attrs, "xml:base") {
            self.base_uri = uri::resolve(&self.base_uri, base);
        }
        self.base_stack.push(self.base_uri.clone());

        // xml:lang: explicit empty string means "no language", absence
        // inherits the parent's
        if let Some(lang) = attr(&attrs, "xml:lang") {
            self.lang = if lang.is_empty() {
                None
            } else {
                Some(lang.to_owned())
            };
        }
        if self.lang.is_some() && FEED_ROOT_TAGS.contains(&name.as_str()) {
            if let Some(lang) = self.lang.clone() {
                self.feed
                    .set("language", crate::model::Value::Text(lang));
            }
        }
        self.lang_stack.push(self.lang.clone());

        // Inline content: markup that claimed to be escaped but turns out to
        // contain real tags is coerced to XHTML, and XHTML tags are buffered
        // as literal text with no handler dispatch
        if self.in_content > 0 {
            if let Some(params) = self.content_params.as_mut() {
                if !params.content_type.ends_with("xml") {
                    params.content_type = "application/xhtml+xml".to_owned();
                }
            }
            if self.in_xhtml_content() {
                let local = name.rsplit(':').next().unwrap_or(&name);
                let mut literal = format!("<{}", local);
                for (key, value) in &attrs {
                    literal.push_str(&format!(" {}=\"{}\"", key, escape_xml_attr(value)));
                }
                literal.push('>');
                self.append_text(&literal);
                self.xhtml_depth += 1;
                return;
            }
        }

        let (prefix, local) = split_qname(&name);
        let key = match self.tracker.dispatch_prefix(prefix) {
            Some("") => local.to_owned(),
            Some(canonical) => format!("{}:{}", canonical, local),
            None if self.strict => {
                self.fatal(BozoError::UndeclaredNamespace(prefix.to_owned()));
                return;
            }
            None => format!("{}:{}", prefix, local),
        };

        // Ill-formed feeds leave image/textinput unclosed; seeing a foreign
        // element clears the dangling flag
        if prefix.is_empty() {
            if self.in_textinput && !TEXTINPUT_CHILDREN.contains(&local) {
                self.in_textinput = false;
            }
            if self.in_image && !IMAGE_CHILDREN.contains(&local) {
                self.in_image = false;
            }
        }

        match handlers::start_handler(&key) {
            Some(handler) => handler(self, &attrs),
            None => self.push_frame(key, true),
        }
    }

    fn on_end_element(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        let (prefix, local) = split_qname(&name);

        // Literal close tags inside XHTML content, until the element that
        // opened the content itself closes
        if self.in_xhtml_content() && self.xhtml_depth > 0 {
            self.xhtml_depth -= 1;
            let literal = format!("</{}>", local);
            self.append_text(&literal);
            self.pop_base_and_lang();
            return;
        }

        let key = match self.tracker.dispatch_prefix(prefix) {
            Some("") => local.to_owned(),
            Some(canonical) => format!("{}:{}", canonical, local),
            None if self.strict => {
                self.fatal(BozoError::UndeclaredNamespace(prefix.to_owned()));
                return;
            }
            None => format!("{}:{}", prefix, local),
        };

        match handlers::end_handler(&key) {
            Some(handler) => handler(self),
            None => {
                self.pop_frame(&key, true);
            }
        }

        self.pop_base_and_lang();
    }

    fn pop_base_and_lang(&mut self) {
        self.base_stack.pop();
        self.base_uri = self
            .base_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.document_base.clone());
        self.lang_stack.pop();
        self.lang = match self.lang_stack.last() {
            Some(lang) => lang.clone(),
            None => self.document_lang.clone(),
        };
    }

    fn on_characters(&mut self, text: &str) {
        if self.stack.is_empty() {
            return;
        }
        if self.in_xhtml_content() {
            self.append_text(&escape_xml_text(text));
        } else {
            self.append_text(text);
        }
    }
}

fn split_qname(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", name),
    }
}

fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_xml_attr(value: &str) -> String {
    escape_xml_text(value).replace('"', "&quot;")
}

impl EventSink for FeedParser {
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        if self.fault.is_none() {
            self.track_namespace(prefix, uri);
        }
    }

    fn start_element(&mut self, name: &str, attrs: &[(String, String)]) {
        if self.fault.is_none() {
            self.on_start_element(name, attrs);
        }
    }

    fn end_element(&mut self, name: &str) {
        if self.fault.is_none() {
            self.on_end_element(name);
        }
    }

    fn characters(&mut self, text: &str) {
        if self.fault.is_none() {
            self.on_characters(text);
        }
    }

    fn cdata(&mut self, text: &str) {
        // CDATA is character data that was never entity-encoded
        self.characters(text);
    }

    fn comment(&mut self, _text: &str) {}

    fn entity_ref(&mut self, name: &str) {
        // Lenient sources hand references through undecoded; they stay
        // literal in the buffer and the post-processor decodes them
        if self.fault.is_none() && !self.stack.is_empty() {
            let literal = format!("&{};", name);
            self.append_text(&literal);
        }
    }

    fn fatal(&mut self, error: BozoError) {
        if self.fault.is_none() {
            tracing::debug!(%error, "fatal parse error");
            self.fault = Some(error);
        }
    }

    fn failed(&self) -> bool {
        self.fault.is_some()
    }
}

/// Read-only view of namespaces observed during the parse.
impl FeedParser {
    pub(crate) fn namespaces(&self) -> BTreeMap<String, String> {
        self.tracker.observed().clone()
    }
}
