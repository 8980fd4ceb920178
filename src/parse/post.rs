//! Content post-processing: everything that happens when a frame pops.
//!
//! Joining buffered text, base64 decoding, relative-URI resolution, lenient
//! entity decoding, in-markup URI rewriting, sanitization and finally storage
//! into the active context, in that order. Also home to the person
//! (author/contributor/publisher) bookkeeping and the tag/category merge.

use base64::Engine;

use crate::dates;
use crate::model::{ContentBlock, Record, Value};
use crate::sanitize;
use crate::uri;

use super::machine::FeedParser;
use super::state::{map_content_type, ContentParams};

/// Elements whose text value may itself be a relative URI.
const CAN_BE_RELATIVE_URI: &[&str] = &[
    "link",
    "id",
    "wfw:comment",
    "wfw:commentrss",
    "docs",
    "url",
    "href",
    "comments",
    "license",
    "icon",
    "logo",
];

/// Elements whose HTML-typed values may embed relative references, and are
/// risky enough to sanitize.
const CAN_CONTAIN_MARKUP: &[&str] = &[
    "content",
    "title",
    "summary",
    "info",
    "tagline",
    "subtitle",
    "copyright",
    "rights",
    "description",
];

const HTML_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

impl FeedParser {
    // ------------------------------------------------------------------
    // Context selection
    // ------------------------------------------------------------------

    /// The record that element closes currently write into:
    /// source > image/textinput > entry > feed. No context means the write
    /// is discarded.
    pub(crate) fn context_mut(&mut self) -> Option<&mut Record> {
        if self.in_source {
            Some(&mut self.source)
        } else if self.in_image {
            Some(self.feed.sub_record("image"))
        } else if self.in_textinput {
            Some(self.feed.sub_record("textinput"))
        } else if self.in_entry {
            self.entries.last_mut()
        } else if self.in_feed {
            Some(&mut self.feed)
        } else {
            None
        }
    }

    pub(crate) fn context(&self) -> Option<&Record> {
        if self.in_source {
            Some(&self.source)
        } else if self.in_image {
            self.feed.get("image").and_then(Value::as_record)
        } else if self.in_textinput {
            self.feed.get("textinput").and_then(Value::as_record)
        } else if self.in_entry {
            self.entries.last()
        } else if self.in_feed {
            Some(&self.feed)
        } else {
            None
        }
    }

    pub(crate) fn store(&mut self, key: &str, value: Value) {
        if let Some(context) = self.context_mut() {
            context.set(key, value);
        }
    }

    pub(crate) fn store_if_absent(&mut self, key: &str, value: Value) {
        if let Some(context) = self.context_mut() {
            context.set_if_absent(key, value);
        }
    }

    // ------------------------------------------------------------------
    // Inline content frames
    // ------------------------------------------------------------------

    pub(crate) fn push_content(
        &mut self,
        tag: &str,
        attrs: &[(String, String)],
        default_type: &str,
        expecting_text: bool,
    ) {
        let declared = super::state::attr(attrs, "type").unwrap_or(default_type);
        let content_type = map_content_type(declared);
        let src = super::state::attr(attrs, "src").map(|src| uri::resolve(&self.base_uri, src));
        self.in_content += 1;
        self.content_params = Some(ContentParams {
            base64: super::state::is_base64(super::state::attr(attrs, "mode"), &content_type),
            content_type,
            language: self.lang.clone(),
            base: self.base_uri.clone(),
            src,
        });
        self.push_frame(tag, expecting_text);
    }

    pub(crate) fn pop_content(&mut self, tag: &str) -> Option<String> {
        let matched = self
            .stack
            .last()
            .map(|frame| frame.name == tag)
            .unwrap_or(false);
        let value = self.pop_frame(tag, true);
        if matched {
            self.in_content = self.in_content.saturating_sub(1);
            self.content_params = None;
        }
        value
    }

    // ------------------------------------------------------------------
    // The post-processor proper
    // ------------------------------------------------------------------

    /// Pop the innermost frame if it matches `element` and run the stored
    /// value through the processing pipeline. A name mismatch (stray close
    /// tag) is a no-op.
    pub(crate) fn pop_frame(&mut self, element: &str, strip_whitespace: bool) -> Option<String> {
        if self
            .stack
            .last()
            .map(|frame| frame.name != element)
            .unwrap_or(true)
        {
            return None;
        }
        let frame = self.stack.pop()?;
        let mut output = frame.pieces.concat();
        if strip_whitespace {
            output = output.trim().to_owned();
        }

        // Structural frames yield their text to the caller without storing
        if !frame.expecting_text {
            return Some(output);
        }

        let base64_content = self
            .content_params
            .as_ref()
            .map(|params| params.base64)
            .unwrap_or(false);
        if base64_content {
            let compact: String = output.split_whitespace().collect();
            match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
                Ok(decoded) if !decoded.is_empty() => {
                    if let Ok(text) = String::from_utf8(decoded) {
                        output = text;
                    }
                }
                // Undecodable or empty: silently keep the original text
                _ => {}
            }
        }

        if CAN_BE_RELATIVE_URI.contains(&element) && !output.is_empty() {
            output = uri::resolve(&self.base_uri, &output);
        }

        if !base64_content && !self.strict {
            output = self.decode_entities(&output);
        }

        // The transient mode/base64 params die with the frame; type,
        // language and base survive into any detail block built below
        let params = self.content_params.clone();
        let content_type = map_content_type(
            params
                .as_ref()
                .map(|p| p.content_type.as_str())
                .unwrap_or("text/html"),
        );

        if HTML_TYPES.contains(&content_type.as_str()) && CAN_CONTAIN_MARKUP.contains(&element) {
            if self.resolve_relative_uris && !self.base_uri.is_empty() {
                output = sanitize::resolve_relative_references(&output, &self.base_uri);
            }
            if self.sanitize_html {
                output = sanitize::sanitize_html(
                    &output,
                    content_type == "application/xhtml+xml",
                );
            }
        }

        // Working text is UTF-8 end to end; no conversion step remains here

        // `category` values are merged by the tag machinery, not stored
        if element == "category" {
            return Some(output);
        }

        if element == "content" {
            if !output.is_empty() || params.as_ref().is_some_and(|p| p.src.is_some()) {
                let block = content_block(params.as_ref(), &content_type, output.clone());
                if let Some(context) = self.context_mut() {
                    context.add_content(block);
                }
            }
            return Some(output);
        }

        if element == "link" {
            if !output.is_empty() {
                if let Some(context) = self.context_mut() {
                    context.set("link", Value::Text(output.clone()));
                    if let Some(link) = context.last_link_mut() {
                        link.href = output.clone();
                    }
                }
            }
            return Some(output);
        }

        let store_name = if element == "description" {
            "summary"
        } else {
            element
        };
        let store_key = store_name.replace(':', "_");
        let detail = (self.in_content > 0)
            .then(|| content_block(params.as_ref(), &content_type, output.clone()));
        if let Some(context) = self.context_mut() {
            context.set(store_key.clone(), Value::Text(output.clone()));
            if let Some(detail) = detail {
                context.set(format!("{}_detail", store_key), Value::Detail(detail));
            }
        }
        Some(output)
    }

    /// Lenient drivers leave entity references in the buffer; decode them
    /// once for non-XML content. XHTML buffers were escaped during literal
    /// echo and must stay exactly as built.
    fn decode_entities(&self, text: &str) -> String {
        let xmlish = self
            .content_params
            .as_ref()
            .map(|params| params.content_type.ends_with("xml"))
            .unwrap_or(false);
        if xmlish {
            return text.to_owned();
        }
        html_escape::decode_html_entities(text).into_owned()
    }

    // ------------------------------------------------------------------
    // Dates
    // ------------------------------------------------------------------

    /// Pop a date-bearing frame: the raw text stores under `field` via the
    /// generic path, and a successful parse additionally stores
    /// `<field>_parsed`. A date nothing understands is simply absent.
    pub(crate) fn pop_date(&mut self, field: &str) {
        let Some(value) = self.pop_frame(field, true) else {
            return;
        };
        if value.is_empty() {
            return;
        }
        let Some(parsed) = dates::parse_date_at(&value, self.today) else {
            return;
        };
        let key = format!("{}_parsed", field);
        self.store(&key, Value::Date(parsed));
    }

    // ------------------------------------------------------------------
    // People
    // ------------------------------------------------------------------

    /// Store one field of a person sub-record (`author_detail` and friends)
    /// and re-derive the combined scalar.
    pub(crate) fn save_person(&mut self, role: &str, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        let detail_key = format!("{}_detail", role);
        if let Some(context) = self.context_mut() {
            context
                .sub_record(&detail_key)
                .set(key, Value::Text(value));
        }
        self.sync_person(role);
    }

    /// Keep the scalar and `_detail` forms of a person in step: a detail
    /// record derives the scalar ("name (email)"), a bare scalar is split
    /// back into a detail record.
    pub(crate) fn sync_person(&mut self, role: &str) {
        let detail_key = format!("{}_detail", role);
        let Some(context) = self.context_mut() else {
            return;
        };
        let detail = context
            .get(&detail_key)
            .and_then(Value::as_record)
            .map(|record| {
                (
                    record.get_str("name").map(str::to_owned),
                    record.get_str("email").map(str::to_owned),
                )
            });
        match detail {
            Some((name, email)) => {
                let combined = match (name, email) {
                    (Some(name), Some(email)) => format!("{} ({})", name, email),
                    (Some(name), None) => name,
                    (None, Some(email)) => email,
                    (None, None) => return,
                };
                context.set(role.to_owned(), Value::Text(combined));
            }
            None => {
                let Some(scalar) = context.get_str(role).map(str::to_owned) else {
                    return;
                };
                let (name, email) = split_person(&scalar);
                if name.is_none() && email.is_none() {
                    return;
                }
                // The scalar keeps just the human part once the email is
                // split out
                if let Some(name) = &name {
                    context.set(role.to_owned(), Value::Text(name.clone()));
                } else if let Some(email) = &email {
                    context.set(role.to_owned(), Value::Text(email.clone()));
                }
                let record = context.sub_record(&detail_key);
                if let Some(name) = name {
                    record.set("name", Value::Text(name));
                }
                if let Some(email) = email {
                    record.set("email", Value::Text(email));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    pub(crate) fn add_tag(
        &mut self,
        term: Option<String>,
        scheme: Option<String>,
        label: Option<String>,
    ) {
        if let Some(context) = self.context_mut() {
            context.add_tag(term, scheme, label);
        }
    }

    /// The close-of-`category` merge: non-empty text backfills the newest
    /// term-less tag, otherwise it becomes a tag of its own.
    pub(crate) fn close_category(&mut self) {
        let value = self.pop_frame("category", true).unwrap_or_default();
        if value.is_empty() {
            return;
        }
        if let Some(context) = self.context_mut() {
            if let Some(last) = context.last_tag_mut() {
                if last.term.is_none() {
                    last.term = Some(value);
                    return;
                }
            }
            context.add_tag(Some(value), None, None);
        }
    }
}

fn content_block(
    params: Option<&ContentParams>,
    content_type: &str,
    value: String,
) -> ContentBlock {
    ContentBlock {
        value,
        content_type: content_type.to_owned(),
        language: params.and_then(|p| p.language.clone()),
        base: params.map(|p| p.base.clone()).unwrap_or_default(),
        src: params.and_then(|p| p.src.clone()),
    }
}

/// Split "John Doe (john@example.com)" or "john@example.com (John Doe)"
/// into name and email; a bare value is classified by the presence of '@'.
fn split_person(value: &str) -> (Option<String>, Option<String>) {
    if let Some(open) = value.find('(') {
        if value.ends_with(')') {
            let outer = value[..open].trim();
            let inner = value[open + 1..value.len() - 1].trim();
            if inner.contains('@') {
                return (non_empty(outer), non_empty(inner));
            }
            if outer.contains('@') {
                return (non_empty(inner), non_empty(outer));
            }
        }
    }
    if value.contains('@') {
        (None, non_empty(value))
    } else {
        (non_empty(value), None)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_person_name_then_email() {
        assert_eq!(
            split_person("John Doe (john@example.com)"),
            (
                Some("John Doe".to_owned()),
                Some("john@example.com".to_owned())
            )
        );
    }

    #[test]
    fn test_split_person_email_then_name() {
        assert_eq!(
            split_person("john@example.com (John Doe)"),
            (
                Some("John Doe".to_owned()),
                Some("john@example.com".to_owned())
            )
        );
    }

    #[test]
    fn test_split_person_bare_forms() {
        assert_eq!(
            split_person("john@example.com"),
            (None, Some("john@example.com".to_owned()))
        );
        assert_eq!(split_person("John Doe"), (Some("John Doe".to_owned()), None));
    }
}
