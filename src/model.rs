//! Canonical document model produced by a parse.
//!
//! The model is deliberately map-shaped rather than struct-shaped: feeds in
//! the wild carry fields from a dozen module namespaces, and consumers expect
//! to read them under both their modern canonical names and the legacy names
//! older formats used (`guid` for `id`, `modified` for `updated`, and so on).
//! [`Record`] implements that aliasing; everything else here is plain data.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BozoError;

// ============================================================================
// ParseResult
// ============================================================================

/// The result of normalizing one feed document.
///
/// Built once per parse and returned by value; nothing in the crate retains a
/// reference to it afterwards. `bozo` flags a parse that had problems but
/// still produced (possibly partial) output.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    /// Channel-level metadata
    pub feed: Record,
    /// One record per item/entry, in document order
    pub entries: Vec<Record>,
    /// Encoding the document was actually decoded with ("" if undecodable)
    pub encoding: String,
    /// Detected format version ("rss20", "atom10", ...; "" if unknown)
    pub version: String,
    /// True when the parse hit any recoverable problem
    pub bozo: bool,
    /// The captured problem, if any; a fatal strict-pass error takes
    /// precedence over advisory encoding notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bozo_exception: Option<BozoError>,
    /// Namespaces observed in the document, keyed by canonical prefix
    pub namespaces: BTreeMap<String, String>,
    /// Response headers supplied by the caller, passed through verbatim
    pub headers: BTreeMap<String, String>,
    /// HTTP status supplied by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ParseResult {
    /// Legacy accessor: RSS called the feed-level record a channel.
    pub fn channel(&self) -> &Record {
        &self.feed
    }

    /// Legacy accessor: RSS called entries items.
    pub fn items(&self) -> &[Record] {
        &self.entries
    }
}

// ============================================================================
// Record values
// ============================================================================

/// One value slot in a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Flag(bool),
    Detail(ContentBlock),
    Record(Record),
    Links(Vec<Link>),
    Tags(Vec<Tag>),
    Contents(Vec<ContentBlock>),
    Date(FeedDate),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_detail(&self) -> Option<&ContentBlock> {
        match self {
            Value::Detail(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_links(&self) -> Option<&[Link]> {
        match self {
            Value::Links(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_tags(&self) -> Option<&[Tag]> {
        match self {
            Value::Tags(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_contents(&self) -> Option<&[ContentBlock]> {
        match self {
            Value::Contents(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&FeedDate> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }
}

/// A value plus its MIME type, language and base URI, stored beside a scalar
/// field as `<field>_detail`. Atom `content` elements accumulate a list of
/// these under `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentBlock {
    pub value: String,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// A `{term, scheme, label}` classification entry (Atom category, RSS
/// category, `dc:subject`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub term: Option<String>,
    pub scheme: Option<String>,
    pub label: Option<String>,
}

/// A link record: canonical `href`/`rel`/`type` plus whatever other
/// attributes the element carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Link {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Canonical broken-down UTC time: the normalized output of the permissive
/// date parser. `weekday` counts from Monday = 0; `yday` from 1; `isdst` is
/// always 0 because the value is already UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub weekday: u32,
    pub yday: u32,
    pub isdst: u8,
}

impl FeedDate {
    /// Build a date from already-validated UTC calendar fields, deriving
    /// weekday and ordinal day. Returns `None` for impossible dates.
    pub(crate) fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<FeedDate> {
        use chrono::Datelike;
        let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
        if hour > 23 || minute > 59 || second > 60 {
            return None;
        }
        Some(FeedDate {
            year,
            month,
            day,
            hour,
            minute,
            second,
            weekday: date.weekday().num_days_from_monday(),
            yday: date.ordinal(),
            isdst: 0,
        })
    }

    /// The nine fields as one tuple, in struct order.
    pub fn as_tuple(&self) -> (i32, u32, u32, u32, u32, u32, u32, u32, u8) {
        (
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.weekday,
            self.yday,
            self.isdst,
        )
    }
}

// ============================================================================
// Record
// ============================================================================

/// Legacy key → canonical candidates, tried in order. A read through an alias
/// only happens when the alias key itself was never explicitly written:
/// explicit beats derived.
const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("guid", &["id"]),
    ("modified", &["updated"]),
    ("modified_parsed", &["updated_parsed"]),
    ("issued", &["published"]),
    ("issued_parsed", &["published_parsed"]),
    ("date", &["updated"]),
    ("date_parsed", &["updated_parsed"]),
    ("description", &["summary", "subtitle"]),
    ("description_detail", &["summary_detail", "subtitle_detail"]),
    ("tagline", &["subtitle"]),
    ("tagline_detail", &["subtitle_detail"]),
    ("copyright", &["rights"]),
    ("copyright_detail", &["rights_detail"]),
    ("url", &["href"]),
];

/// A key-aliasing associative record: the shape of `feed`, each entry, and
/// the nested `image`/`textinput`/`source`/`*_detail` sub-records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    /// Alias-resolving read. An explicitly-set key always wins; otherwise the
    /// alias table maps legacy names onto their canonical fields.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        for (alias, canonical) in KEY_ALIASES {
            if *alias == key {
                return canonical.iter().find_map(|c| self.values.get(*c));
            }
        }
        None
    }

    /// `get` narrowed to text values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True only when the key itself was written, ignoring aliases.
    pub(crate) fn has_own(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Write only if the key has no explicit value yet.
    pub(crate) fn set_if_absent(&mut self, key: &str, value: Value) {
        if !self.values.contains_key(key) {
            self.values.insert(key.to_owned(), value);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The legacy `category` read: the term of the first tag.
    pub fn category(&self) -> Option<&str> {
        self.get("tags")?
            .as_tags()?
            .first()?
            .term
            .as_deref()
    }

    // --- mutation helpers used while elements close ---

    /// Append a tag unless an identical `{term, scheme, label}` tuple is
    /// already present. A tag with all three fields absent is dropped.
    pub(crate) fn add_tag(
        &mut self,
        term: Option<String>,
        scheme: Option<String>,
        label: Option<String>,
    ) {
        if term.is_none() && scheme.is_none() && label.is_none() {
            return;
        }
        let tag = Tag { term, scheme, label };
        let tags = self
            .values
            .entry("tags".to_owned())
            .or_insert_with(|| Value::Tags(Vec::new()));
        if let Value::Tags(list) = tags {
            if !list.contains(&tag) {
                list.push(tag);
            }
        }
    }

    pub(crate) fn last_tag_mut(&mut self) -> Option<&mut Tag> {
        match self.values.get_mut("tags") {
            Some(Value::Tags(list)) => list.last_mut(),
            _ => None,
        }
    }

    pub(crate) fn add_link(&mut self, link: Link) {
        let links = self
            .values
            .entry("links".to_owned())
            .or_insert_with(|| Value::Links(Vec::new()));
        if let Value::Links(list) = links {
            list.push(link);
        }
    }

    pub(crate) fn last_link_mut(&mut self) -> Option<&mut Link> {
        match self.values.get_mut("links") {
            Some(Value::Links(list)) => list.last_mut(),
            _ => None,
        }
    }

    pub(crate) fn add_content(&mut self, block: ContentBlock) {
        let contents = self
            .values
            .entry("content".to_owned())
            .or_insert_with(|| Value::Contents(Vec::new()));
        if let Value::Contents(list) = contents {
            list.push(block);
        }
    }

    /// Fetch-or-create a nested sub-record (`image`, `textinput`,
    /// `author_detail`, ...).
    pub(crate) fn sub_record(&mut self, key: &str) -> &mut Record {
        let value = self
            .values
            .entry(key.to_owned())
            .or_insert_with(|| Value::Record(Record::new()));
        if !matches!(value, Value::Record(_)) {
            *value = Value::Record(Record::new());
        }
        match value {
            Value::Record(r) => r,
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_read_falls_through_to_canonical() {
        let mut rec = Record::new();
        rec.set("updated", Value::Text("2024-01-01".into()));
        assert_eq!(rec.get_str("modified"), Some("2024-01-01"));
        assert_eq!(rec.get_str("date"), Some("2024-01-01"));
        assert_eq!(rec.get_str("updated"), Some("2024-01-01"));
    }

    #[test]
    fn test_explicit_alias_value_beats_derived() {
        let mut rec = Record::new();
        rec.set("updated", Value::Text("canonical".into()));
        rec.set("modified", Value::Text("explicit".into()));
        assert_eq!(rec.get_str("modified"), Some("explicit"));
        assert_eq!(rec.get_str("updated"), Some("canonical"));
    }

    #[test]
    fn test_description_prefers_summary_over_subtitle() {
        let mut rec = Record::new();
        rec.set("subtitle", Value::Text("sub".into()));
        assert_eq!(rec.get_str("description"), Some("sub"));
        rec.set("summary", Value::Text("sum".into()));
        assert_eq!(rec.get_str("description"), Some("sum"));
    }

    #[test]
    fn test_guid_reads_id() {
        let mut rec = Record::new();
        rec.set("id", Value::Text("urn:x".into()));
        assert_eq!(rec.get_str("guid"), Some("urn:x"));
    }

    #[test]
    fn test_add_tag_deduplicates_full_tuple() {
        let mut rec = Record::new();
        rec.add_tag(Some("x".into()), Some("y".into()), Some("z".into()));
        rec.add_tag(Some("x".into()), Some("y".into()), Some("z".into()));
        assert_eq!(rec.get("tags").unwrap().as_tags().unwrap().len(), 1);

        // A differing scheme is a different tag
        rec.add_tag(Some("x".into()), None, Some("z".into()));
        assert_eq!(rec.get("tags").unwrap().as_tags().unwrap().len(), 2);
    }

    #[test]
    fn test_add_tag_ignores_fully_empty_tuple() {
        let mut rec = Record::new();
        rec.add_tag(None, None, None);
        assert!(rec.get("tags").is_none());
    }

    #[test]
    fn test_tag_insertion_order_preserved() {
        let mut rec = Record::new();
        rec.add_tag(Some("b".into()), None, None);
        rec.add_tag(Some("a".into()), None, None);
        let tags = rec.get("tags").unwrap().as_tags().unwrap().to_vec();
        assert_eq!(tags[0].term.as_deref(), Some("b"));
        assert_eq!(tags[1].term.as_deref(), Some("a"));
    }

    #[test]
    fn test_category_reads_first_tag_term() {
        let mut rec = Record::new();
        assert_eq!(rec.category(), None);
        rec.add_tag(Some("tech".into()), None, None);
        rec.add_tag(Some("biz".into()), None, None);
        assert_eq!(rec.category(), Some("tech"));
    }

    #[test]
    fn test_feed_date_derives_weekday_and_yday() {
        // 2024-01-01 was a Monday
        let d = FeedDate::from_ymd_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(d.as_tuple(), (2024, 1, 1, 0, 0, 0, 0, 1, 0));

        // 2004-02-29 existed; 2003-02-29 did not
        assert!(FeedDate::from_ymd_hms(2004, 2, 29, 12, 0, 0).is_some());
        assert!(FeedDate::from_ymd_hms(2003, 2, 29, 12, 0, 0).is_none());
    }

    #[test]
    fn test_url_aliases_href() {
        let mut rec = Record::new();
        rec.set("href", Value::Text("http://example.com/".into()));
        assert_eq!(rec.get_str("url"), Some("http://example.com/"));
    }
}
