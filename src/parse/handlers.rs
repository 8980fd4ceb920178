//! Per-tag dispatch.
//!
//! The state machine resolves each tag to a `(canonical prefix, local name)`
//! key and looks it up here. Alias keys share one handler arm: `modified`,
//! `dc:date` and `lastBuildDate` are all the same `updated` field, and the
//! frames they push carry the canonical name so the close path stores under
//! one key. Tags with no entry fall back to a generic text frame.

use crate::model::{Link, Record, Value};
use crate::uri;

use super::machine::FeedParser;
use super::state::{attr, map_content_type};

pub(super) type StartHandler = fn(&mut FeedParser, &[(String, String)]);
pub(super) type EndHandler = fn(&mut FeedParser);

pub(super) fn start_handler(key: &str) -> Option<StartHandler> {
    Some(match key {
        "rss" => start_rss,
        "channel" => start_channel,
        "feed" => start_feed,
        "item" | "entry" => start_item,
        "image" => start_image,
        "textinput" => start_textinput,
        "author" | "managingeditor" | "dc:creator" | "itunes:author" => start_author,
        "contributor" | "dc:contributor" => start_contributor,
        "webmaster" | "dc:publisher" | "itunes:owner" => start_publisher,
        "name" => start_name,
        "url" | "uri" | "homepage" => start_url,
        "email" | "itunes:email" => start_email,
        "title" | "dc:title" | "media:title" => start_title,
        "subtitle" | "tagline" | "itunes:subtitle" => start_subtitle,
        "description" | "dc:description" | "abstract" => start_description,
        "summary" | "itunes:summary" => start_summary,
        "rights" | "copyright" | "dc:rights" => start_rights,
        "info" | "feedburner:browserfriendly" => start_info,
        "generator" => start_generator,
        "admin:generatoragent" => start_admin_generator_agent,
        "admin:errorreportsto" => start_admin_error_reports_to,
        "id" => start_id,
        "guid" => start_guid,
        "link" => start_link,
        "updated" | "modified" | "lastbuilddate" | "dc:date" | "dcterms:modified" => start_updated,
        "published" | "pubdate" | "issued" | "dcterms:issued" => start_published,
        "created" | "dcterms:created" => start_created,
        "expirationdate" => start_expired,
        "category" | "dc:subject" | "itunes:category" => start_category,
        "enclosure" => start_enclosure,
        "source" => start_source,
        "content" => start_content,
        "content:encoded" | "fullitem" => start_content_encoded,
        "body" | "xhtml:body" => start_body,
        "itunes:explicit" => start_itunes_explicit,
        "itunes:image" => start_itunes_image,
        "cc:license" => start_cc_license,
        "creativecommons:license" => start_creativecommons_license,
        "dc:language" => start_dc_language,
        _ => return None,
    })
}

pub(super) fn end_handler(key: &str) -> Option<EndHandler> {
    Some(match key {
        "channel" | "feed" => end_channel,
        "item" | "entry" => end_item,
        "image" => end_image,
        "textinput" => end_textinput,
        "author" | "managingeditor" | "dc:creator" | "itunes:author" => end_author,
        "contributor" | "dc:contributor" => end_contributor,
        "webmaster" | "dc:publisher" | "itunes:owner" => end_publisher,
        "name" => end_name,
        "url" | "uri" | "homepage" => end_url,
        "email" | "itunes:email" => end_email,
        "title" | "dc:title" | "media:title" => end_title,
        "subtitle" | "tagline" | "itunes:subtitle" => end_subtitle,
        "description" | "dc:description" | "abstract" => end_description,
        "summary" | "itunes:summary" => end_summary,
        "rights" | "copyright" | "dc:rights" => end_rights,
        "info" | "feedburner:browserfriendly" => end_info,
        "generator" => end_generator,
        "id" => end_id,
        "guid" => end_guid,
        "link" => end_link,
        "updated" | "modified" | "lastbuilddate" | "dc:date" | "dcterms:modified" => end_updated,
        "published" | "pubdate" | "issued" | "dcterms:issued" => end_published,
        "created" | "dcterms:created" => end_created,
        "expirationdate" => end_expired,
        "category" | "dc:subject" | "itunes:category" => end_category,
        "source" => end_source,
        "content" | "content:encoded" | "fullitem" => end_content,
        "body" | "xhtml:body" => end_content,
        "itunes:explicit" => end_itunes_explicit,
        "creativecommons:license" => end_creativecommons_license,
        "dc:language" => end_dc_language,
        _ => return None,
    })
}

// ============================================================================
// Document roots and version detection
// ============================================================================

fn start_rss(parser: &mut FeedParser, attrs: &[(String, String)]) {
    if !parser.version.is_empty() {
        return;
    }
    let declared = attr(attrs, "version").unwrap_or("");
    parser.version = if declared.starts_with("2.") {
        "rss20".to_owned()
    } else {
        match declared {
            "0.90" => "rss090",
            "0.91" => "rss091u",
            "0.92" => "rss092",
            "0.93" => "rss093",
            "0.94" => "rss094",
            _ => "rss",
        }
        .to_owned()
    };
}

fn start_channel(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.in_feed = true;
    cdf_common(parser, attrs);
}

fn end_channel(parser: &mut FeedParser) {
    parser.in_feed = false;
}

fn start_feed(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.in_feed = true;
    if parser.version.is_empty() {
        parser.version = match attr(attrs, "version") {
            Some("0.1") => "atom01",
            Some("0.2") => "atom02",
            Some("0.3") => "atom03",
            _ => "atom",
        }
        .to_owned();
    }
}

/// CDF roots carry their metadata as attributes: `LASTMOD` maps onto
/// `updated`, `HREF` onto `id`.
fn cdf_common(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let lastmod = attr(attrs, "lastmod").map(str::to_owned);
    let href = attr(attrs, "href").map(str::to_owned);
    if parser.version.is_empty() && (lastmod.is_some() || href.is_some()) {
        parser.version = "cdf".to_owned();
    }
    if let Some(lastmod) = lastmod {
        parser.push_frame("updated", true);
        parser.append_text(&lastmod);
        parser.pop_date("updated");
    }
    if let Some(href) = href {
        parser.push_frame("id", true);
        parser.append_text(&href);
        parser.pop_frame("id", true);
    }
}

// ============================================================================
// Entries
// ============================================================================

fn start_item(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.entries.push(Record::new());
    parser.in_entry = true;
    parser.guid_is_link = false;
    parser.push_frame("item", false);
    cdf_common(parser, attrs);
}

fn end_item(parser: &mut FeedParser) {
    parser.pop_frame("item", true);
    parser.in_entry = false;
}

// ============================================================================
// Structural sub-records: image, textinput, source
// ============================================================================

fn start_image(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.in_image = true;
    parser.feed.sub_record("image");
    parser.push_frame("image", false);
}

fn end_image(parser: &mut FeedParser) {
    parser.pop_frame("image", true);
    parser.in_image = false;
}

fn start_textinput(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.in_textinput = true;
    parser.feed.sub_record("textinput");
    parser.push_frame("textinput", false);
}

fn end_textinput(parser: &mut FeedParser) {
    parser.pop_frame("textinput", true);
    parser.in_textinput = false;
}

fn start_source(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.in_source = true;
    parser.source = Record::new();
    if let Some(url) = attr(attrs, "url") {
        let resolved = uri::resolve(&parser.base_uri, url);
        parser.source.set("href", Value::Text(resolved));
    }
    parser.push_frame("source", false);
}

fn end_source(parser: &mut FeedParser) {
    // RSS puts the source title in element text; Atom nests child elements,
    // which land in `source` directly through context selection
    let title = parser.pop_frame("source", true);
    parser.in_source = false;
    if let Some(title) = title {
        if !title.is_empty() {
            parser.source.set("title", Value::Text(title));
        }
    }
    let record = std::mem::take(&mut parser.source);
    if !record.is_empty() {
        parser.store("source", Value::Record(record));
    }
}

// ============================================================================
// People
// ============================================================================

fn start_author(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.in_author = true;
    parser.push_frame("author", true);
}

fn end_author(parser: &mut FeedParser) {
    parser.pop_frame("author", true);
    parser.in_author = false;
    parser.sync_person("author");
}

fn start_contributor(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.in_contributor = true;
    parser.push_frame("contributor", false);
}

fn end_contributor(parser: &mut FeedParser) {
    parser.pop_frame("contributor", true);
    parser.in_contributor = false;
}

fn start_publisher(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.in_publisher = true;
    parser.push_frame("publisher", true);
}

fn end_publisher(parser: &mut FeedParser) {
    parser.pop_frame("publisher", true);
    parser.in_publisher = false;
    parser.sync_person("publisher");
}

fn start_name(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("name", false);
}

fn end_name(parser: &mut FeedParser) {
    let Some(value) = parser.pop_frame("name", true) else {
        return;
    };
    if parser.in_author {
        parser.save_person("author", "name", value);
    } else if parser.in_contributor {
        parser.save_person("contributor", "name", value);
    } else if parser.in_publisher {
        parser.save_person("publisher", "name", value);
    } else if parser.in_textinput {
        parser.store("name", Value::Text(value));
    }
}

fn start_url(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("href", true);
}

fn end_url(parser: &mut FeedParser) {
    let Some(value) = parser.pop_frame("href", true) else {
        return;
    };
    if parser.in_author {
        parser.save_person("author", "href", value);
    } else if parser.in_contributor {
        parser.save_person("contributor", "href", value);
    } else if parser.in_publisher {
        parser.save_person("publisher", "href", value);
    } else if parser.in_textinput {
        parser.store("link", Value::Text(value));
    }
}

fn start_email(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("email", false);
}

fn end_email(parser: &mut FeedParser) {
    let Some(value) = parser.pop_frame("email", true) else {
        return;
    };
    if parser.in_author {
        parser.save_person("author", "email", value);
    } else if parser.in_contributor {
        parser.save_person("contributor", "email", value);
    } else if parser.in_publisher {
        parser.save_person("publisher", "email", value);
    }
}

// ============================================================================
// Text constructs
// ============================================================================

/// Text constructs only store when some context is open to receive them.
fn expecting_text(parser: &FeedParser) -> bool {
    parser.in_feed || parser.in_entry || parser.in_source
}

fn start_title(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let expecting = expecting_text(parser) || parser.in_image || parser.in_textinput;
    parser.push_content("title", attrs, "text/plain", expecting);
}

fn end_title(parser: &mut FeedParser) {
    parser.pop_content("title");
}

fn start_subtitle(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_content("subtitle", attrs, "text/plain", true);
}

fn end_subtitle(parser: &mut FeedParser) {
    parser.pop_content("subtitle");
}

fn start_rights(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_content("rights", attrs, "text/plain", true);
}

fn end_rights(parser: &mut FeedParser) {
    parser.pop_content("rights");
}

fn start_info(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_content("info", attrs, "text/plain", true);
}

fn end_info(parser: &mut FeedParser) {
    parser.pop_content("info");
}

fn start_description(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let has_summary = parser
        .context()
        .map(|context| context.has_own("summary"))
        .unwrap_or(false);
    if has_summary {
        // A second summary-ish element demotes to content
        parser.summary_as_content = true;
        start_content(parser, attrs);
    } else {
        let expecting = expecting_text(parser) || parser.in_image || parser.in_textinput;
        parser.push_content("description", attrs, "text/html", expecting);
    }
}

fn end_description(parser: &mut FeedParser) {
    if parser.summary_as_content {
        parser.summary_as_content = false;
        end_content(parser);
    } else {
        parser.pop_content("description");
    }
}

fn start_summary(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let has_summary = parser
        .context()
        .map(|context| context.has_own("summary"))
        .unwrap_or(false);
    if has_summary {
        parser.summary_as_content = true;
        start_content(parser, attrs);
    } else {
        parser.push_content("summary", attrs, "text/plain", true);
    }
}

fn end_summary(parser: &mut FeedParser) {
    if parser.summary_as_content {
        parser.summary_as_content = false;
        end_content(parser);
    } else {
        parser.pop_content("summary");
    }
}

// ============================================================================
// Generator
// ============================================================================

fn start_generator(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let href = attr(attrs, "url")
        .or_else(|| attr(attrs, "uri"))
        .or_else(|| attr(attrs, "href"))
        .map(|href| uri::resolve(&parser.base_uri, href));
    let version = attr(attrs, "version").map(str::to_owned);
    if href.is_some() || version.is_some() {
        if let Some(context) = parser.context_mut() {
            let detail = context.sub_record("generator_detail");
            if let Some(href) = href {
                detail.set("href", Value::Text(href));
            }
            if let Some(version) = version {
                detail.set("version", Value::Text(version));
            }
        }
    }
    parser.push_frame("generator", true);
}

fn end_generator(parser: &mut FeedParser) {
    let Some(value) = parser.pop_frame("generator", true) else {
        return;
    };
    if value.is_empty() {
        return;
    }
    if let Some(context) = parser.context_mut() {
        if context.has_own("generator_detail") {
            context
                .sub_record("generator_detail")
                .set("name", Value::Text(value));
        }
    }
}

fn start_admin_generator_agent(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_frame("generator", true);
    if let Some(resource) = attr(attrs, "rdf:resource") {
        parser.append_text(resource);
    }
    parser.pop_frame("generator", true);
    if let Some(resource) = attr(attrs, "rdf:resource") {
        let resolved = uri::resolve(&parser.base_uri, resource);
        if let Some(context) = parser.context_mut() {
            context
                .sub_record("generator_detail")
                .set("href", Value::Text(resolved));
        }
    }
}

fn start_admin_error_reports_to(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_frame("errorreportsto", true);
    if let Some(resource) = attr(attrs, "rdf:resource") {
        parser.append_text(resource);
    }
    parser.pop_frame("errorreportsto", true);
}

// ============================================================================
// Identity and links
// ============================================================================

fn start_id(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("id", true);
}

fn end_id(parser: &mut FeedParser) {
    parser.pop_frame("id", true);
}

fn start_guid(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.guid_is_link = attr(attrs, "ispermalink").map(|v| v != "false").unwrap_or(true);
    parser.push_frame("id", true);
}

fn end_guid(parser: &mut FeedParser) {
    let Some(value) = parser.pop_frame("id", true) else {
        return;
    };
    let has_link = parser
        .context()
        .map(|context| context.has_own("link"))
        .unwrap_or(false);
    let guid_is_link = parser.guid_is_link && !has_link;
    parser.store("guidislink", Value::Flag(guid_is_link));
    if guid_is_link && !value.is_empty() {
        parser.store_if_absent("link", Value::Text(value));
    }
}

fn start_link(parser: &mut FeedParser, attrs: &[(String, String)]) {
    match attr(attrs, "href") {
        Some(href) => {
            let resolved = uri::resolve(&parser.base_uri, href);
            let mut link = Link {
                href: resolved.clone(),
                rel: Some("alternate".to_owned()),
                mime_type: Some("text/html".to_owned()),
                ..Default::default()
            };
            for (key, value) in attrs {
                match key.as_str() {
                    "href" => {}
                    "rel" => link.rel = Some(value.clone()),
                    "type" => link.mime_type = Some(value.clone()),
                    "title" => link.title = Some(value.clone()),
                    "length" => link.length = Some(value.clone()),
                    other => {
                        link.extra.insert(other.to_owned(), value.clone());
                    }
                }
            }
            let alternate = link.rel.as_deref() == Some("alternate");
            if let Some(context) = parser.context_mut() {
                context.add_link(link);
                if alternate {
                    context.set("link", Value::Text(resolved));
                }
            }
        }
        // Bare RSS-style link: the text is the URL
        None => parser.push_frame("link", expecting_text(parser) || parser.in_textinput),
    }
}

fn end_link(parser: &mut FeedParser) {
    parser.pop_frame("link", true);
}

// ============================================================================
// Dates
// ============================================================================

fn start_updated(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("updated", true);
}

fn end_updated(parser: &mut FeedParser) {
    parser.pop_date("updated");
}

fn start_published(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("published", true);
}

fn end_published(parser: &mut FeedParser) {
    parser.pop_date("published");
}

fn start_created(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("created", true);
}

fn end_created(parser: &mut FeedParser) {
    parser.pop_date("created");
}

fn start_expired(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("expired", true);
}

fn end_expired(parser: &mut FeedParser) {
    parser.pop_date("expired");
}

// ============================================================================
// Categories
// ============================================================================

fn start_category(parser: &mut FeedParser, attrs: &[(String, String)]) {
    // Atom uses term/scheme/label; RSS puts the scheme in `domain`; iTunes
    // puts the term in `text`
    let term = attr(attrs, "term")
        .or_else(|| attr(attrs, "text"))
        .map(str::to_owned);
    let scheme = attr(attrs, "scheme")
        .or_else(|| attr(attrs, "domain"))
        .map(str::to_owned);
    let label = attr(attrs, "label").map(str::to_owned);
    parser.add_tag(term, scheme, label);
    parser.push_frame("category", true);
}

fn end_category(parser: &mut FeedParser) {
    parser.close_category();
}

// ============================================================================
// Enclosures and inline content
// ============================================================================

fn start_enclosure(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let Some(href) = attr(attrs, "url").or_else(|| attr(attrs, "href")) else {
        return;
    };
    let link = Link {
        href: uri::resolve(&parser.base_uri, href),
        rel: Some("enclosure".to_owned()),
        mime_type: attr(attrs, "type").map(str::to_owned),
        length: attr(attrs, "length").map(str::to_owned),
        ..Default::default()
    };
    if let Some(context) = parser.context_mut() {
        context.add_link(link);
    }
}

fn start_content(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_content("content", attrs, "text/plain", true);
}

fn start_content_encoded(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_content("content", attrs, "text/html", true);
}

fn start_body(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_content("content", attrs, "application/xhtml+xml", true);
}

fn end_content(parser: &mut FeedParser) {
    let copy_to_summary = parser
        .content_params
        .as_ref()
        .map(|params| {
            let mapped = map_content_type(&params.content_type);
            matches!(
                mapped.as_str(),
                "text/plain" | "text/html" | "application/xhtml+xml"
            )
        })
        .unwrap_or(false);
    let value = parser.pop_content("content");
    if copy_to_summary {
        if let Some(value) = value {
            if !value.is_empty() {
                parser.store_if_absent("summary", Value::Text(value));
            }
        }
    }
}

// ============================================================================
// Module namespaces: iTunes, licensing, Dublin Core odds and ends
// ============================================================================

fn start_itunes_explicit(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("itunes_explicit", false);
}

fn end_itunes_explicit(parser: &mut FeedParser) {
    let Some(value) = parser.pop_frame("itunes_explicit", true) else {
        return;
    };
    let explicit = matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "explicit" | "true"
    );
    parser.store("itunes_explicit", Value::Flag(explicit));
}

fn start_itunes_image(parser: &mut FeedParser, attrs: &[(String, String)]) {
    let Some(href) = attr(attrs, "href") else {
        return;
    };
    let resolved = uri::resolve(&parser.base_uri, href);
    if let Some(context) = parser.context_mut() {
        context.sub_record("image").set("href", Value::Text(resolved));
    }
}

fn start_cc_license(parser: &mut FeedParser, attrs: &[(String, String)]) {
    parser.push_frame("license", true);
    if let Some(resource) = attr(attrs, "rdf:resource") {
        parser.append_text(resource);
    }
    parser.pop_frame("license", true);
}

fn start_creativecommons_license(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("license", true);
}

fn end_creativecommons_license(parser: &mut FeedParser) {
    parser.pop_frame("license", true);
}

fn start_dc_language(parser: &mut FeedParser, _attrs: &[(String, String)]) {
    parser.push_frame("language", true);
}

fn end_dc_language(parser: &mut FeedParser) {
    parser.pop_frame("language", true);
}
