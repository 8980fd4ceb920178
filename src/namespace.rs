//! Namespace canonicalization and feed-version inference.
//!
//! Feeds reference the same module namespaces under wildly different
//! prefixes. A fixed table maps every well-known namespace URI to one
//! canonical short prefix, so tag dispatch can key on `dc:date` no matter
//! what the document called the Dublin Core prefix. Declaring certain
//! namespaces is also the only version signal some formats emit (RSS 1.0,
//! Netscape RSS 0.90, Atom 1.0).

use std::collections::BTreeMap;

/// Well-known namespace URI → canonical prefix. An empty prefix means the
/// namespace's elements dispatch by bare local name (the core feed
/// vocabularies). Lookup is case-insensitive over a trimmed URI.
const KNOWN_NAMESPACES: &[(&str, &str)] = &[
    ("", ""),
    ("http://backend.userland.com/rss", ""),
    ("http://blogs.law.harvard.edu/tech/rss", ""),
    ("http://purl.org/rss/1.0/", ""),
    ("http://my.netscape.com/rdf/simple/0.9/", ""),
    ("http://example.com/newformat#", ""),
    ("http://example.com/necho", ""),
    ("http://purl.org/echo/", ""),
    ("uri/of/echo/namespace#", ""),
    ("http://purl.org/pie/", ""),
    ("http://purl.org/atom/ns#", ""),
    ("http://www.w3.org/2005/atom", ""),
    ("http://purl.org/rss/1.0/modules/rss091#", ""),
    ("http://webns.net/mvcb/", "admin"),
    ("http://purl.org/rss/1.0/modules/aggregation/", "ag"),
    ("http://purl.org/rss/1.0/modules/annotate/", "annotate"),
    ("http://media.tangent.org/rss/1.0/", "audio"),
    ("http://backend.userland.com/blogchannelmodule", "blogChannel"),
    ("http://web.resource.org/cc/", "cc"),
    ("http://backend.userland.com/creativecommonsrssmodule", "creativeCommons"),
    ("http://purl.org/rss/1.0/modules/company", "co"),
    ("http://purl.org/rss/1.0/modules/content/", "content"),
    ("http://my.theinfo.org/changed/1.0/rss/", "cp"),
    ("http://purl.org/dc/elements/1.1/", "dc"),
    ("http://purl.org/dc/terms/", "dcterms"),
    ("http://purl.org/rss/1.0/modules/email/", "email"),
    ("http://purl.org/rss/1.0/modules/event/", "ev"),
    ("http://rssnamespace.org/feedburner/ext/1.0", "feedburner"),
    ("http://freshmeat.net/rss/fm/", "fm"),
    ("http://xmlns.com/foaf/0.1/", "foaf"),
    ("http://www.w3.org/2003/01/geo/wgs84_pos#", "geo"),
    ("http://postneo.com/icbm/", "icbm"),
    ("http://purl.org/rss/1.0/modules/image/", "image"),
    ("http://www.itunes.com/dtds/podcast-1.0.dtd", "itunes"),
    ("http://example.com/dtds/podcast-1.0.dtd", "itunes"),
    ("http://purl.org/rss/1.0/modules/link/", "l"),
    ("http://search.yahoo.com/mrss", "media"),
    ("http://search.yahoo.com/mrss/", "media"),
    ("http://madskills.com/public/xml/rss/module/pingback/", "pingback"),
    ("http://prismstandard.org/namespaces/1.2/basic/", "prism"),
    ("http://www.w3.org/1999/02/22-rdf-syntax-ns#", "rdf"),
    ("http://www.w3.org/2000/01/rdf-schema#", "rdfs"),
    ("http://purl.org/rss/1.0/modules/reference/", "ref"),
    ("http://purl.org/rss/1.0/modules/richequiv/", "reqv"),
    ("http://purl.org/rss/1.0/modules/search/", "search"),
    ("http://purl.org/rss/1.0/modules/slash/", "slash"),
    ("http://schemas.xmlsoap.org/soap/envelope/", "soap"),
    ("http://purl.org/rss/1.0/modules/servicestatus/", "ss"),
    ("http://hacks.benhammersley.com/rss/streaming/", "str"),
    ("http://purl.org/rss/1.0/modules/subscription/", "sub"),
    ("http://purl.org/rss/1.0/modules/syndication/", "sy"),
    ("http://purl.org/rss/1.0/modules/taxonomy/", "taxo"),
    ("http://purl.org/rss/1.0/modules/threading/", "thr"),
    ("http://purl.org/rss/1.0/modules/textinput/", "ti"),
    ("http://madskills.com/public/xml/rss/module/trackback/", "trackback"),
    ("http://wellformedweb.org/commentapi/", "wfw"),
    ("http://purl.org/rss/1.0/modules/wiki/", "wiki"),
    ("http://www.w3.org/1999/xhtml", "xhtml"),
    ("http://www.w3.org/1999/xlink", "xlink"),
    ("http://www.w3.org/xml/1998/namespace", "xml"),
];

/// Every `backend.userland.com/rss*` variant collapses to this URI.
const USERLAND_RSS: &str = "http://backend.userland.com/rss";

/// Per-parse namespace state: the document's declared prefixes, the
/// namespaces actually observed (for reporting), and the version inferred
/// from version-defining namespace declarations.
#[derive(Debug, Default)]
pub struct NamespaceTracker {
    /// prefix as declared in the document → namespace URI
    declared: BTreeMap<String, String>,
    /// canonical prefix (or raw prefix when unknown) → namespace URI
    observed: BTreeMap<String, String>,
    /// version inferred from namespace declarations, if any
    version: Option<&'static str>,
}

impl NamespaceTracker {
    pub fn new() -> NamespaceTracker {
        NamespaceTracker::default()
    }

    /// Canonical prefix for a namespace URI, if the URI is well known.
    pub fn canonical_prefix(uri: &str) -> Option<&'static str> {
        let normalized = normalize_uri(uri);
        KNOWN_NAMESPACES
            .iter()
            .find(|(known, _)| *known == normalized)
            .map(|(_, prefix)| *prefix)
    }

    /// Record one prefix declaration (`xmlns`/`xmlns:*`), inferring the feed
    /// version from version-defining URIs. The version is only ever set
    /// once; later declarations never overwrite it.
    pub fn track(&mut self, prefix: &str, uri: &str) {
        let mut uri = uri.trim().to_owned();
        let lowered = uri.to_ascii_lowercase();

        if prefix.is_empty() {
            let inferred = match lowered.as_str() {
                "http://my.netscape.com/rdf/simple/0.9/" => Some("rss090"),
                "http://purl.org/rss/1.0/" => Some("rss10"),
                "http://www.w3.org/2005/atom" => Some("atom10"),
                _ => None,
            };
            if let Some(version) = inferred {
                if self.version.is_none() {
                    tracing::debug!(version, uri = %uri, "version inferred from namespace");
                    self.version = Some(version);
                }
            }
        }

        // Userland served the RSS 2.0 namespace under several spellings
        if lowered.contains("backend.userland.com/rss") {
            uri = USERLAND_RSS.to_owned();
        }

        let key = match Self::canonical_prefix(&uri) {
            Some(canonical) if !canonical.is_empty() => canonical.to_owned(),
            Some(_) => String::new(),
            None => prefix.to_owned(),
        };
        self.observed.insert(key, uri.clone());
        self.declared.insert(prefix.to_owned(), uri);
    }

    /// The URI a document-declared prefix maps to, if declared.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.declared.get(prefix).map(String::as_str)
    }

    /// Map a document prefix to the canonical prefix used for dispatch.
    /// Undeclared prefixes return `None`; declared-but-unknown namespaces
    /// fall back to the raw prefix.
    pub fn dispatch_prefix<'a>(&'a self, prefix: &'a str) -> Option<&'a str> {
        if prefix.is_empty() {
            return Some("");
        }
        // xml: is implicitly declared in every document
        if prefix == "xml" {
            return Some("xml");
        }
        let uri = self.resolve(prefix)?;
        Some(Self::canonical_prefix(uri).unwrap_or(prefix))
    }

    pub fn version(&self) -> Option<&'static str> {
        self.version
    }

    /// The observed-namespace map for `ParseResult.namespaces`.
    pub fn observed(&self) -> &BTreeMap<String, String> {
        &self.observed
    }
}

fn normalize_uri(uri: &str) -> String {
    uri.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rss10_namespace_sets_version() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("", "http://purl.org/rss/1.0/");
        assert_eq!(tracker.version(), Some("rss10"));
    }

    #[test]
    fn test_netscape_namespace_sets_rss090() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("", "http://my.netscape.com/rdf/simple/0.9/");
        assert_eq!(tracker.version(), Some("rss090"));
    }

    #[test]
    fn test_atom_namespace_sets_atom10() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("", "http://www.w3.org/2005/Atom");
        assert_eq!(tracker.version(), Some("atom10"));
    }

    #[test]
    fn test_first_version_wins() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("", "http://my.netscape.com/rdf/simple/0.9/");
        tracker.track("", "http://purl.org/rss/1.0/");
        assert_eq!(tracker.version(), Some("rss090"));
    }

    #[test]
    fn test_prefixed_declaration_does_not_set_version() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("atom", "http://www.w3.org/2005/Atom");
        assert_eq!(tracker.version(), None);
    }

    #[test]
    fn test_userland_variants_normalize() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("rss2", "http://backend.userland.com/rss2");
        assert_eq!(
            tracker.resolve("rss2"),
            Some("http://backend.userland.com/rss")
        );
    }

    #[test]
    fn test_observed_keyed_by_canonical_prefix() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("dublin", "http://purl.org/dc/elements/1.1/");
        assert_eq!(
            tracker.observed().get("dc").map(String::as_str),
            Some("http://purl.org/dc/elements/1.1/")
        );
    }

    #[test]
    fn test_unknown_namespace_keeps_raw_prefix() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("custom", "http://example.org/private-ns");
        assert_eq!(
            tracker.observed().get("custom").map(String::as_str),
            Some("http://example.org/private-ns")
        );
        assert_eq!(tracker.dispatch_prefix("custom"), Some("custom"));
    }

    #[test]
    fn test_dispatch_prefix_canonicalizes() {
        let mut tracker = NamespaceTracker::new();
        tracker.track("dublin", "http://PURL.ORG/dc/elements/1.1/");
        assert_eq!(tracker.dispatch_prefix("dublin"), Some("dc"));
        assert_eq!(tracker.dispatch_prefix("undeclared"), None);
        assert_eq!(tracker.dispatch_prefix(""), Some(""));
    }

    #[test]
    fn test_uri_lookup_is_case_insensitive_and_trimmed() {
        assert_eq!(
            NamespaceTracker::canonical_prefix("  http://purl.org/DC/elements/1.1/  "),
            Some("dc")
        );
    }
}
