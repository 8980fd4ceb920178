//! Per-parse mutable state carried by the tag state machine.

/// One open element: its dispatch name, whether its text is wanted, and the
/// buffered text pieces accumulated so far. Created on element open, consumed
/// and discarded on the matching close.
#[derive(Debug)]
pub(crate) struct ElementFrame {
    pub name: String,
    pub expecting_text: bool,
    pub pieces: Vec<String>,
}

impl ElementFrame {
    pub fn new(name: impl Into<String>, expecting_text: bool) -> ElementFrame {
        ElementFrame {
            name: name.into(),
            expecting_text,
            pieces: Vec::new(),
        }
    }
}

/// Parameters of the inline content element currently open, captured at its
/// start tag. `base64` is transient and dropped before the value is stored.
#[derive(Debug, Clone)]
pub(crate) struct ContentParams {
    pub content_type: String,
    pub language: Option<String>,
    pub base: String,
    pub base64: bool,
    pub src: Option<String>,
}

/// Normalize the Atom shorthand type values onto MIME types.
pub(crate) fn map_content_type(content_type: &str) -> String {
    match content_type {
        "text" => "text/plain".to_owned(),
        "html" => "text/html".to_owned(),
        "xhtml" => "application/xhtml+xml".to_owned(),
        other => other.to_owned(),
    }
}

/// Whether content with these parameters is base64-encoded: an explicit
/// `mode="base64"`, or a binary media type (not `text/*` and not XML-ish).
pub(crate) fn is_base64(mode: Option<&str>, content_type: &str) -> bool {
    if mode == Some("base64") {
        return true;
    }
    if content_type.starts_with("text/") {
        return false;
    }
    if content_type.ends_with("+xml") || content_type.ends_with("/xml") {
        return false;
    }
    !content_type.is_empty() && content_type.contains('/')
}

/// Attribute lookup over the ordered pair list the drivers hand us.
pub(crate) fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_content_type_shorthands() {
        assert_eq!(map_content_type("text"), "text/plain");
        assert_eq!(map_content_type("html"), "text/html");
        assert_eq!(map_content_type("xhtml"), "application/xhtml+xml");
        assert_eq!(map_content_type("image/png"), "image/png");
    }

    #[test]
    fn test_base64_detection() {
        assert!(is_base64(Some("base64"), "text/plain"));
        assert!(!is_base64(None, "text/html"));
        assert!(!is_base64(None, "application/xhtml+xml"));
        assert!(!is_base64(None, "application/xml"));
        assert!(is_base64(None, "image/png"));
        assert!(!is_base64(None, ""));
    }
}
