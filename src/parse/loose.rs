//! Lenient SGML-ish event driver.
//!
//! The fallback for documents the strict pass rejects. Nothing here ever
//! fails: unclosed tags, stray close tags, bare ampersands and unterminated
//! comments all degrade to something sensible. Unlike the strict driver,
//! character and entity references in text are NOT pre-decoded; they are
//! emitted separately through `entity_ref`, and decoding happens later in
//! the content post-processor.

use html_escape::decode_html_entities;

use super::machine::EventSink;

pub(super) fn run(text: &str, sink: &mut impl EventSink) {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if sink.failed() {
            return;
        }
        match bytes[pos] {
            b'<' => pos = markup(text, pos, sink),
            b'&' => {
                if let Some((name, consumed)) = read_reference(text, pos) {
                    sink.entity_ref(&name);
                    pos += consumed;
                } else {
                    sink.characters("&");
                    pos += 1;
                }
            }
            _ => {
                let start = pos;
                while pos < bytes.len() && bytes[pos] != b'<' && bytes[pos] != b'&' {
                    pos += 1;
                }
                sink.characters(&text[start..pos]);
            }
        }
    }
}

/// Handle one construct starting at a '<'; returns the next scan position.
fn markup(text: &str, pos: usize, sink: &mut impl EventSink) -> usize {
    let bytes = text.as_bytes();
    let rest = &bytes[pos..];

    if rest.starts_with(b"<!--") {
        return match find_sub(&bytes[pos + 4..], b"-->") {
            Some(end) => {
                sink.comment(&text[pos + 4..pos + 4 + end]);
                pos + 4 + end + 3
            }
            None => {
                sink.comment(&text[pos + 4..]);
                bytes.len()
            }
        };
    }

    if rest.starts_with(b"<![CDATA[") {
        return match find_sub(&bytes[pos + 9..], b"]]>") {
            Some(end) => {
                sink.cdata(&text[pos + 9..pos + 9 + end]);
                pos + 9 + end + 3
            }
            None => {
                sink.cdata(&text[pos + 9..]);
                bytes.len()
            }
        };
    }

    if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
        // Doctype, marked section or processing instruction: skip it
        return match bytes[pos..].iter().position(|&b| b == b'>') {
            Some(end) => pos + end + 1,
            None => bytes.len(),
        };
    }

    if rest.starts_with(b"</") {
        let (name, name_len) = read_qname(&bytes[pos + 2..]);
        let after = pos + 2 + name_len;
        let end = match bytes[after..].iter().position(|&b| b == b'>') {
            Some(end) => after + end + 1,
            None => bytes.len(),
        };
        if !name.is_empty() {
            sink.end_element(&name);
        }
        return end;
    }

    if rest.len() > 1 && (rest[1].is_ascii_alphabetic() || rest[1] == b'_') {
        return start_tag(text, pos, sink);
    }

    // A '<' that opens nothing is literal text
    sink.characters("<");
    pos + 1
}

/// Parse `<name attr=value ...>` tolerantly and emit the start (and, for
/// self-closing tags, end) events.
fn start_tag(text: &str, pos: usize, sink: &mut impl EventSink) -> usize {
    let bytes = text.as_bytes();
    let (name, name_len) = read_qname(&bytes[pos + 1..]);
    let mut i = pos + 1 + name_len;
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                i += 1;
            }
            _ => {
                let attr_start = i;
                while i < bytes.len()
                    && !matches!(bytes[i], b'=' | b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r')
                {
                    i += 1;
                }
                let attr_name = text[attr_start..i].to_owned();
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    let value = if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        i += 1;
                        let value_start = i;
                        while i < bytes.len() && bytes[i] != quote {
                            i += 1;
                        }
                        let raw = &text[value_start..i];
                        if i < bytes.len() {
                            i += 1;
                        }
                        raw
                    } else {
                        let value_start = i;
                        while i < bytes.len()
                            && !matches!(bytes[i], b'>' | b' ' | b'\t' | b'\n' | b'\r')
                        {
                            i += 1;
                        }
                        &text[value_start..i]
                    };
                    if !attr_name.is_empty() {
                        // Attribute values are decoded here; only character
                        // data travels undecoded in lenient mode
                        attrs.push((attr_name, decode_html_entities(value).into_owned()));
                    }
                } else if !attr_name.is_empty() {
                    attrs.push((attr_name.clone(), attr_name));
                }
            }
        }
    }

    sink.start_element(&name, &attrs);
    if self_closing {
        sink.end_element(&name);
    }
    i
}

/// `&name;`, `&#39;` or `&#x27;` → the reference content, without `&`/`;`.
fn read_reference(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut i = pos + 1;
    if i < bytes.len() && bytes[i] == b'#' {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'x' || bytes[i] == b'X') {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        if i == digits_start || i >= bytes.len() || bytes[i] != b';' {
            return None;
        }
        return Some((text[pos + 1..i].to_owned(), i - pos + 1));
    }
    if i >= bytes.len() || !bytes[i].is_ascii_alphabetic() {
        return None;
    }
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric()) {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b';' {
        return None;
    }
    Some((text[pos + 1..i].to_owned(), i - pos + 1))
}

fn read_qname(bytes: &[u8]) -> (String, usize) {
    let mut end = 0;
    while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || matches!(bytes[end], b'-' | b'.' | b':' | b'_'))
    {
        end += 1;
    }
    (String::from_utf8_lossy(&bytes[..end]).into_owned(), end)
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the raw event stream for assertions.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl EventSink for Recorder {
        fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
            self.events.push(format!("prefix {} {}", prefix, uri));
        }
        fn start_element(&mut self, name: &str, attrs: &[(String, String)]) {
            let attrs: Vec<String> = attrs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            self.events.push(format!("start {} [{}]", name, attrs.join(",")));
        }
        fn end_element(&mut self, name: &str) {
            self.events.push(format!("end {}", name));
        }
        fn characters(&mut self, text: &str) {
            self.events.push(format!("text {}", text));
        }
        fn cdata(&mut self, text: &str) {
            self.events.push(format!("cdata {}", text));
        }
        fn comment(&mut self, text: &str) {
            self.events.push(format!("comment {}", text));
        }
        fn entity_ref(&mut self, name: &str) {
            self.events.push(format!("entity {}", name));
        }
        fn fatal(&mut self, _error: crate::error::BozoError) {}
        fn failed(&self) -> bool {
            false
        }
    }

    fn events(input: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        run(input, &mut recorder);
        recorder.events
    }

    #[test]
    fn test_elements_and_text() {
        assert_eq!(
            events("<a>x</a>"),
            vec!["start a []", "text x", "end a"]
        );
    }

    #[test]
    fn test_entity_emitted_separately() {
        assert_eq!(
            events("<a>x &amp; y</a>"),
            vec!["start a []", "text x ", "entity amp", "text  y", "end a"]
        );
    }

    #[test]
    fn test_numeric_and_hex_references() {
        assert_eq!(
            events("<a>&#39;&#x27;</a>"),
            vec!["start a []", "entity #39", "entity #x27", "end a"]
        );
    }

    #[test]
    fn test_bare_ampersand_is_text() {
        assert_eq!(
            events("<a>fish & chips</a>"),
            vec![
                "start a []",
                "text fish ",
                "text &",
                "text  chips",
                "end a"
            ]
        );
    }

    #[test]
    fn test_self_closing_tag() {
        assert_eq!(
            events("<br/>"),
            vec!["start br []", "end br"]
        );
    }

    #[test]
    fn test_attributes_decoded() {
        assert_eq!(
            events("<a href=\"?x=1&amp;y=2\" checked>t</a>"),
            vec![
                "start a [href=?x=1&y=2,checked=checked]",
                "text t",
                "end a"
            ]
        );
    }

    #[test]
    fn test_cdata_and_comment() {
        assert_eq!(
            events("<a><![CDATA[1 < 2]]><!-- note --></a>"),
            vec!["start a []", "cdata 1 < 2", "comment  note ", "end a"]
        );
    }

    #[test]
    fn test_doctype_and_pi_skipped() {
        assert_eq!(
            events("<?xml version=\"1.0\"?><!DOCTYPE rss><a/>"),
            vec!["start a []", "end a"]
        );
    }

    #[test]
    fn test_unterminated_markup_degrades() {
        assert_eq!(events("<a>text<!-- open"), vec!["start a []", "text text", "comment  open"]);
        assert_eq!(events("<a href="), vec!["start a [href=]"]);
    }

    #[test]
    fn test_prefixed_names_pass_through() {
        assert_eq!(
            events("<dc:date>now</dc:date>"),
            vec!["start dc:date []", "text now", "end dc:date"]
        );
    }

    #[cfg(test)]
    mod robustness {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn tokenizer_never_panics(s in "\\PC*") {
                let mut recorder = Recorder::default();
                run(&s, &mut recorder);
            }
        }
    }
}
