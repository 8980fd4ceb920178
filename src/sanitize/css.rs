//! Allowlist filtering of inline `style` attributes.
//!
//! Two guard expressions reject values whose overall shape is hostile
//! (escape sequences, anything that is not `prop: value` declarations), then
//! a per-declaration scan keeps only allowlisted properties with conforming
//! values. Any declaration containing a `url(...)` reference is dropped
//! outright; the surviving declarations are re-serialized.

use once_cell::sync::Lazy;
use regex::Regex;

const ACCEPTABLE_CSS_PROPERTIES: &[&str] = &[
    "azimuth",
    "background-color",
    "border-bottom-color",
    "border-collapse",
    "border-color",
    "border-left-color",
    "border-right-color",
    "border-top-color",
    "clear",
    "color",
    "cursor",
    "direction",
    "display",
    "elevation",
    "float",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "height",
    "letter-spacing",
    "line-height",
    "overflow",
    "pause",
    "pause-after",
    "pause-before",
    "pitch",
    "pitch-range",
    "richness",
    "speak",
    "speak-header",
    "speak-numeral",
    "speak-punctuation",
    "speech-rate",
    "stress",
    "text-align",
    "text-decoration",
    "text-indent",
    "unicode-bidi",
    "vertical-align",
    "voice-family",
    "volume",
    "white-space",
    "width",
];

/// Shorthand families whose values are validated keyword-by-keyword.
const SHORTHAND_FAMILIES: &[&str] = &["background", "border", "margin", "padding"];

const ACCEPTABLE_CSS_KEYWORDS: &[&str] = &[
    "auto",
    "aqua",
    "black",
    "block",
    "blue",
    "bold",
    "both",
    "bottom",
    "brown",
    "center",
    "collapse",
    "dashed",
    "dotted",
    "fuchsia",
    "gray",
    "green",
    "!important",
    "italic",
    "left",
    "lime",
    "maroon",
    "medium",
    "none",
    "navy",
    "normal",
    "nowrap",
    "olive",
    "pointer",
    "purple",
    "red",
    "right",
    "solid",
    "silver",
    "teal",
    "top",
    "transparent",
    "underline",
    "white",
    "yellow",
];

/// Guard 1: only characters that can appear in benign declarations. Notably
/// absent: backslash (CSS escapes) and angle brackets.
static CSS_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[-:,;#%.!\s\w'"()/]*$"#).unwrap());

/// Guard 2: the whole value must be a run of `prop: value;` declarations.
static CSS_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-\w]+\s*:[^:;]*(?:;\s*|$))*$").unwrap());

/// Conforming non-keyword values: hex colors, rgb() components, lengths.
static CSS_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#[0-9a-fA-F]+|rgb\(\d+%?,\d*%?,?\d*%?\)?|\d{0,2}\.?\d{0,2}(cm|em|ex|in|mm|pc|pt|px|%|,|\))?)$")
        .unwrap()
});

/// Filter one `style` attribute value. Returns the surviving declarations,
/// or an empty string when nothing survives.
pub fn sanitize_style(style: &str) -> String {
    if !CSS_CHARS_RE.is_match(style) || !CSS_SHAPE_RE.is_match(style) {
        return String::new();
    }

    let mut kept: Vec<String> = Vec::new();
    for declaration in style.split(';') {
        let declaration = declaration.trim();
        if declaration.is_empty() {
            continue;
        }
        let Some((prop, value)) = declaration.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() || value.to_ascii_lowercase().contains("url(") {
            continue;
        }

        if ACCEPTABLE_CSS_PROPERTIES.contains(&prop.as_str()) {
            kept.push(format!("{}: {}", prop, value));
        } else if prop
            .split('-')
            .next()
            .is_some_and(|family| SHORTHAND_FAMILIES.contains(&family))
        {
            let all_conforming = value.split_whitespace().all(|keyword| {
                let keyword = keyword.to_ascii_lowercase();
                ACCEPTABLE_CSS_KEYWORDS.contains(&keyword.as_str())
                    || CSS_VALUE_RE.is_match(&keyword)
            });
            if all_conforming {
                kept.push(format!("{}: {}", prop, value));
            }
        }
    }

    if kept.is_empty() {
        String::new()
    } else {
        format!("{};", kept.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_color_kept() {
        assert_eq!(sanitize_style("color:red"), "color: red;");
    }

    #[test]
    fn test_url_declaration_dropped_sibling_kept() {
        assert_eq!(
            sanitize_style("color:red;background:url(evil)"),
            "color: red;"
        );
    }

    #[test]
    fn test_unknown_property_dropped() {
        assert_eq!(sanitize_style("behavior:expression(alert(1));color:blue"), "color: blue;");
    }

    #[test]
    fn test_shorthand_keywords_validated() {
        assert_eq!(
            sanitize_style("margin: 10px 1em auto"),
            "margin: 10px 1em auto;"
        );
        assert_eq!(sanitize_style("background: fixed"), "");
    }

    #[test]
    fn test_escape_sequences_reject_whole_value() {
        assert_eq!(sanitize_style(r"color:\72\65\64"), "");
    }

    #[test]
    fn test_non_declaration_shape_rejected() {
        assert_eq!(sanitize_style("color red"), "");
    }

    #[test]
    fn test_hex_and_rgb_values() {
        assert_eq!(sanitize_style("color:#ff0000"), "color: #ff0000;");
        assert_eq!(
            sanitize_style("background-color: rgb(255,0,0)"),
            "background-color: rgb(255,0,0);"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize_style(""), "");
        assert_eq!(sanitize_style("   "), "");
    }
}
