//! Allowlist HTML scrubbing and in-markup URI resolution.
//!
//! The scrub walks a parsed fragment with an explicit worklist, producing
//! replacement child lists instead of mutating a live tree: elements not in
//! the allowlist are culled, meaning replaced by their own children (which
//! are pushed back onto the worklist and visited in turn), while the small
//! nuke set loses its content entirely. Kept elements retain only allowlisted
//! attributes. Malformed input degrades to stripped content; nothing here
//! returns an error.

mod css;
pub mod dom;

use dom::Node;

pub use css::sanitize_style;

// ============================================================================
// Allowlists
// ============================================================================

const ACCEPTABLE_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "b", "big", "blockquote", "br", "button",
    "caption", "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "dir", "div",
    "dl", "dt", "em", "fieldset", "font", "form", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i",
    "img", "input", "ins", "kbd", "label", "legend", "li", "map", "menu", "ol", "optgroup",
    "option", "p", "pre", "q", "s", "samp", "select", "small", "span", "strike", "strong", "sub",
    "sup", "table", "tbody", "td", "textarea", "tfoot", "th", "thead", "tr", "tt", "u", "ul",
    "var",
];

const ACCEPTABLE_ATTRIBUTES: &[&str] = &[
    "abbr", "accept", "accept-charset", "accesskey", "action", "align", "alt", "axis", "border",
    "cellpadding", "cellspacing", "char", "charoff", "charset", "checked", "cite", "class",
    "clear", "cols", "colspan", "color", "compact", "coords", "datetime", "dir", "disabled",
    "enctype", "for", "frame", "headers", "height", "href", "hreflang", "hspace", "id", "ismap",
    "label", "lang", "longdesc", "maxlength", "media", "method", "multiple", "name", "nohref",
    "noshade", "nowrap", "prompt", "readonly", "rel", "rev", "rows", "rowspan", "rules", "scope",
    "selected", "shape", "size", "span", "src", "start", "style", "summary", "tabindex",
    "target", "title", "type", "usemap", "valign", "value", "vspace", "width", "xml:lang",
];

/// Elements whose entire content is discarded before culling.
const NUKE_ELEMENTS: &[&str] = &["script", "applet", "style"];

const MATHML_ELEMENTS: &[&str] = &[
    "maction", "math", "menclose", "merror", "mfenced", "mfrac", "mi", "mmultiscripts", "mn",
    "mo", "mover", "mpadded", "mphantom", "mprescripts", "mroot", "mrow", "mspace", "msqrt",
    "mstyle", "msub", "msubsup", "msup", "mtable", "mtd", "mtext", "mtr", "munder",
    "munderover", "none",
];

const MATHML_ATTRIBUTES: &[&str] = &[
    "actiontype", "align", "columnalign", "columnlines", "columnspacing", "columnspan", "depth",
    "display", "displaystyle", "equalcolumns", "equalrows", "fence", "fontstyle", "fontweight",
    "frame", "height", "linethickness", "lspace", "mathbackground", "mathcolor", "mathvariant",
    "maxsize", "minsize", "other", "rowalign", "rowlines", "rowspacing", "rowspan", "rspace",
    "scriptlevel", "selection", "separator", "stretchy", "width", "xlink:href", "xlink:show",
    "xlink:type", "xmlns", "xmlns:xlink",
];

const SVG_ELEMENTS: &[&str] = &[
    "animate", "animatecolor", "animatemotion", "animatetransform", "circle", "defs", "desc",
    "ellipse", "font-face", "font-face-name", "font-face-src", "g", "glyph", "hkern", "line",
    "lineargradient", "marker", "metadata", "missing-glyph", "mpath", "path", "polygon",
    "polyline", "radialgradient", "rect", "set", "stop", "svg", "switch", "text", "title",
    "tspan", "use",
];

const SVG_ATTRIBUTES: &[&str] = &[
    "accent-height", "accumulate", "additive", "alphabetic", "arabic-form", "ascent",
    "attributename", "attributetype", "baseprofile", "bbox", "begin", "by", "calcmode",
    "cap-height", "class", "color", "color-rendering", "cx", "cy", "d", "descent", "display",
    "dur", "dx", "dy", "end", "fill", "fill-opacity", "fill-rule", "font-family", "font-size",
    "font-stretch", "font-style", "font-variant", "font-weight", "from", "fx", "fy", "g1", "g2",
    "glyph-name", "gradientunits", "hanging", "height", "horiz-adv-x", "horiz-origin-x", "id",
    "ideographic", "k", "keypoints", "keysplines", "keytimes", "lang", "marker-end",
    "marker-mid", "marker-start", "markerheight", "markerunits", "markerwidth", "mathematical",
    "max", "min", "name", "offset", "opacity", "orient", "origin", "overline-position",
    "overline-thickness", "panose-1", "path", "pathlength", "points", "preserveaspectratio",
    "r", "refx", "refy", "repeatcount", "repeatdur", "requiredextensions", "requiredfeatures",
    "restart", "rotate", "rx", "ry", "slope", "stemh", "stemv", "stop-color", "stop-opacity",
    "strikethrough-position", "strikethrough-thickness", "stroke", "stroke-dasharray",
    "stroke-dashoffset", "stroke-linecap", "stroke-linejoin", "stroke-miterlimit",
    "stroke-opacity", "stroke-width", "systemlanguage", "target", "text-anchor", "to",
    "transform", "type", "u1", "u2", "underline-position", "underline-thickness", "unicode",
    "unicode-range", "units-per-em", "values", "version", "viewbox", "visibility", "width",
    "widths", "x", "x-height", "x1", "x2", "xlink:actuate", "xlink:arcrole", "xlink:href",
    "xlink:role", "xlink:show", "xlink:title", "xlink:type", "xmlns", "xmlns:xlink", "y", "y1",
    "y2", "zoomandpan",
];

// ============================================================================
// Scrubbing
// ============================================================================

/// Scrub an HTML fragment down to allowlisted markup.
///
/// `strict` additionally admits MathML/SVG elements with their tag-specific
/// attribute allowlists; the compatible mode used for plain `text/html`
/// content strips them like any other unknown element.
pub fn sanitize_html(fragment: &str, strict: bool) -> String {
    let nodes = dom::parse_fragment(fragment);
    dom::serialize(&scrub_children(nodes, strict))
}

fn element_allowed(name: &str, strict: bool) -> bool {
    ACCEPTABLE_ELEMENTS.contains(&name)
        || (strict && (MATHML_ELEMENTS.contains(&name) || SVG_ELEMENTS.contains(&name)))
}

fn attribute_allowed(element: &str, attr: &str, strict: bool) -> bool {
    if ACCEPTABLE_ATTRIBUTES.contains(&attr) {
        return true;
    }
    if strict && MATHML_ELEMENTS.contains(&element) {
        return MATHML_ATTRIBUTES.contains(&attr);
    }
    if strict && SVG_ELEMENTS.contains(&element) {
        return SVG_ATTRIBUTES.contains(&attr);
    }
    false
}

/// Produce the replacement child list for one level. The worklist is
/// processed front-to-back; culled elements push their children back onto
/// the front so promoted nodes are themselves visited.
fn scrub_children(children: Vec<Node>, strict: bool) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    // Reversed so pop() yields document order
    let mut work: Vec<Node> = children.into_iter().rev().collect();

    while let Some(node) = work.pop() {
        match node {
            Node::Text(text) => out.push(Node::Text(clean_text(&text))),
            Node::Element {
                name,
                attrs,
                children,
            } => {
                if NUKE_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                if element_allowed(&name, strict) {
                    let attrs = filter_attributes(&name, attrs, strict);
                    out.push(Node::Element {
                        name,
                        attrs,
                        children: scrub_children(children, strict),
                    });
                } else {
                    // Cull: promote the children in place, still to be visited
                    for child in children.into_iter().rev() {
                        work.push(child);
                    }
                }
            }
        }
    }
    out
}

fn filter_attributes(
    element: &str,
    attrs: Vec<(String, String)>,
    strict: bool,
) -> Vec<(String, String)> {
    attrs
        .into_iter()
        .filter_map(|(name, value)| {
            if !attribute_allowed(element, &name, strict) {
                return None;
            }
            if name == "style" {
                let cleaned = sanitize_style(&value);
                if cleaned.is_empty() {
                    return None;
                }
                return Some((name, cleaned));
            }
            Some((name, value))
        })
        .collect()
}

/// Text-node cleanup: numeric quote entities become literal quotes, carriage
/// returns vanish.
fn clean_text(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#34;", "\"")
        .replace("&#x22;", "\"")
        .replace('\r', "")
}

// ============================================================================
// Relative references inside markup
// ============================================================================

/// `(element, attribute)` pairs that carry URIs inside embedded HTML.
const RELATIVE_URI_ATTRIBUTES: &[(&str, &str)] = &[
    ("a", "href"),
    ("applet", "codebase"),
    ("area", "href"),
    ("blockquote", "cite"),
    ("body", "background"),
    ("del", "cite"),
    ("form", "action"),
    ("frame", "longdesc"),
    ("frame", "src"),
    ("iframe", "longdesc"),
    ("iframe", "src"),
    ("head", "profile"),
    ("img", "longdesc"),
    ("img", "src"),
    ("img", "usemap"),
    ("input", "src"),
    ("input", "usemap"),
    ("ins", "cite"),
    ("link", "href"),
    ("object", "classid"),
    ("object", "codebase"),
    ("object", "data"),
    ("object", "usemap"),
    ("q", "cite"),
    ("script", "src"),
];

/// Rewrite every relative URI in the fragment against `base`, per the fixed
/// `(tag, attribute)` table. Runs before sanitization so references inside
/// soon-to-be-culled wrappers still resolve.
pub fn resolve_relative_references(fragment: &str, base: &str) -> String {
    let mut nodes = dom::parse_fragment(fragment);
    for node in &mut nodes {
        resolve_node(node, base);
    }
    dom::serialize(&nodes)
}

fn resolve_node(node: &mut Node, base: &str) {
    if let Node::Element {
        name,
        attrs,
        children,
    } = node
    {
        for (attr, value) in attrs.iter_mut() {
            if RELATIVE_URI_ATTRIBUTES.contains(&(name.as_str(), attr.as_str())) {
                *value = crate::uri::resolve(base, value);
            }
        }
        for child in children {
            resolve_node(child, base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_script_nuked_entirely() {
        assert_eq!(
            sanitize_html("<script>alert(1)</script><p>ok</p>", false),
            "<p>ok</p>"
        );
    }

    #[test]
    fn test_style_element_nuked() {
        assert_eq!(
            sanitize_html("<style>p { color: red }</style>text", false),
            "text"
        );
    }

    #[test]
    fn test_unknown_element_culled_children_promoted() {
        assert_eq!(
            sanitize_html("<blink>twinkle <b>bold</b></blink>", false),
            "twinkle <b>bold</b>"
        );
    }

    #[test]
    fn test_promoted_children_still_scrubbed() {
        // The inner script must be nuked even though its parent was culled
        assert_eq!(
            sanitize_html("<blink>a<script>x</script>b</blink>", false),
            "ab"
        );
    }

    #[test]
    fn test_attributes_filtered() {
        assert_eq!(
            sanitize_html("<p onclick=\"evil()\" align=\"center\">x</p>", false),
            "<p align=\"center\">x</p>"
        );
    }

    #[test]
    fn test_style_attribute_filtered_not_dropped() {
        assert_eq!(
            sanitize_html(
                "<p style=\"color:red;background:url(evil)\">x</p>",
                false
            ),
            "<p style=\"color: red;\">x</p>"
        );
    }

    #[test]
    fn test_fully_hostile_style_removed() {
        assert_eq!(
            sanitize_html(r#"<p style="color:\72ed">x</p>"#, false),
            "<p>x</p>"
        );
    }

    #[test]
    fn test_mathml_needs_strict_mode() {
        let fragment = "<math><mi>x</mi></math>";
        assert_eq!(sanitize_html(fragment, false), "x");
        assert_eq!(sanitize_html(fragment, true), "<math><mi>x</mi></math>");
    }

    #[test]
    fn test_svg_attributes_tag_specific() {
        let fragment = "<svg viewbox=\"0 0 10 10\"><circle cx=\"5\" cy=\"5\" r=\"4\"></circle></svg>";
        assert_eq!(
            sanitize_html(fragment, true),
            "<svg viewbox=\"0 0 10 10\"><circle cx=\"5\" cy=\"5\" r=\"4\"></circle></svg>"
        );
        // In compatible mode the wrapper is culled and nothing remains
        assert_eq!(sanitize_html(fragment, false), "");
    }

    #[test]
    fn test_text_quote_entities_unescaped() {
        assert_eq!(
            sanitize_html("<p>it&#39;s &#34;quoted&#34;</p>", false),
            "<p>it's \"quoted\"</p>"
        );
    }

    #[test]
    fn test_carriage_returns_stripped() {
        assert_eq!(sanitize_html("<p>a\r\nb</p>", false), "<p>a\nb</p>");
    }

    #[test]
    fn test_malformed_input_never_panics() {
        for fragment in [
            "<p<><<>>",
            "</",
            "<script>",
            "<a href=",
            "<p style=\"",
            "<<<<",
        ] {
            let _ = sanitize_html(fragment, false);
        }
    }

    #[test]
    fn test_resolve_img_src() {
        assert_eq!(
            resolve_relative_references(
                "<img src=\"logo.png\" alt=\"x\">",
                "http://example.com/feed/"
            ),
            "<img src=\"http://example.com/feed/logo.png\" alt=\"x\" />"
        );
    }

    #[test]
    fn test_resolve_nested_anchor() {
        assert_eq!(
            resolve_relative_references(
                "<div><a href=\"/a\">x</a></div>",
                "http://example.com/feed/"
            ),
            "<div><a href=\"http://example.com/a\">x</a></div>"
        );
    }

    #[test]
    fn test_resolve_leaves_absolute_alone() {
        assert_eq!(
            resolve_relative_references(
                "<a href=\"https://other.org/\">x</a>",
                "http://example.com/"
            ),
            "<a href=\"https://other.org/\">x</a>"
        );
    }

    #[cfg(test)]
    mod robustness {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitize_never_panics(s in "\\PC*") {
                let _ = sanitize_html(&s, false);
                let _ = sanitize_html(&s, true);
            }

            #[test]
            fn sanitized_output_has_no_nuked_elements(s in "\\PC*") {
                fn clean(nodes: &[Node]) -> bool {
                    nodes.iter().all(|node| match node {
                        Node::Text(_) => true,
                        Node::Element { name, children, .. } => {
                            !NUKE_ELEMENTS.contains(&name.as_str()) && clean(children)
                        }
                    })
                }
                let reparsed = dom::parse_fragment(&sanitize_html(&s, false));
                prop_assert!(clean(&reparsed));
            }
        }
    }
}
