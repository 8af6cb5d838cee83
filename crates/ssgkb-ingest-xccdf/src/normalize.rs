//! Mixed-content normalisation.
//!
//! XCCDF descriptions carry inline XHTML (`<html:code>`, `<html:br/>`, ...).
//! The input here is the element's inner markup as rendered by
//! [`crate::element::XmlElement::inner_xml`], where text is always escaped, so
//! after tag stripping no `<` or `>` can survive: escaped angle brackets are
//! left as `&lt;`/`&gt;` and every other entity is decoded.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static BR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:[a-z_][\w.-]*:)?br\s*/?>").expect("br regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#x[0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("entity regex")
});

/// Escape text for [`normalize_markup`]: `&`, `<` and `>` become entities.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// `<br/>` to newline, other tags dropped, entities decoded, lines trimmed.
pub fn normalize_markup(markup: &str) -> String {
    let with_breaks = BR_RE.replace_all(markup, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = ENTITY_RE.replace_all(&stripped, decode_entity);

    let mut out = String::with_capacity(decoded.len());
    for (i, line) in decoded.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.trim());
    }
    out.trim().to_string()
}

fn decode_entity(caps: &Captures<'_>) -> String {
    let whole = &caps[0];
    let body = &caps[1];
    let decoded = match body {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = body.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
        }
    };
    match decoded {
        Some('<') | Some('>') | None => whole.to_string(),
        Some(c) => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn breaks_become_newlines() {
        let raw = "First line<html:br/>  second line <html:br />third";
        assert_eq!(normalize_markup(raw), "First line\nsecond line\nthird");
    }

    #[test]
    fn inline_tags_are_stripped_and_entities_decoded() {
        let raw = "\n    Run <html:code>aide --init</html:code> &amp; copy &quot;db&quot;\n  ";
        assert_eq!(normalize_markup(raw), "Run aide --init & copy \"db\"");
    }

    #[test]
    fn escaped_angle_brackets_stay_escaped() {
        assert_eq!(normalize_markup("a &lt;b&gt; &#60;c&#x3E;"), "a &lt;b&gt; &#60;c&#x3E;");
    }

    proptest! {
        #[test]
        fn normalized_text_never_contains_angle_brackets(
            a in "\\PC{0,40}",
            b in "\\PC{0,40}",
        ) {
            let markup = format!(
                "<html:p>{}</html:p><html:br/><html:code>{}</html:code>",
                escape_text(&a),
                escape_text(&b)
            );
            let out = normalize_markup(&markup);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
        }
    }
}
