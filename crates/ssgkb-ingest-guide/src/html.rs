//! Scoped DOM helpers.
//!
//! Guide nodes may be nested inside each other. Every helper here stops at
//! elements that carry their own tree annotation, so a lookup for one node
//! never reads into another and the total work stays linear in document size.

use scraper::ElementRef;

pub const TREE_ID_ATTR: &str = "data-tt-id";
pub const TREE_PARENT_ATTR: &str = "data-tt-parent-id";

pub fn is_tree_node(el: &ElementRef<'_>) -> bool {
    el.value().attr(TREE_ID_ATTR).is_some()
}

pub fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Collapses runs of whitespace (including `&nbsp;`) to single spaces.
pub fn collapse_ws(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole text of an element, whitespace-collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

/// First descendant matching `pred`, in document order, without entering
/// nested tree nodes.
pub fn find_scoped<'a, F>(root: ElementRef<'a>, pred: &F) -> Option<ElementRef<'a>>
where
    F: Fn(&ElementRef<'a>) -> bool,
{
    for child in root.children() {
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };
        if is_tree_node(&el) {
            continue;
        }
        if pred(&el) {
            return Some(el);
        }
        if let Some(found) = find_scoped(el, pred) {
            return Some(found);
        }
    }
    None
}

/// Text of `root` without nested tree nodes and without subtrees for which
/// `skip` returns true.
pub fn scoped_text<'a, F>(root: ElementRef<'a>, skip: &F) -> String
where
    F: Fn(&ElementRef<'a>) -> bool,
{
    fn walk<'a, F>(el: ElementRef<'a>, skip: &F, out: &mut String)
    where
        F: Fn(&ElementRef<'a>) -> bool,
    {
        for child in el.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
                out.push(' ');
                continue;
            }
            let Some(child_el) = ElementRef::wrap(child) else {
                continue;
            };
            if is_tree_node(&child_el) || skip(&child_el) {
                continue;
            }
            walk(child_el, skip, out);
        }
    }

    let mut out = String::new();
    walk(root, skip, &mut out);
    collapse_ws(&out)
}

/// Cells (`td`/`th`) of a table row, in order.
pub fn row_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn scoped_helpers_skip_nested_nodes() {
        let doc = Html::parse_fragment(
            r#"<div id="outer" data-tt-id="a">
                 <p class="description">outer text</p>
                 <div data-tt-id="b"><p class="description">inner</p></div>
               </div>"#,
        );
        let sel = Selector::parse("#outer").unwrap();
        let outer = doc.select(&sel).next().unwrap();

        let desc = find_scoped(outer, &|el| has_class(el, "description")).unwrap();
        assert_eq!(element_text(&desc), "outer text");
        assert_eq!(scoped_text(outer, &|_| false), "outer text");
    }

    #[test]
    fn collapse_handles_nbsp() {
        assert_eq!(collapse_ws("  Rule\u{a0}\u{a0}Install   AIDE \n"), "Rule Install AIDE");
    }

    proptest::proptest! {
        #[test]
        fn collapsed_text_has_single_spaces(s in "[ a-z\t\n\u{a0}]{0,40}") {
            let out = collapse_ws(&s);
            proptest::prop_assert!(!out.contains("  "));
            proptest::prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
