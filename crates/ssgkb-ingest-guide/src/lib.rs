//! HTML guide ingestion
//!
//! Turns an `ssg-<product>-guide-<short_id>.html` file into a [`Guide`], its
//! group tree and its rules (with references).
//!
//! The guide marks its benchmark tree with a pair of attributes on each node:
//! `data-tt-id` (the XCCDF id) and `data-tt-parent-id` (the parent's id,
//! sometimes prefixed with `children-`). The parser makes one pass over the
//! document to collect those nodes plus an `id` → element map and the anchor
//! texts, then reads each node's fields from its own subtree.
//!
//! Missing optional fields never fail a parse; only an unreadable file or a
//! file name outside the convention does.

use chrono::Utc;
use scraper::{ElementRef, Html};
use ssgkb_model::ids::{self, GuideName};
use ssgkb_model::{Guide, ParsedGuide, SsgError, SsgResult};
use std::collections::HashMap;
use std::path::Path;

mod html;
mod nodes;

pub use nodes::NodeKind;

const TITLE_SUFFIX: &str = " | OpenSCAP Security Guide";
const GUIDE_HEADING_MARKER: &str = "Guide to the Secure Configuration";

/// Parse a guide file from disk.
pub fn parse_guide_file(path: &Path) -> SsgResult<ParsedGuide> {
    let name = ids::parse_guide_name(path).ok_or_else(|| {
        SsgError::invalid(format!(
            "guide file name does not match ssg-<product>-guide-<id>.html: {}",
            path.display()
        ))
    })?;
    let bytes = std::fs::read(path).map_err(|e| SsgError::io_read(path, &e))?;
    let html = String::from_utf8_lossy(&bytes).into_owned();
    Ok(parse_guide_html(html, &name))
}

/// Parse guide HTML whose identity has already been derived from its file name.
pub fn parse_guide_html(html: String, name: &GuideName) -> ParsedGuide {
    let (profile_id, title, groups, rules) = {
        let doc = Html::parse_document(&html);
        let index = DocumentIndex::build(&doc);
        let (groups, rules) = nodes::extract_tree(&index, &name.id);
        let title = index.guide_title().unwrap_or_else(|| name.id.clone());
        (index.profile_id.clone().unwrap_or_default(), title, groups, rules)
    };

    tracing::debug!(
        guide = %name.id,
        groups = groups.len(),
        rules = rules.len(),
        "parsed guide"
    );

    let now = Utc::now();
    ParsedGuide {
        guide: Guide {
            id: name.id.clone(),
            product: name.product.clone(),
            profile_id,
            short_id: name.short_id.clone(),
            title,
            html_content: html,
            created_at: now,
            updated_at: now,
        },
        groups,
        rules,
    }
}

// ============================================================================
// Single-pass document index
// ============================================================================

/// A tree-annotated element: `(id, normalised parent id, element)`.
pub(crate) struct TreeElement<'a> {
    pub id: String,
    pub parent_id: String,
    pub element: ElementRef<'a>,
}

/// Everything the node extractors need, collected in one document walk.
pub(crate) struct DocumentIndex<'a> {
    /// Tree nodes in document order, first occurrence of each id only.
    pub tree: Vec<TreeElement<'a>>,
    /// `id` attribute → first element carrying it.
    pub by_id: HashMap<&'a str, ElementRef<'a>>,
    /// `#target` → text of the first non-empty anchor pointing at it.
    pub anchors: HashMap<String, String>,
    pub profile_id: Option<String>,
    pub profile_title: Option<String>,
    pub heading_title: Option<String>,
    pub document_title: Option<String>,
}

impl<'a> DocumentIndex<'a> {
    fn build(doc: &'a Html) -> Self {
        let mut index = DocumentIndex {
            tree: Vec::new(),
            by_id: HashMap::new(),
            anchors: HashMap::new(),
            profile_id: None,
            profile_title: None,
            heading_title: None,
            document_title: None,
        };
        let mut seen_tree_ids = std::collections::HashSet::new();

        for node in doc.tree.root().descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            let value = el.value();

            if let Some(tt_id) = value.attr(html::TREE_ID_ATTR) {
                let tt_id = tt_id.trim();
                if !tt_id.is_empty() && seen_tree_ids.insert(tt_id.to_string()) {
                    let parent = value.attr(html::TREE_PARENT_ATTR).unwrap_or("").trim();
                    index.tree.push(TreeElement {
                        id: tt_id.to_string(),
                        parent_id: normalize_parent(parent).to_string(),
                        element: el,
                    });
                }
            }

            if let Some(id) = value.attr("id") {
                index.by_id.entry(id).or_insert(el);
            }

            match value.name() {
                "a" => {
                    if let Some(target) = value.attr("href").and_then(|h| h.strip_prefix('#')) {
                        if !index.anchors.contains_key(target) {
                            let text = html::element_text(&el);
                            if !text.is_empty() {
                                index.anchors.insert(target.to_string(), text);
                            }
                        }
                    }
                }
                "title" if index.document_title.is_none() => {
                    let text = html::element_text(&el);
                    let text = text.strip_suffix(TITLE_SUFFIX).unwrap_or(&text).trim();
                    if !text.is_empty() {
                        index.document_title = Some(text.to_string());
                    }
                }
                "h2" if index.heading_title.is_none() => {
                    let text = html::element_text(&el);
                    if text.contains(GUIDE_HEADING_MARKER) {
                        index.heading_title = Some(text);
                    }
                }
                "tr" => index.read_profile_row(el),
                _ => {}
            }
        }

        index
    }

    /// `<tr><th>Profile ID</th><td>…</td></tr>` style metadata rows.
    fn read_profile_row(&mut self, row: ElementRef<'a>) {
        let cells = html::row_cells(row);
        if cells.len() < 2 {
            return;
        }
        let label = html::element_text(&cells[0]);
        let value = html::element_text(&cells[1]);
        if value.is_empty() {
            return;
        }
        match label.trim_end_matches(':') {
            "Profile ID" if self.profile_id.is_none() => self.profile_id = Some(value),
            "Profile Title" if self.profile_title.is_none() => self.profile_title = Some(value),
            _ => {}
        }
    }

    fn guide_title(&self) -> Option<String> {
        self.profile_title
            .clone()
            .or_else(|| self.heading_title.clone())
            .or_else(|| self.document_title.clone())
    }
}

fn normalize_parent(parent: &str) -> &str {
    parent.strip_prefix("children-").unwrap_or(parent)
}
