//! HTML reference tables
//!
//! `table-<product>-<type>.html` files list one rule per row against an
//! external identifier space. The first four cells of each body row are
//! `(mapping, rule title, description, rationale)`.

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use ssgkb_model::ids::{self, TableName};
use ssgkb_model::{ParsedTable, SsgError, SsgResult, Table, TableEntry};
use std::path::Path;
use std::sync::LazyLock;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").expect("selector"));
static DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").expect("selector"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("selector"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("selector"));

/// Minimum number of cells for a row to count as an entry.
const ENTRY_CELLS: usize = 4;

pub fn parse_table_file(path: &Path) -> SsgResult<ParsedTable> {
    let name = ids::parse_table_name(path).ok_or_else(|| {
        SsgError::invalid(format!(
            "table file name does not match table-<product>-<type>.html: {}",
            path.display()
        ))
    })?;
    let bytes = std::fs::read(path).map_err(|e| SsgError::io_read(path, &e))?;
    Ok(parse_table_html(&String::from_utf8_lossy(&bytes), &name))
}

pub fn parse_table_html(html: &str, name: &TableName) -> ParsedTable {
    let doc = Html::parse_document(html);
    let now = Utc::now();

    let title = heading_div(&doc)
        .or_else(|| {
            doc.select(&TITLE)
                .next()
                .map(|t| text(&t))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| name.id.clone());

    let description = doc
        .select(&PARAGRAPH)
        .filter(|p| !inside_table(p))
        .map(|p| text(&p))
        .find(|t| !t.is_empty())
        .unwrap_or_default();

    let mut entries = Vec::new();
    match body_of_first_table(&doc) {
        Some(tbody) => {
            for row in tbody.children().filter_map(ElementRef::wrap) {
                if row.value().name() != "tr" {
                    continue;
                }
                let cells: Vec<ElementRef<'_>> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th"))
                    .collect();
                if cells.len() < ENTRY_CELLS || cells.iter().all(|c| c.value().name() == "th") {
                    continue;
                }
                let mapping = text(&cells[0]);
                if mapping.is_empty() {
                    continue;
                }
                let position = entries.len() as i64;
                entries.push(TableEntry {
                    id: format!("{}:{}", name.id, position),
                    table_id: name.id.clone(),
                    position,
                    mapping,
                    rule_title: text(&cells[1]),
                    description: text(&cells[2]),
                    rationale: text(&cells[3]),
                    created_at: now,
                    updated_at: now,
                });
            }
        }
        None => tracing::debug!(table = %name.id, "no table body found"),
    }

    ParsedTable {
        table: Table {
            id: name.id.clone(),
            product: name.product.clone(),
            table_type: name.table_type.clone(),
            title,
            description,
            created_at: now,
            updated_at: now,
        },
        entries,
    }
}

fn text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn inside_table(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "table")
}

/// The page heading is a centred `<div>` with an explicit font size.
fn heading_div(doc: &Html) -> Option<String> {
    doc.select(&DIV).find_map(|div| {
        let style: String = div
            .value()
            .attr("style")
            .unwrap_or("")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let centred = style.contains("text-align:center")
            || div.value().attr("align").is_some_and(|a| a.eq_ignore_ascii_case("center"));
        if !(centred && style.contains("font-size")) {
            return None;
        }
        Some(text(&div)).filter(|t| !t.is_empty())
    })
}

fn body_of_first_table(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&TABLE).find_map(|table| {
        table
            .children()
            .filter_map(ElementRef::wrap)
            .find(|c| c.value().name() == "tbody")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> TableName {
        ids::parse_table_name(Path::new("table-rhel9-cces.html")).unwrap()
    }

    #[test]
    fn heading_div_wins_over_title_tag() {
        let html = r#"<html><head><title>Doc title</title></head><body>
            <div style="text-align: center; font-size: x-large; font-weight: bold">CCE Identifiers in RHEL 9</div>
            </body></html>"#;
        assert_eq!(parse_table_html(html, &name()).table.title, "CCE Identifiers in RHEL 9");
    }

    #[test]
    fn title_falls_back_to_id() {
        let parsed = parse_table_html("<html><body></body></html>", &name());
        assert_eq!(parsed.table.title, "table-rhel9-cces");
        assert!(parsed.entries.is_empty());
    }

    #[test]
    fn short_and_header_rows_are_skipped() {
        let html = r#"<table>
            <tr><th>CCE</th><th>Rule</th><th>Description</th><th>Rationale</th></tr>
            <tr><td>CCE-1-1</td><td>only two</td></tr>
            <tr><td></td><td>a</td><td>b</td><td>c</td></tr>
            <tr><td>CCE-80644-8</td><td>Build AIDE</td><td>desc</td><td>why</td></tr>
        </table>"#;
        let parsed = parse_table_html(html, &name());
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].mapping, "CCE-80644-8");
        assert_eq!(parsed.entries[0].position, 0);
        assert_eq!(parsed.entries[0].id, "table-rhel9-cces:0");
    }
}
