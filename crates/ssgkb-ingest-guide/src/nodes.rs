//! Group and rule extraction from tree-annotated elements.

use crate::html::{self, find_scoped, has_class, scoped_text};
use crate::{DocumentIndex, TreeElement};
use chrono::Utc;
use regex::Regex;
use scraper::ElementRef;
use ssgkb_model::ids;
use ssgkb_model::{Group, Reference, Rule, Severity};
use std::collections::HashMap;
use std::sync::LazyLock;

static CONTAINS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"contains\s+(\d+)\s+groups?\s+and\s+(\d+)\s+rules?").expect("contains regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Rule,
}

impl NodeKind {
    /// Benchmark roots, `children-` wrapper rows and anything else
    /// unrecognised are not materialised.
    pub fn classify(id: &str) -> Option<NodeKind> {
        if id.starts_with("children-") {
            None
        } else if id.contains("content_group_") {
            Some(NodeKind::Group)
        } else if id.contains("content_rule_") {
            Some(NodeKind::Rule)
        } else {
            None
        }
    }
}

/// Parent links and kinds for every tree node, with memoised depth.
struct Hierarchy<'i> {
    parent: HashMap<&'i str, &'i str>,
    kind: HashMap<&'i str, NodeKind>,
    depth: HashMap<&'i str, i64>,
}

impl<'i> Hierarchy<'i> {
    fn new(tree: &'i [TreeElement<'_>]) -> Self {
        let mut parent = HashMap::with_capacity(tree.len());
        let mut kind = HashMap::new();
        for node in tree {
            parent.insert(node.id.as_str(), node.parent_id.as_str());
            if let Some(k) = NodeKind::classify(&node.id) {
                kind.insert(node.id.as_str(), k);
            }
        }
        Self {
            parent,
            kind,
            depth: HashMap::new(),
        }
    }

    fn is_top(parent: &str) -> bool {
        parent.is_empty() || parent.contains("benchmark")
    }

    /// Steps up the parent chain until the parent is empty or a benchmark.
    fn depth_of(&mut self, id: &'i str) -> i64 {
        let mut chain = Vec::new();
        let mut cur = id;
        let base = loop {
            if let Some(&d) = self.depth.get(cur) {
                break d;
            }
            let parent = self.parent.get(cur).copied().unwrap_or("");
            let stuck = chain.contains(&cur) || chain.len() > self.parent.len();
            chain.push(cur);
            if Self::is_top(parent) || stuck {
                break -1;
            }
            cur = parent;
        };
        // chain[last] sits at depth base + 1, earlier entries one deeper each
        let mut d = base;
        for node in chain.iter().rev() {
            d += 1;
            self.depth.entry(*node).or_insert(d);
        }
        self.depth.get(id).copied().unwrap_or(0)
    }

    /// Closest ancestor that is a group, or `None` at the top of the tree.
    fn nearest_group(&self, id: &str) -> Option<&'i str> {
        let mut cur = self.parent.get(id).copied().unwrap_or("");
        let mut steps = 0;
        while !Self::is_top(cur) && steps <= self.parent.len() {
            if self.kind.get(cur) == Some(&NodeKind::Group) {
                return Some(cur);
            }
            cur = self.parent.get(cur).copied().unwrap_or("");
            steps += 1;
        }
        None
    }
}

/// Build groups and rules for one guide, then recompute child counts.
pub(crate) fn extract_tree(index: &DocumentIndex<'_>, guide_id: &str) -> (Vec<Group>, Vec<Rule>) {
    let now = Utc::now();
    let mut hierarchy = Hierarchy::new(&index.tree);
    let mut groups = Vec::new();
    let mut rules = Vec::new();

    for node in &index.tree {
        let Some(kind) = NodeKind::classify(&node.id) else {
            continue;
        };
        let level = hierarchy.depth_of(node.id.as_str());
        let parent_group = hierarchy.nearest_group(&node.id).unwrap_or("").to_string();
        let scopes = scopes_for(index, node);

        match kind {
            NodeKind::Group => {
                let (title, textual_counts) = group_title_and_counts(index, node, &scopes);
                let group = Group {
                    id: node.id.clone(),
                    guide_id: guide_id.to_string(),
                    parent_id: parent_group,
                    title,
                    description: description(&scopes),
                    level,
                    group_count: textual_counts.map(|c| c.0).unwrap_or(0),
                    rule_count: textual_counts.map(|c| c.1).unwrap_or(0),
                    created_at: now,
                    updated_at: now,
                };
                groups.push(group);
            }
            NodeKind::Rule => {
                if parent_group.is_empty() {
                    tracing::debug!(rule = %node.id, "dropping rule outside any group");
                    continue;
                }
                let short_id = ids::node_short_id(&node.id).to_string();
                rules.push(Rule {
                    id: node.id.clone(),
                    guide_id: guide_id.to_string(),
                    group_id: parent_group,
                    title: rule_title(&scopes).unwrap_or_else(|| ids::humanize(&short_id)),
                    short_id,
                    description: description(&scopes),
                    rationale: text_of_class(&scopes, "rationale"),
                    severity: severity(&scopes),
                    level,
                    references: references(&scopes, &node.id),
                    created_at: now,
                    updated_at: now,
                });
            }
        }
    }

    recompute_counts(&mut groups, &rules);
    (groups, rules)
}

/// Overwrite the textual counts with counts of materialised children.
pub(crate) fn recompute_counts(groups: &mut [Group], rules: &[Rule]) {
    let mut rule_counts: HashMap<&str, i64> = HashMap::new();
    for rule in rules {
        *rule_counts.entry(rule.group_id.as_str()).or_default() += 1;
    }
    let mut group_counts: HashMap<String, i64> = HashMap::new();
    for group in groups.iter() {
        if !group.parent_id.is_empty() {
            *group_counts.entry(group.parent_id.clone()).or_default() += 1;
        }
    }
    for group in groups.iter_mut() {
        let rules_here = rule_counts.get(group.id.as_str()).copied().unwrap_or(0);
        let groups_here = group_counts.get(&group.id).copied().unwrap_or(0);
        if (group.group_count, group.rule_count) != (groups_here, rules_here) {
            tracing::trace!(group = %group.id, "textual child counts differ from materialised");
        }
        group.group_count = groups_here;
        group.rule_count = rules_here;
    }
}

/// The annotated element, plus the element whose `id` equals the node id when
/// the details live elsewhere in the document.
fn scopes_for<'a>(index: &DocumentIndex<'a>, node: &TreeElement<'a>) -> Vec<ElementRef<'a>> {
    let mut scopes = vec![node.element];
    if let Some(detail) = index.by_id.get(node.id.as_str()) {
        if *detail != node.element {
            scopes.push(*detail);
        }
    }
    scopes
}

fn first_in_scopes<'a, F>(scopes: &[ElementRef<'a>], pred: F) -> Option<ElementRef<'a>>
where
    F: Fn(&ElementRef<'a>) -> bool,
{
    scopes.iter().find_map(|s| find_scoped(*s, &pred))
}

fn text_of_class(scopes: &[ElementRef<'_>], class: &str) -> String {
    first_in_scopes(scopes, |el| has_class(el, class))
        .map(|el| html::element_text(&el))
        .unwrap_or_default()
}

fn description(scopes: &[ElementRef<'_>]) -> String {
    first_in_scopes(scopes, |el| {
        has_class(el, "description") || has_class(el, "profile-description")
    })
    .map(|el| html::element_text(&el))
    .unwrap_or_default()
}

fn group_title_and_counts(
    index: &DocumentIndex<'_>,
    node: &TreeElement<'_>,
    scopes: &[ElementRef<'_>],
) -> (String, Option<(i64, i64)>) {
    let text = scoped_text(node.element, &|el| {
        has_class(el, "description") || has_class(el, "profile-description")
    });

    let counts = scopes
        .iter()
        .map(|s| scoped_text(*s, &|_| false))
        .find_map(|t| {
            CONTAINS_RE.captures(&t).and_then(|caps| {
                let groups = caps.get(1)?.as_str().parse().ok()?;
                let rules = caps.get(2)?.as_str().parse().ok()?;
                Some((groups, rules))
            })
        });

    if let Some(anchor) = index.anchors.get(&node.id) {
        return (anchor.clone(), counts);
    }

    let stripped = match text.find("Group contains") {
        Some(pos) => text[..pos].trim(),
        None => text.trim(),
    };
    let stripped = stripped.strip_prefix("Group").map(str::trim).unwrap_or(stripped);
    let title = if stripped.is_empty() {
        ids::humanize(ids::node_short_id(&node.id))
    } else {
        stripped.to_string()
    };
    (title, counts)
}

/// Text following the `Rule` label: `<span class="label label-default">Rule</span> Title`.
fn rule_title(scopes: &[ElementRef<'_>]) -> Option<String> {
    let label = first_in_scopes(scopes, |el| {
        has_class(el, "label-default") && html::element_text(el) == "Rule"
    })?;
    for sibling in label.next_siblings() {
        let text = match ElementRef::wrap(sibling) {
            Some(el) => html::element_text(&el),
            None => sibling
                .value()
                .as_text()
                .map(|t| html::collapse_ws(t))
                .unwrap_or_default(),
        };
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

fn severity(scopes: &[ElementRef<'_>]) -> Severity {
    let from_class = |el: &ElementRef<'_>| {
        el.value().classes().find_map(|c| match c {
            "severity-low" => Some(Severity::Low),
            "severity-medium" => Some(Severity::Medium),
            "severity-high" => Some(Severity::High),
            _ => None,
        })
    };

    for scope in scopes {
        if let Some(sev) = from_class(scope) {
            return sev;
        }
    }
    if let Some(el) = first_in_scopes(scopes, |el| from_class(el).is_some()) {
        if let Some(sev) = from_class(&el) {
            return sev;
        }
    }
    first_in_scopes(scopes, |el| has_class(el, "severity"))
        .and_then(|el| html::element_text(&el).parse().ok())
        .unwrap_or_default()
}

/// Rows of the rule's `table.identifiers`: anchor href/text and the second cell.
fn references(scopes: &[ElementRef<'_>], rule_id: &str) -> Vec<Reference> {
    let Some(table) =
        first_in_scopes(scopes, |el| el.value().name() == "table" && has_class(el, "identifiers"))
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for node in table.descendants() {
        let Some(row) = ElementRef::wrap(node) else {
            continue;
        };
        if row.value().name() != "tr" {
            continue;
        }
        let cells = html::row_cells(row);
        if cells.is_empty() {
            continue;
        }
        let anchor = find_scoped(row, &|el| el.value().name() == "a");
        let href = anchor
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("")
            .trim()
            .to_string();
        let label = anchor
            .map(|a| html::element_text(&a))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| html::element_text(&cells[0]));
        if label.is_empty() && href.is_empty() {
            continue;
        }
        let value = cells
            .get(1)
            .map(|c| html::element_text(c))
            .unwrap_or_default();
        out.push(Reference {
            id: 0,
            rule_id: rule_id.to_string(),
            href,
            label,
            value,
        });
    }
    out
}
