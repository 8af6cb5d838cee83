//! Benchmark subtree → data-stream entities.

use crate::element::XmlElement;
use ssgkb_model::{
    Benchmark, DsGroup, DsProfile, DsProfileRule, DsRule, DsRuleIdentifier, DsRuleReference,
    Severity, SsgError, SsgResult, Timestamp,
};

/// XCCDF default for rules without a `weight` attribute.
const DEFAULT_WEIGHT: &str = "1.0";

pub(crate) struct BenchmarkContent {
    pub benchmark: Benchmark,
    pub profiles: Vec<DsProfile>,
    pub groups: Vec<DsGroup>,
    pub rules: Vec<DsRule>,
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true") | Some("1"))
}

pub(crate) fn decode_benchmark(
    root: &XmlElement,
    data_stream_id: &str,
    now: Timestamp,
) -> SsgResult<BenchmarkContent> {
    let id = root.attr("id").map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(SsgError::invalid("Benchmark element has no id"));
    }

    let profiles: Vec<DsProfile> = root
        .elements_named("Profile")
        .filter_map(|p| decode_profile(p, id, now))
        .collect();

    let mut walker = TreeWalker {
        benchmark_id: id,
        now,
        groups: Vec::new(),
        rules: Vec::new(),
    };
    for child in root.elements() {
        match child.local_name.as_str() {
            "Group" => walker.visit_group(child, "", 0),
            "Rule" => tracing::debug!(
                rule = child.attr("id").unwrap_or_default(),
                "ignoring rule outside any group"
            ),
            _ => {}
        }
    }
    let TreeWalker { groups, rules, .. } = walker;

    let status = root.first("status");
    let benchmark = Benchmark {
        id: id.to_string(),
        data_stream_id: data_stream_id.to_string(),
        title: root.child_text("title"),
        description: root.child_text("description"),
        version: root.child_text("version"),
        status: status.map(XmlElement::text).unwrap_or_default(),
        status_date: status
            .and_then(|s| s.attr("date"))
            .unwrap_or_default()
            .to_string(),
        profile_count: profiles.len() as i64,
        group_count: groups.len() as i64,
        rule_count: rules.len() as i64,
        created_at: now,
        updated_at: now,
    };

    Ok(BenchmarkContent {
        benchmark,
        profiles,
        groups,
        rules,
    })
}

fn decode_profile(el: &XmlElement, benchmark_id: &str, now: Timestamp) -> Option<DsProfile> {
    let id = el.attr("id").map(str::trim).filter(|id| !id.is_empty())?;
    let selected_rules: Vec<DsProfileRule> = el
        .elements_named("select")
        .filter_map(|s| {
            let rule_id = s.attr("idref")?.trim();
            Some(DsProfileRule {
                profile_id: id.to_string(),
                rule_id: rule_id.to_string(),
                selected: is_true(s.attr("selected")),
            })
        })
        .collect();
    Some(DsProfile {
        id: id.to_string(),
        benchmark_id: benchmark_id.to_string(),
        title: el.child_text("title"),
        description: el.child_text("description"),
        version: el.child_text("version"),
        rule_count: selected_rules.len() as i64,
        selected_rules,
        created_at: now,
        updated_at: now,
    })
}

/// Pre-order walk emitting groups and the rules pinned to them.
struct TreeWalker<'a> {
    benchmark_id: &'a str,
    now: Timestamp,
    groups: Vec<DsGroup>,
    rules: Vec<DsRule>,
}

impl TreeWalker<'_> {
    fn visit_group(&mut self, el: &XmlElement, parent_id: &str, level: i64) {
        let Some(id) = el.attr("id").map(str::trim).filter(|id| !id.is_empty()) else {
            tracing::debug!("skipping group without id");
            return;
        };
        let slot = self.groups.len();
        self.groups.push(DsGroup {
            id: id.to_string(),
            benchmark_id: self.benchmark_id.to_string(),
            parent_id: parent_id.to_string(),
            title: el.child_text("title"),
            description: el.child_text("description"),
            level,
            group_count: 0,
            rule_count: 0,
            created_at: self.now,
            updated_at: self.now,
        });

        let mut group_count = 0;
        let mut rule_count = 0;
        for child in el.elements() {
            match child.local_name.as_str() {
                "Group" => {
                    let before = self.groups.len();
                    self.visit_group(child, id, level + 1);
                    if self.groups.len() > before {
                        group_count += 1;
                    }
                }
                "Rule" => {
                    if let Some(rule) = self.decode_rule(child, id) {
                        self.rules.push(rule);
                        rule_count += 1;
                    }
                }
                _ => {}
            }
        }
        self.groups[slot].group_count = group_count;
        self.groups[slot].rule_count = rule_count;
    }

    fn decode_rule(&self, el: &XmlElement, group_id: &str) -> Option<DsRule> {
        let id = el.attr("id").map(str::trim).filter(|id| !id.is_empty())?;
        let references = el
            .elements_named("reference")
            .map(|r| DsRuleReference {
                href: r.attr("href").unwrap_or_default().trim().to_string(),
                ref_id: r.text(),
            })
            .collect();
        let identifiers = el
            .elements_named("ident")
            .map(|i| DsRuleIdentifier {
                system: i.attr("system").unwrap_or_default().trim().to_string(),
                identifier: i.text(),
            })
            .collect();
        Some(DsRule {
            id: id.to_string(),
            benchmark_id: self.benchmark_id.to_string(),
            group_id: group_id.to_string(),
            title: el.child_text("title"),
            description: el.child_text("description"),
            rationale: el.child_text("rationale"),
            severity: el
                .attr("severity")
                .map(Severity::from_source)
                .unwrap_or(Severity::Unknown),
            selected: is_true(el.attr("selected")),
            weight: el
                .attr("weight")
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .unwrap_or(DEFAULT_WEIGHT)
                .to_string(),
            version: el.child_text("version"),
            references,
            identifiers,
            created_at: self.now,
            updated_at: self.now,
        })
    }
}
