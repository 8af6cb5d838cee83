//! Cross-reference extraction
//!
//! Every parsed object is linked to the identifiers it mentions: rule ids,
//! CCE numbers, product names and profile keys. Those identifier edges are
//! emitted whether or not the peer objects exist. [`materialize`] then turns
//! "A and B both point at identifier X" into direct `A → B` and `B → A` edges.
//!
//! Identifier target ids:
//!
//! | target type | target id |
//! |---|---|
//! | `rule` | full XCCDF rule id |
//! | `cce` | CCE number |
//! | `product` | product name |
//! | `profile` | `{product}:{profile short id}` |

use chrono::Utc;
use serde_json::json;
use ssgkb_model::ids::{self, CCE_RE, RULE_ID_RE};
use ssgkb_model::{
    CrossReference, Guide, LinkType, ObjectType, ParsedDataStream, ParsedManifest, ParsedTable,
    Timestamp,
};
use std::collections::HashSet;

mod closure;

pub use closure::materialize;

fn product_edge(
    source: (ObjectType, &str),
    product: &str,
    now: Timestamp,
) -> Option<CrossReference> {
    let product = product.trim();
    if product.is_empty() {
        return None;
    }
    Some(CrossReference::new(
        source,
        (ObjectType::Product, product),
        LinkType::Product,
        json!({ "product": product }),
        now,
    ))
}

fn rule_edge(source: (ObjectType, &str), full_id: &str, now: Timestamp) -> CrossReference {
    CrossReference::new(
        source,
        (ObjectType::Rule, full_id),
        LinkType::RuleId,
        json!({
            "rule_short_id": ids::rule_short_id(full_id),
            "full_rule_id": full_id,
        }),
        now,
    )
}

/// Rule ids mentioned anywhere in the guide HTML, its product and its profile.
pub fn extract_guide_edges(guide: &Guide) -> Vec<CrossReference> {
    let now = Utc::now();
    let source = (ObjectType::Guide, guide.id.as_str());
    let mut edges = Vec::new();

    let mut seen = HashSet::new();
    for caps in RULE_ID_RE.captures_iter(&guide.html_content) {
        let full_id = &caps[0];
        if seen.insert(full_id.to_string()) {
            edges.push(rule_edge(source, full_id, now));
        }
    }

    edges.extend(product_edge(source, &guide.product, now));

    let profile_id = guide.profile_id.trim();
    if !profile_id.is_empty() {
        let key = ids::profile_key(&guide.product, profile_id);
        edges.push(CrossReference::new(
            source,
            (ObjectType::Profile, key.as_str()),
            LinkType::ProfileId,
            json!({ "profile_id": profile_id, "title": guide.title }),
            now,
        ));
    }

    tracing::debug!(guide = %guide.id, edges = edges.len(), "extracted guide edges");
    edges
}

/// CCE numbers in the mapping column, deduplicated, plus the product.
pub fn extract_table_edges(parsed: &ParsedTable) -> Vec<CrossReference> {
    let now = Utc::now();
    let table = &parsed.table;
    let source = (ObjectType::Table, table.id.as_str());
    let mut edges = Vec::new();

    let mut seen = HashSet::new();
    for entry in &parsed.entries {
        let Some(cce) = CCE_RE.find(&entry.mapping) else {
            continue;
        };
        let cce = cce.as_str();
        if seen.insert(cce.to_string()) {
            edges.push(CrossReference::new(
                source,
                (ObjectType::Cce, cce),
                LinkType::Cce,
                json!({ "cce": cce, "rule_title": entry.rule_title }),
                now,
            ));
        }
    }

    edges.extend(product_edge(source, &table.product, now));
    edges
}

/// One edge per profile, plus the product.
pub fn extract_manifest_edges(parsed: &ParsedManifest) -> Vec<CrossReference> {
    let now = Utc::now();
    let manifest = &parsed.manifest;
    let source = (ObjectType::Manifest, manifest.id.as_str());
    let mut edges: Vec<CrossReference> = parsed
        .profiles
        .iter()
        .map(|profile| {
            CrossReference::new(
                source,
                (ObjectType::Profile, profile.id.as_str()),
                LinkType::ProfileId,
                json!({ "profile_id": profile.profile_id, "rule_count": profile.rule_count }),
                now,
            )
        })
        .collect();
    edges.extend(product_edge(source, &manifest.product, now));
    edges
}

/// Unique rule ids, unique CCE identifiers, one edge per profile, the product.
pub fn extract_data_stream_edges(parsed: &ParsedDataStream) -> Vec<CrossReference> {
    let now = Utc::now();
    let ds = &parsed.data_stream;
    let source = (ObjectType::Datastream, ds.id.as_str());
    let mut edges = Vec::new();

    let mut seen_rules = HashSet::new();
    for rule in &parsed.rules {
        if seen_rules.insert(rule.id.as_str()) {
            edges.push(rule_edge(source, &rule.id, now));
        }
    }

    // each CCE once, attributed to the first rule carrying it
    let mut seen_cces = HashSet::new();
    for rule in &parsed.rules {
        for cce in rule.cce_identifiers() {
            if cce.is_empty() || !seen_cces.insert(cce) {
                continue;
            }
            edges.push(CrossReference::new(
                source,
                (ObjectType::Cce, cce),
                LinkType::Cce,
                json!({ "cce": cce, "rule_id": rule.id }),
                now,
            ));
        }
    }

    for profile in &parsed.profiles {
        let key = ids::profile_key(&ds.product, &profile.id);
        edges.push(CrossReference::new(
            source,
            (ObjectType::Profile, key.as_str()),
            LinkType::ProfileId,
            json!({ "profile_id": profile.id, "title": profile.title }),
            now,
        ));
    }

    edges.extend(product_edge(source, &ds.product, now));

    tracing::debug!(data_stream = %ds.id, edges = edges.len(), "extracted data stream edges");
    edges
}

#[cfg(test)]
mod tests;
