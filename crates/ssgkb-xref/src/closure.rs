//! Symmetric closure over identifier edges.

use chrono::Utc;
use ssgkb_model::{CrossReference, LinkType, ObjectType};
use std::collections::{BTreeMap, HashSet};

/// Object-to-object edges for every pair of sources sharing an identifier.
///
/// Only edges whose target is an identifier (rule, profile, product, CCE) take
/// part, grouped by `(link_type, target_id)`. Within a bucket each distinct
/// source keeps its first edge. Every unordered pair `(a, b)` yields
/// `a → b` carrying `a`'s metadata and `b → a` carrying `b`'s. Buckets are
/// visited in key order, so the output order is a function of the input order.
pub fn materialize(edges: &[CrossReference]) -> Vec<CrossReference> {
    let mut buckets: BTreeMap<(LinkType, &str), Vec<&CrossReference>> = BTreeMap::new();
    let mut seen: HashSet<(LinkType, &str, ObjectType, &str)> = HashSet::new();

    for edge in edges.iter().filter(|e| e.target_type.is_identifier()) {
        let (source_type, source_id) = edge.source_key();
        if !seen.insert((edge.link_type, edge.target_id.as_str(), source_type, source_id)) {
            continue;
        }
        buckets
            .entry((edge.link_type, edge.target_id.as_str()))
            .or_default()
            .push(edge);
    }

    let now = Utc::now();
    let mut out = Vec::new();
    let mut largest = 0;
    for ((link_type, _), members) in &buckets {
        largest = largest.max(members.len());
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                out.push(linked(a, b, *link_type, now));
                out.push(linked(b, a, *link_type, now));
            }
        }
    }

    tracing::debug!(
        input = edges.len(),
        buckets = buckets.len(),
        largest_bucket = largest,
        materialized = out.len(),
        "materialized cross-reference closure"
    );
    out
}

fn linked(
    from: &CrossReference,
    to: &CrossReference,
    link_type: LinkType,
    now: chrono::DateTime<Utc>,
) -> CrossReference {
    CrossReference {
        id: 0,
        source_type: from.source_type,
        source_id: from.source_id.clone(),
        target_type: to.source_type,
        target_id: to.source_id.clone(),
        link_type,
        metadata_json: from.metadata_json.clone(),
        created_at: now,
    }
}
