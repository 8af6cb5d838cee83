//! Cross-reference edges.

use crate::query::{boxed, parsed, Filter, Select};
use crate::{Store, StoreResult};
use rusqlite::{params, Row};
use ssgkb_model::{CrossReference, LinkType, ObjectType};

const EDGES: Select<'static> = Select {
    from: "cross_references",
    columns: "id, source_type, source_id, target_type, target_id, link_type, metadata_json, created_at",
    order_by: "id",
};

fn edge_row(row: &Row<'_>) -> rusqlite::Result<CrossReference> {
    Ok(CrossReference {
        id: row.get(0)?,
        source_type: parsed(row, 1)?,
        source_id: row.get(2)?,
        target_type: parsed(row, 3)?,
        target_id: row.get(4)?,
        link_type: parsed(row, 5)?,
        metadata_json: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// `limit <= 0` returns everything; otherwise the offset is clamped to 0.
fn window(limit: i64, offset: i64) -> Option<(i64, i64)> {
    (limit > 0).then(|| (limit, offset.max(0)))
}

impl Store {
    /// Inserts edges in one transaction, ignoring rows already present.
    /// Returns how many were new.
    pub fn save_cross_references(&self, edges: &[CrossReference]) -> StoreResult<usize> {
        if edges.is_empty() {
            return Ok(0);
        }
        for edge in edges {
            serde_json::from_str::<serde_json::Value>(&edge.metadata_json)?;
        }
        let inserted = self.with_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO cross_references
                    (source_type, source_id, target_type, target_id, link_type, metadata_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut inserted = 0;
            for e in edges {
                inserted += stmt.execute(params![
                    e.source_type.as_str(),
                    e.source_id,
                    e.target_type.as_str(),
                    e.target_id,
                    e.link_type.as_str(),
                    e.metadata_json,
                    e.created_at
                ])?;
            }
            Ok(inserted)
        })?;
        tracing::debug!(offered = edges.len(), inserted, "saved cross-references");
        Ok(inserted)
    }

    pub fn get_cross_references(
        &self,
        source_type: ObjectType,
        source_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<CrossReference>> {
        let f = Filter::new().clause(
            "source_type = ? AND source_id = ?",
            vec![boxed(source_type.as_str()), boxed(source_id.to_string())],
        );
        self.with_conn(|conn| EDGES.all(conn, &f, window(limit, offset), edge_row))
    }

    pub fn get_cross_references_by_target(
        &self,
        target_type: ObjectType,
        target_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<CrossReference>> {
        let f = Filter::new().clause(
            "target_type = ? AND target_id = ?",
            vec![boxed(target_type.as_str()), boxed(target_id.to_string())],
        );
        self.with_conn(|conn| EDGES.all(conn, &f, window(limit, offset), edge_row))
    }

    /// Edges where the object appears on either end, optionally restricted
    /// to one link type.
    pub fn find_related_objects(
        &self,
        object_type: ObjectType,
        object_id: &str,
        link_type: Option<LinkType>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<CrossReference>> {
        let mut f = Filter::new().clause(
            "(source_type = ? AND source_id = ?) OR (target_type = ? AND target_id = ?)",
            vec![
                boxed(object_type.as_str()),
                boxed(object_id.to_string()),
                boxed(object_type.as_str()),
                boxed(object_id.to_string()),
            ],
        );
        if let Some(link) = link_type {
            f = f.clause("link_type = ?", vec![boxed(link.as_str())]);
        }
        self.with_conn(|conn| EDGES.all(conn, &f, window(limit, offset), edge_row))
    }

    /// Every edge whose target is an identifier node; the closure input.
    pub fn list_identifier_edges(&self) -> StoreResult<Vec<CrossReference>> {
        let kinds: Vec<&'static str> = ObjectType::ALL
            .iter()
            .filter(|t| t.is_identifier())
            .map(|t| t.as_str())
            .collect();
        let placeholders = vec!["?"; kinds.len()].join(", ");
        let f = Filter::new().clause(
            &format!("target_type IN ({placeholders})"),
            kinds.into_iter().map(boxed).collect(),
        );
        self.with_conn(|conn| EDGES.all(conn, &f, None, edge_row))
    }

    pub fn count_cross_references(&self) -> StoreResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM cross_references", [], |r| r.get(0))?)
        })
    }
}
