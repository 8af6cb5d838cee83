//! HTML tables and their entries.

use crate::query::{Filter, Select};
use crate::{Store, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use ssgkb_model::{Page, PageRequest, ParsedTable, Table, TableEntry};

const TABLES: Select<'static> = Select {
    from: "tables",
    columns: "id, product, table_type, title, description, created_at, updated_at",
    order_by: "id",
};

// source row order, not the primary key
const ENTRIES: Select<'static> = Select {
    from: "table_entries",
    columns: "id, table_id, position, mapping, rule_title, description, rationale, created_at, updated_at",
    order_by: "table_id, position, id",
};

#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    pub product: Option<String>,
    pub table_type: Option<String>,
}

fn table_row(row: &Row<'_>) -> rusqlite::Result<Table> {
    Ok(Table {
        id: row.get(0)?,
        product: row.get(1)?,
        table_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn entry_row(row: &Row<'_>) -> rusqlite::Result<TableEntry> {
    Ok(TableEntry {
        id: row.get(0)?,
        table_id: row.get(1)?,
        position: row.get(2)?,
        mapping: row.get(3)?,
        rule_title: row.get(4)?,
        description: row.get(5)?,
        rationale: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn upsert_table(conn: &Connection, t: &Table) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO tables (id, product, table_type, title, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            product = excluded.product,
            table_type = excluded.table_type,
            title = excluded.title,
            description = excluded.description,
            updated_at = excluded.updated_at",
        params![t.id, t.product, t.table_type, t.title, t.description, t.created_at, t.updated_at],
    )?;
    Ok(())
}

fn upsert_entry(conn: &Connection, e: &TableEntry) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO table_entries (id, table_id, position, mapping, rule_title, description, rationale, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            table_id = excluded.table_id,
            position = excluded.position,
            mapping = excluded.mapping,
            rule_title = excluded.rule_title,
            description = excluded.description,
            rationale = excluded.rationale,
            updated_at = excluded.updated_at",
    )?
    .execute(params![
        e.id,
        e.table_id,
        e.position,
        e.mapping,
        e.rule_title,
        e.description,
        e.rationale,
        e.created_at,
        e.updated_at
    ])?;
    Ok(())
}

impl Store {
    pub fn save_table(&self, table: &Table) -> StoreResult<()> {
        self.with_conn(|conn| upsert_table(conn, table))
    }

    pub fn get_table(&self, id: &str) -> StoreResult<Table> {
        self.with_conn(|conn| {
            TABLES
                .one(conn, &Filter::new().eq("id", Some(id)), table_row)?
                .ok_or_else(|| StoreError::not_found("table", id))
        })
    }

    pub fn list_tables(&self, filter: &TableFilter, page: PageRequest) -> StoreResult<Page<Table>> {
        let f = Filter::new()
            .eq("product", filter.product.as_deref())
            .eq("table_type", filter.table_type.as_deref());
        self.with_conn(|conn| TABLES.page(conn, &f, page, table_row))
    }

    pub fn save_table_entry(&self, entry: &TableEntry) -> StoreResult<()> {
        self.with_conn(|conn| upsert_entry(conn, entry))
    }

    pub fn get_table_entry(&self, id: &str) -> StoreResult<TableEntry> {
        self.with_conn(|conn| {
            ENTRIES
                .one(conn, &Filter::new().eq("id", Some(id)), entry_row)?
                .ok_or_else(|| StoreError::not_found("table entry", id))
        })
    }

    /// Entries of one table in source row order.
    pub fn list_table_entries(&self, table_id: &str, page: PageRequest) -> StoreResult<Page<TableEntry>> {
        let f = Filter::new().eq("table_id", Some(table_id));
        self.with_conn(|conn| ENTRIES.page(conn, &f, page, entry_row))
    }

    /// Upserts the table and replaces its entries.
    pub fn save_parsed_table(&self, parsed: &ParsedTable) -> StoreResult<()> {
        self.with_tx(|tx| {
            upsert_table(tx, &parsed.table)?;
            tx.execute("DELETE FROM table_entries WHERE table_id = ?1", [&parsed.table.id])?;
            for entry in &parsed.entries {
                upsert_entry(tx, entry)?;
            }
            Ok(())
        })?;
        tracing::debug!(table = %parsed.table.id, entries = parsed.entries.len(), "saved table");
        Ok(())
    }
}
