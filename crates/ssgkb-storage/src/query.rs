//! SQL assembly helpers shared by the per-entity modules.
//!
//! Every value reaches SQLite as a bound `?` parameter; only column names and
//! fixed fragments are spliced into the statement text.

use crate::StoreResult;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, ToSql};
use ssgkb_model::{Page, PageRequest};
use std::str::FromStr;

/// Conjunction of `WHERE` clauses with their bound values, in order.
#[derive(Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `column = ?`, skipped when `value` is `None` or blank.
    pub(crate) fn eq(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.clauses.push(format!("{column} = ?"));
            self.params.push(Box::new(v.to_string()));
        }
        self
    }

    /// Arbitrary clause; `values` bind its `?` placeholders left to right.
    pub(crate) fn clause(mut self, sql: &str, values: Vec<Box<dyn ToSql>>) -> Self {
        debug_assert_eq!(sql.matches('?').count(), values.len());
        self.clauses.push(format!("({sql})"));
        self.params.extend(values);
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn bound(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|b| b.as_ref()).collect()
    }
}

/// A `SELECT` over one table (or join) with a fixed column list and order.
pub(crate) struct Select<'a> {
    pub from: &'a str,
    pub columns: &'a str,
    pub order_by: &'a str,
}

impl Select<'_> {
    /// Filtered count plus one page, ordered by `order_by`.
    pub(crate) fn page<T>(
        &self,
        conn: &Connection,
        filter: &Filter,
        page: PageRequest,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Page<T>> {
        let where_sql = filter.where_sql();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{where_sql}", self.from),
            filter.bound().as_slice(),
            |r| r.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM {}{where_sql} ORDER BY {} LIMIT ? OFFSET ?",
            self.columns, self.from, self.order_by
        );
        let (limit, offset) = (page.limit(), page.offset());
        let mut bound = filter.bound();
        bound.push(&limit);
        bound.push(&offset);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(bound.as_slice(), map)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(Page { items, total })
    }

    /// Every matching row; `window` applies `LIMIT`/`OFFSET` when present.
    pub(crate) fn all<T>(
        &self,
        conn: &Connection,
        filter: &Filter,
        window: Option<(i64, i64)>,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Vec<T>> {
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            self.columns,
            self.from,
            filter.where_sql(),
            self.order_by
        );
        let mut bound = filter.bound();
        if let Some((limit, offset)) = &window {
            sql.push_str(" LIMIT ? OFFSET ?");
            bound.push(limit);
            bound.push(offset);
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(bound.as_slice(), map)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    /// The single row matching `filter`, if any.
    pub(crate) fn one<T>(
        &self,
        conn: &Connection,
        filter: &Filter,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Option<T>> {
        Ok(self.all(conn, filter, Some((1, 0)), map)?.pop())
    }
}

/// Reads a text column through `FromStr`, reporting bad values as a column
/// conversion failure.
pub(crate) fn parsed<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(crate) fn boxed(value: impl ToSql + 'static) -> Box<dyn ToSql> {
    Box::new(value)
}
