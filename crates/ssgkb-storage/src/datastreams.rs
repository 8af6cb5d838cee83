//! SCAP data streams: data streams, benchmarks, DS profiles, groups and rules.

use crate::query::{boxed, parsed, Filter, Select};
use crate::{Store, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use ssgkb_model::ids::XCCDF_PROFILE_PREFIX;
use ssgkb_model::{
    build_forest, Benchmark, DataStream, DsGroup, DsProfile, DsProfileRule, DsRule,
    DsRuleIdentifier, DsRuleReference, FlatNode, Page, PageRequest, ParsedDataStream, Severity,
    TreeNode,
};

const DATA_STREAMS: Select<'static> = Select {
    from: "data_streams",
    columns: "id, product, scap_version, timestamp, created_at, updated_at",
    order_by: "id",
};

const BENCHMARKS: Select<'static> = Select {
    from: "benchmarks",
    columns: "id, data_stream_id, title, description, version, status, status_date, \
              profile_count, group_count, rule_count, created_at, updated_at",
    order_by: "id",
};

const DS_PROFILES: Select<'static> = Select {
    from: "ds_profiles",
    columns: "benchmark_id, id, title, description, version, rule_count, created_at, updated_at",
    order_by: "benchmark_id, id",
};

const DS_GROUPS: Select<'static> = Select {
    from: "ds_groups",
    columns: "benchmark_id, id, parent_id, title, description, level, group_count, rule_count, \
              created_at, updated_at",
    order_by: "benchmark_id, id",
};

const DS_RULES: Select<'static> = Select {
    from: "ds_rules",
    columns: "benchmark_id, id, group_id, title, description, rationale, severity, selected, \
              weight, version, created_at, updated_at",
    order_by: "benchmark_id, id",
};

#[derive(Debug, Clone, Default)]
pub struct DsGroupFilter {
    pub benchmark_id: Option<String>,
    pub parent_id: Option<String>,
}

/// `profile_id` keeps only rules that DS profile selects; full XCCDF profile
/// ids and short forms are both accepted.
#[derive(Debug, Clone, Default)]
pub struct DsRuleFilter {
    pub benchmark_id: Option<String>,
    pub group_id: Option<String>,
    pub severity: Option<Severity>,
    pub profile_id: Option<String>,
}

fn data_stream_row(row: &Row<'_>) -> rusqlite::Result<DataStream> {
    Ok(DataStream {
        id: row.get(0)?,
        product: row.get(1)?,
        scap_version: row.get(2)?,
        timestamp: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn benchmark_row(row: &Row<'_>) -> rusqlite::Result<Benchmark> {
    Ok(Benchmark {
        id: row.get(0)?,
        data_stream_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        version: row.get(4)?,
        status: row.get(5)?,
        status_date: row.get(6)?,
        profile_count: row.get(7)?,
        group_count: row.get(8)?,
        rule_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn ds_profile_row(row: &Row<'_>) -> rusqlite::Result<DsProfile> {
    Ok(DsProfile {
        benchmark_id: row.get(0)?,
        id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        version: row.get(4)?,
        rule_count: row.get(5)?,
        selected_rules: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn ds_group_row(row: &Row<'_>) -> rusqlite::Result<DsGroup> {
    Ok(DsGroup {
        benchmark_id: row.get(0)?,
        id: row.get(1)?,
        parent_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        level: row.get(5)?,
        group_count: row.get(6)?,
        rule_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn ds_rule_row(row: &Row<'_>) -> rusqlite::Result<DsRule> {
    Ok(DsRule {
        benchmark_id: row.get(0)?,
        id: row.get(1)?,
        group_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        rationale: row.get(5)?,
        severity: parsed(row, 6)?,
        selected: row.get(7)?,
        weight: row.get(8)?,
        version: row.get(9)?,
        references: Vec::new(),
        identifiers: Vec::new(),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

fn upsert_data_stream(conn: &Connection, ds: &DataStream) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO data_streams (id, product, scap_version, timestamp, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            product = excluded.product,
            scap_version = excluded.scap_version,
            timestamp = excluded.timestamp,
            updated_at = excluded.updated_at",
        params![ds.id, ds.product, ds.scap_version, ds.timestamp, ds.created_at, ds.updated_at],
    )?;
    Ok(())
}

fn upsert_benchmark(conn: &Connection, b: &Benchmark) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO benchmarks (id, data_stream_id, title, description, version, status, status_date,
                                 profile_count, group_count, rule_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
            data_stream_id = excluded.data_stream_id,
            title = excluded.title,
            description = excluded.description,
            version = excluded.version,
            status = excluded.status,
            status_date = excluded.status_date,
            profile_count = excluded.profile_count,
            group_count = excluded.group_count,
            rule_count = excluded.rule_count,
            updated_at = excluded.updated_at",
        params![
            b.id,
            b.data_stream_id,
            b.title,
            b.description,
            b.version,
            b.status,
            b.status_date,
            b.profile_count,
            b.group_count,
            b.rule_count,
            b.created_at,
            b.updated_at
        ],
    )?;
    Ok(())
}

fn upsert_ds_profile(conn: &Connection, p: &DsProfile) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO ds_profiles (benchmark_id, id, title, description, version, rule_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(benchmark_id, id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            version = excluded.version,
            rule_count = excluded.rule_count,
            updated_at = excluded.updated_at",
    )?
    .execute(params![
        p.benchmark_id,
        p.id,
        p.title,
        p.description,
        p.version,
        p.rule_count,
        p.created_at,
        p.updated_at
    ])?;
    conn.execute(
        "DELETE FROM ds_profile_rules WHERE benchmark_id = ?1 AND profile_id = ?2",
        params![p.benchmark_id, p.id],
    )?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO ds_profile_rules (benchmark_id, profile_id, rule_id, selected) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for sel in &p.selected_rules {
        insert.execute(params![p.benchmark_id, p.id, sel.rule_id, sel.selected])?;
    }
    Ok(())
}

fn upsert_ds_group(conn: &Connection, g: &DsGroup) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO ds_groups (benchmark_id, id, parent_id, title, description, level, group_count, rule_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(benchmark_id, id) DO UPDATE SET
            parent_id = excluded.parent_id,
            title = excluded.title,
            description = excluded.description,
            level = excluded.level,
            group_count = excluded.group_count,
            rule_count = excluded.rule_count,
            updated_at = excluded.updated_at",
    )?
    .execute(params![
        g.benchmark_id,
        g.id,
        g.parent_id,
        g.title,
        g.description,
        g.level,
        g.group_count,
        g.rule_count,
        g.created_at,
        g.updated_at
    ])?;
    Ok(())
}

fn upsert_ds_rule(conn: &Connection, r: &DsRule) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO ds_rules (benchmark_id, id, group_id, title, description, rationale, severity, selected, weight, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(benchmark_id, id) DO UPDATE SET
            group_id = excluded.group_id,
            title = excluded.title,
            description = excluded.description,
            rationale = excluded.rationale,
            severity = excluded.severity,
            selected = excluded.selected,
            weight = excluded.weight,
            version = excluded.version,
            updated_at = excluded.updated_at",
    )?
    .execute(params![
        r.benchmark_id,
        r.id,
        r.group_id,
        r.title,
        r.description,
        r.rationale,
        r.severity.as_str(),
        r.selected,
        r.weight,
        r.version,
        r.created_at,
        r.updated_at
    ])?;

    let key = params![r.benchmark_id, r.id];
    conn.execute("DELETE FROM ds_rule_references WHERE benchmark_id = ?1 AND rule_id = ?2", key)?;
    conn.execute("DELETE FROM ds_rule_identifiers WHERE benchmark_id = ?1 AND rule_id = ?2", key)?;

    let mut refs = conn.prepare_cached(
        "INSERT INTO ds_rule_references (benchmark_id, rule_id, href, ref_id) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for reference in &r.references {
        refs.execute(params![r.benchmark_id, r.id, reference.href, reference.ref_id])?;
    }
    let mut idents = conn.prepare_cached(
        "INSERT INTO ds_rule_identifiers (benchmark_id, rule_id, system, identifier) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for ident in &r.identifiers {
        idents.execute(params![r.benchmark_id, r.id, ident.system, ident.identifier])?;
    }
    Ok(())
}

const BENCHMARK_DEPENDENTS: [&str; 6] = [
    "ds_rule_identifiers",
    "ds_rule_references",
    "ds_rules",
    "ds_groups",
    "ds_profile_rules",
    "ds_profiles",
];

fn delete_benchmark_dependents(conn: &Connection, benchmark_id: &str) -> StoreResult<usize> {
    let mut removed = 0;
    for table in BENCHMARK_DEPENDENTS {
        removed += conn.execute(&format!("DELETE FROM {table} WHERE benchmark_id = ?1"), [benchmark_id])?;
    }
    Ok(removed)
}

fn load_selections(conn: &Connection, profile: &mut DsProfile) -> StoreResult<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT profile_id, rule_id, selected FROM ds_profile_rules
         WHERE benchmark_id = ?1 AND profile_id = ?2 ORDER BY id",
    )?;
    profile.selected_rules = stmt
        .query_map(params![profile.benchmark_id, profile.id], |row| {
            Ok(DsProfileRule {
                profile_id: row.get(0)?,
                rule_id: row.get(1)?,
                selected: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(())
}

fn load_rule_children(conn: &Connection, rule: &mut DsRule) -> StoreResult<()> {
    let key = params![rule.benchmark_id, rule.id];
    rule.references = conn
        .prepare_cached(
            "SELECT href, ref_id FROM ds_rule_references
             WHERE benchmark_id = ?1 AND rule_id = ?2 ORDER BY id",
        )?
        .query_map(key, |row| {
            Ok(DsRuleReference {
                href: row.get(0)?,
                ref_id: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rule.identifiers = conn
        .prepare_cached(
            "SELECT system, identifier FROM ds_rule_identifiers
             WHERE benchmark_id = ?1 AND rule_id = ?2 ORDER BY id",
        )?
        .query_map(key, |row| {
            Ok(DsRuleIdentifier {
                system: row.get(0)?,
                identifier: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(())
}

fn full_profile_id(profile: &str) -> String {
    if profile.starts_with(XCCDF_PROFILE_PREFIX) {
        profile.to_string()
    } else {
        format!("{XCCDF_PROFILE_PREFIX}{profile}")
    }
}

fn ds_rule_filter(filter: &DsRuleFilter) -> Filter {
    let mut f = Filter::new()
        .eq("benchmark_id", filter.benchmark_id.as_deref())
        .eq("group_id", filter.group_id.as_deref());
    if let Some(severity) = filter.severity {
        f = f.clause("severity = ?", vec![boxed(severity.as_str())]);
    }
    if let Some(profile) = filter.profile_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        f = f.clause(
            "EXISTS (SELECT 1 FROM ds_profile_rules p
                     WHERE p.benchmark_id = ds_rules.benchmark_id
                       AND p.rule_id = ds_rules.id
                       AND p.selected = 1
                       AND (p.profile_id = ? OR p.profile_id = ?))",
            vec![boxed(profile.to_string()), boxed(full_profile_id(profile))],
        );
    }
    f
}

// ----------------------------------------------------------------------------
// Store API
// ----------------------------------------------------------------------------

impl Store {
    pub fn save_data_stream(&self, ds: &DataStream) -> StoreResult<()> {
        self.with_conn(|conn| upsert_data_stream(conn, ds))
    }

    pub fn get_data_stream(&self, id: &str) -> StoreResult<DataStream> {
        self.with_conn(|conn| {
            DATA_STREAMS
                .one(conn, &Filter::new().eq("id", Some(id)), data_stream_row)?
                .ok_or_else(|| StoreError::not_found("data stream", id))
        })
    }

    pub fn list_data_streams(&self, product: Option<&str>, page: PageRequest) -> StoreResult<Page<DataStream>> {
        let f = Filter::new().eq("product", product);
        self.with_conn(|conn| DATA_STREAMS.page(conn, &f, page, data_stream_row))
    }

    pub fn save_benchmark(&self, benchmark: &Benchmark) -> StoreResult<()> {
        self.with_conn(|conn| upsert_benchmark(conn, benchmark))
    }

    pub fn get_benchmark(&self, id: &str) -> StoreResult<Benchmark> {
        self.with_conn(|conn| {
            BENCHMARKS
                .one(conn, &Filter::new().eq("id", Some(id)), benchmark_row)?
                .ok_or_else(|| StoreError::not_found("benchmark", id))
        })
    }

    pub fn list_benchmarks(&self, data_stream_id: Option<&str>, page: PageRequest) -> StoreResult<Page<Benchmark>> {
        let f = Filter::new().eq("data_stream_id", data_stream_id);
        self.with_conn(|conn| BENCHMARKS.page(conn, &f, page, benchmark_row))
    }

    /// Upserts the profile and replaces its selections.
    pub fn save_ds_profile(&self, profile: &DsProfile) -> StoreResult<()> {
        self.with_tx(|tx| upsert_ds_profile(tx, profile))
    }

    pub fn get_ds_profile(&self, benchmark_id: &str, id: &str) -> StoreResult<DsProfile> {
        let f = Filter::new().eq("benchmark_id", Some(benchmark_id)).eq("id", Some(id));
        self.with_conn(|conn| {
            let mut profile = DS_PROFILES
                .one(conn, &f, ds_profile_row)?
                .ok_or_else(|| StoreError::not_found("ds profile", format!("{benchmark_id}/{id}")))?;
            load_selections(conn, &mut profile)?;
            Ok(profile)
        })
    }

    pub fn list_ds_profiles(&self, benchmark_id: Option<&str>, page: PageRequest) -> StoreResult<Page<DsProfile>> {
        let f = Filter::new().eq("benchmark_id", benchmark_id);
        self.with_conn(|conn| {
            let mut out = DS_PROFILES.page(conn, &f, page, ds_profile_row)?;
            for profile in &mut out.items {
                load_selections(conn, profile)?;
            }
            Ok(out)
        })
    }

    pub fn save_ds_group(&self, group: &DsGroup) -> StoreResult<()> {
        self.with_conn(|conn| upsert_ds_group(conn, group))
    }

    pub fn get_ds_group(&self, benchmark_id: &str, id: &str) -> StoreResult<DsGroup> {
        let f = Filter::new().eq("benchmark_id", Some(benchmark_id)).eq("id", Some(id));
        self.with_conn(|conn| {
            DS_GROUPS
                .one(conn, &f, ds_group_row)?
                .ok_or_else(|| StoreError::not_found("ds group", format!("{benchmark_id}/{id}")))
        })
    }

    pub fn list_ds_groups(&self, filter: &DsGroupFilter, page: PageRequest) -> StoreResult<Page<DsGroup>> {
        let mut f = Filter::new().eq("benchmark_id", filter.benchmark_id.as_deref());
        if let Some(parent) = filter.parent_id.as_deref() {
            f = f.clause("parent_id = ?", vec![boxed(parent.trim().to_string())]);
        }
        self.with_conn(|conn| DS_GROUPS.page(conn, &f, page, ds_group_row))
    }

    /// Upserts the rule and replaces its references and identifiers.
    pub fn save_ds_rule(&self, rule: &DsRule) -> StoreResult<()> {
        self.with_tx(|tx| upsert_ds_rule(tx, rule))
    }

    pub fn get_ds_rule(&self, benchmark_id: &str, id: &str) -> StoreResult<DsRule> {
        let f = Filter::new().eq("benchmark_id", Some(benchmark_id)).eq("id", Some(id));
        self.with_conn(|conn| {
            let mut rule = DS_RULES
                .one(conn, &f, ds_rule_row)?
                .ok_or_else(|| StoreError::not_found("ds rule", format!("{benchmark_id}/{id}")))?;
            load_rule_children(conn, &mut rule)?;
            Ok(rule)
        })
    }

    pub fn list_ds_rules(&self, filter: &DsRuleFilter, page: PageRequest) -> StoreResult<Page<DsRule>> {
        let f = ds_rule_filter(filter);
        self.with_conn(|conn| {
            let mut out = DS_RULES.page(conn, &f, page, ds_rule_row)?;
            for rule in &mut out.items {
                load_rule_children(conn, rule)?;
            }
            Ok(out)
        })
    }

    /// Upserts the data stream and replaces its benchmark with the parsed
    /// one, including every profile, group and rule.
    pub fn save_parsed_data_stream(&self, parsed: &ParsedDataStream) -> StoreResult<()> {
        let ds_id = parsed.data_stream.id.as_str();
        let benchmark_id = parsed.benchmark.id.as_str();
        self.with_tx(|tx| {
            upsert_data_stream(tx, &parsed.data_stream)?;

            let previous: Vec<String> = tx
                .prepare("SELECT id FROM benchmarks WHERE data_stream_id = ?1")?
                .query_map([ds_id], |r| r.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            for old in previous.iter().filter(|old| old.as_str() != benchmark_id) {
                delete_benchmark_dependents(tx, old)?;
                tx.execute("DELETE FROM benchmarks WHERE id = ?1", [old])?;
            }
            // the benchmark row itself is upserted so it keeps created_at
            delete_benchmark_dependents(tx, benchmark_id)?;

            upsert_benchmark(tx, &parsed.benchmark)?;
            for profile in &parsed.profiles {
                upsert_ds_profile(tx, profile)?;
            }
            for group in &parsed.groups {
                upsert_ds_group(tx, group)?;
            }
            for rule in &parsed.rules {
                upsert_ds_rule(tx, rule)?;
            }
            Ok(())
        })?;
        tracing::debug!(
            data_stream = %ds_id,
            benchmark = %benchmark_id,
            profiles = parsed.profiles.len(),
            groups = parsed.groups.len(),
            rules = parsed.rules.len(),
            "saved data stream"
        );
        Ok(())
    }

    /// The benchmark's DS groups and rules linked into a forest ordered by
    /// title.
    pub fn build_benchmark_tree_nodes(&self, benchmark_id: &str) -> StoreResult<Vec<TreeNode>> {
        self.get_benchmark(benchmark_id)?;
        let scope = Filter::new().eq("benchmark_id", Some(benchmark_id));
        self.with_conn(|conn| {
            let groups = DS_GROUPS.all(conn, &scope, None, ds_group_row)?;
            let rules = DS_RULES.all(conn, &scope, None, ds_rule_row)?;
            let nodes = groups
                .iter()
                .map(FlatNode::from)
                .chain(rules.iter().map(FlatNode::from))
                .collect();
            Ok(build_forest(nodes))
        })
    }
}
