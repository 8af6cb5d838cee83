//! Table definitions.
//!
//! XCCDF group/rule/profile ids repeat across products, so those tables are
//! keyed by their container (`guide_id` / `benchmark_id`) plus the id.
//! Timestamps are RFC 3339 text.

use rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS guides (
    id           TEXT PRIMARY KEY,
    product      TEXT NOT NULL,
    profile_id   TEXT NOT NULL,
    short_id     TEXT NOT NULL,
    title        TEXT NOT NULL,
    html_content TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_guides_product ON guides(product);
CREATE INDEX IF NOT EXISTS idx_guides_profile ON guides(profile_id);

CREATE TABLE IF NOT EXISTS guide_groups (
    guide_id    TEXT NOT NULL,
    id          TEXT NOT NULL,
    parent_id   TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    level       INTEGER NOT NULL,
    group_count INTEGER NOT NULL,
    rule_count  INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (guide_id, id)
);
CREATE INDEX IF NOT EXISTS idx_guide_groups_parent ON guide_groups(guide_id, parent_id);

CREATE TABLE IF NOT EXISTS guide_rules (
    guide_id    TEXT NOT NULL,
    id          TEXT NOT NULL,
    group_id    TEXT NOT NULL,
    short_id    TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    rationale   TEXT NOT NULL,
    severity    TEXT NOT NULL,
    level       INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (guide_id, id)
);
CREATE INDEX IF NOT EXISTS idx_guide_rules_group ON guide_rules(guide_id, group_id);
CREATE INDEX IF NOT EXISTS idx_guide_rules_severity ON guide_rules(severity);
CREATE INDEX IF NOT EXISTS idx_guide_rules_short_id ON guide_rules(short_id);

CREATE TABLE IF NOT EXISTS rule_references (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    guide_id TEXT NOT NULL,
    rule_id  TEXT NOT NULL,
    href     TEXT NOT NULL,
    label    TEXT NOT NULL,
    value    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rule_references_rule ON rule_references(guide_id, rule_id);

CREATE TABLE IF NOT EXISTS tables (
    id          TEXT PRIMARY KEY,
    product     TEXT NOT NULL,
    table_type  TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tables_product ON tables(product);

CREATE TABLE IF NOT EXISTS table_entries (
    id          TEXT PRIMARY KEY,
    table_id    TEXT NOT NULL,
    position    INTEGER NOT NULL,
    mapping     TEXT NOT NULL,
    rule_title  TEXT NOT NULL,
    description TEXT NOT NULL,
    rationale   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_table_entries_table ON table_entries(table_id, position);
CREATE INDEX IF NOT EXISTS idx_table_entries_mapping ON table_entries(mapping);

CREATE TABLE IF NOT EXISTS manifests (
    id         TEXT PRIMARY KEY,
    product    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_manifests_product ON manifests(product);

CREATE TABLE IF NOT EXISTS profiles (
    id          TEXT PRIMARY KEY,
    manifest_id TEXT NOT NULL,
    product     TEXT NOT NULL,
    profile_id  TEXT NOT NULL,
    rule_count  INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_profiles_manifest ON profiles(manifest_id);
CREATE INDEX IF NOT EXISTS idx_profiles_product ON profiles(product);

CREATE TABLE IF NOT EXISTS profile_rules (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id    TEXT NOT NULL,
    rule_short_id TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_profile_rules_profile ON profile_rules(profile_id);
CREATE INDEX IF NOT EXISTS idx_profile_rules_rule ON profile_rules(rule_short_id);

CREATE TABLE IF NOT EXISTS data_streams (
    id           TEXT PRIMARY KEY,
    product      TEXT NOT NULL,
    scap_version TEXT NOT NULL,
    timestamp    TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_data_streams_product ON data_streams(product);

CREATE TABLE IF NOT EXISTS benchmarks (
    id             TEXT PRIMARY KEY,
    data_stream_id TEXT NOT NULL,
    title          TEXT NOT NULL,
    description    TEXT NOT NULL,
    version        TEXT NOT NULL,
    status         TEXT NOT NULL,
    status_date    TEXT NOT NULL,
    profile_count  INTEGER NOT NULL,
    group_count    INTEGER NOT NULL,
    rule_count     INTEGER NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_benchmarks_data_stream ON benchmarks(data_stream_id);

CREATE TABLE IF NOT EXISTS ds_profiles (
    benchmark_id TEXT NOT NULL,
    id           TEXT NOT NULL,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    version      TEXT NOT NULL,
    rule_count   INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (benchmark_id, id)
);

CREATE TABLE IF NOT EXISTS ds_profile_rules (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    benchmark_id TEXT NOT NULL,
    profile_id   TEXT NOT NULL,
    rule_id      TEXT NOT NULL,
    selected     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ds_profile_rules_profile ON ds_profile_rules(benchmark_id, profile_id);
CREATE INDEX IF NOT EXISTS idx_ds_profile_rules_rule ON ds_profile_rules(benchmark_id, rule_id);

CREATE TABLE IF NOT EXISTS ds_groups (
    benchmark_id TEXT NOT NULL,
    id           TEXT NOT NULL,
    parent_id    TEXT NOT NULL,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    level        INTEGER NOT NULL,
    group_count  INTEGER NOT NULL,
    rule_count   INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (benchmark_id, id)
);
CREATE INDEX IF NOT EXISTS idx_ds_groups_parent ON ds_groups(benchmark_id, parent_id);

CREATE TABLE IF NOT EXISTS ds_rules (
    benchmark_id TEXT NOT NULL,
    id           TEXT NOT NULL,
    group_id     TEXT NOT NULL,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    rationale    TEXT NOT NULL,
    severity     TEXT NOT NULL,
    selected     INTEGER NOT NULL,
    weight       TEXT NOT NULL,
    version      TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (benchmark_id, id)
);
CREATE INDEX IF NOT EXISTS idx_ds_rules_group ON ds_rules(benchmark_id, group_id);
CREATE INDEX IF NOT EXISTS idx_ds_rules_severity ON ds_rules(severity);

CREATE TABLE IF NOT EXISTS ds_rule_references (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    benchmark_id TEXT NOT NULL,
    rule_id      TEXT NOT NULL,
    href         TEXT NOT NULL,
    ref_id       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ds_rule_references_rule ON ds_rule_references(benchmark_id, rule_id);

CREATE TABLE IF NOT EXISTS ds_rule_identifiers (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    benchmark_id TEXT NOT NULL,
    rule_id      TEXT NOT NULL,
    system       TEXT NOT NULL,
    identifier   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ds_rule_identifiers_rule ON ds_rule_identifiers(benchmark_id, rule_id);
CREATE INDEX IF NOT EXISTS idx_ds_rule_identifiers_identifier ON ds_rule_identifiers(identifier);

CREATE TABLE IF NOT EXISTS cross_references (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    source_type   TEXT NOT NULL,
    source_id     TEXT NOT NULL,
    target_type   TEXT NOT NULL,
    target_id     TEXT NOT NULL,
    link_type     TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (source_type, source_id, target_type, target_id, link_type, metadata_json)
);
CREATE INDEX IF NOT EXISTS idx_cross_references_source ON cross_references(source_type, source_id);
CREATE INDEX IF NOT EXISTS idx_cross_references_target ON cross_references(target_type, target_id);
CREATE INDEX IF NOT EXISTS idx_cross_references_link ON cross_references(link_type);
"#;

pub(crate) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 18);
    }
}
