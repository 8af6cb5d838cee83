//! HTML guides: guides, groups, rules and rule references.

use crate::query::{boxed, parsed, Filter, Select};
use crate::{Store, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use ssgkb_model::ids;
use ssgkb_model::{
    build_forest, FlatNode, Group, Guide, GuideTree, Page, PageRequest, ParsedGuide, Reference,
    Rule, Severity, TreeNode,
};

const GUIDES: Select<'static> = Select {
    from: "guides",
    columns: "id, product, profile_id, short_id, title, html_content, created_at, updated_at",
    order_by: "id",
};

const GROUPS: Select<'static> = Select {
    from: "guide_groups",
    columns: "guide_id, id, parent_id, title, description, level, group_count, rule_count, \
              created_at, updated_at",
    order_by: "guide_id, id",
};

const RULES: Select<'static> = Select {
    from: "guide_rules",
    columns: "guide_id, id, group_id, short_id, title, description, rationale, severity, level, \
              created_at, updated_at",
    order_by: "guide_id, id",
};

const REFERENCES: Select<'static> = Select {
    from: "rule_references",
    columns: "id, rule_id, href, label, value",
    order_by: "id",
};

#[derive(Debug, Clone, Default)]
pub struct GuideFilter {
    pub product: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub guide_id: Option<String>,
    pub parent_id: Option<String>,
}

/// `profile_id` selects rules of guides generated for that profile, given
/// either as the full XCCDF profile id or its short form.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub guide_id: Option<String>,
    pub group_id: Option<String>,
    pub severity: Option<Severity>,
    pub profile_id: Option<String>,
}

fn guide_row(row: &Row<'_>) -> rusqlite::Result<Guide> {
    Ok(Guide {
        id: row.get(0)?,
        product: row.get(1)?,
        profile_id: row.get(2)?,
        short_id: row.get(3)?,
        title: row.get(4)?,
        html_content: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn group_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        guide_id: row.get(0)?,
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

fn rule_row(row: &Row<'_>) -> rusqlite::Result<Rule> {
    Ok(Rule {
        guide_id: row.get(0)?,
        id: row.get(1)?,
        group_id: row.get(2)?,
        short_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        rationale: row.get(6)?,
        severity: parsed(row, 7)?,
        level: row.get(8)?,
        references: Vec::new(),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn reference_row(row: &Row<'_>) -> rusqlite::Result<Reference> {
    Ok(Reference {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        href: row.get(2)?,
        label: row.get(3)?,
        value: row.get(4)?,
    })
}

// ----------------------------------------------------------------------------
// Statements usable inside or outside a transaction
// ----------------------------------------------------------------------------

pub(crate) fn upsert_guide(conn: &Connection, g: &Guide) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO guides (id, product, profile_id, short_id, title, html_content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            product = excluded.product,
            profile_id = excluded.profile_id,
            short_id = excluded.short_id,
            title = excluded.title,
            html_content = excluded.html_content,
            updated_at = excluded.updated_at",
        params![
            g.id,
            g.product,
            g.profile_id,
            g.short_id,
            g.title,
            g.html_content,
            g.created_at,
            g.updated_at
        ],
    )?;
    Ok(())
}

fn upsert_group(conn: &Connection, g: &Group) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO guide_groups (guide_id, id, parent_id, title, description, level, group_count, rule_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(guide_id, id) DO UPDATE SET
            parent_id = excluded.parent_id,
            title = excluded.title,
            description = excluded.description,
            level = excluded.level,
            group_count = excluded.group_count,
            rule_count = excluded.rule_count,
            updated_at = excluded.updated_at",
        params![
            g.guide_id,
            g.id,
            g.parent_id,
            g.title,
            g.description,
            g.level,
            g.group_count,
            g.rule_count,
            g.created_at,
            g.updated_at
        ],
    )?;
    Ok(())
}

/// Root upsert, then the rule's references are replaced wholesale.
fn upsert_rule(conn: &Connection, r: &Rule) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO guide_rules (guide_id, id, group_id, short_id, title, description, rationale, severity, level, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(guide_id, id) DO UPDATE SET
            group_id = excluded.group_id,
            short_id = excluded.short_id,
            title = excluded.title,
            description = excluded.description,
            rationale = excluded.rationale,
            severity = excluded.severity,
            level = excluded.level,
            updated_at = excluded.updated_at",
        params![
            r.guide_id,
            r.id,
            r.group_id,
            r.short_id,
            r.title,
            r.description,
            r.rationale,
            r.severity.as_str(),
            r.level,
            r.created_at,
            r.updated_at
        ],
    )?;
    conn.execute(
        "DELETE FROM rule_references WHERE guide_id = ?1 AND rule_id = ?2",
        params![r.guide_id, r.id],
    )?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO rule_references (guide_id, rule_id, href, label, value) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for reference in &r.references {
        insert.execute(params![r.guide_id, r.id, reference.href, reference.label, reference.value])?;
    }
    Ok(())
}

fn load_references(conn: &Connection, guide_id: &str, rule_id: &str) -> StoreResult<Vec<Reference>> {
    let filter = Filter::new()
        .clause("guide_id = ? AND rule_id = ?", vec![boxed(guide_id.to_string()), boxed(rule_id.to_string())]);
    REFERENCES.all(conn, &filter, None, reference_row)
}

fn with_references(conn: &Connection, mut rules: Vec<Rule>) -> StoreResult<Vec<Rule>> {
    for rule in &mut rules {
        rule.references = load_references(conn, &rule.guide_id, &rule.id)?;
    }
    Ok(rules)
}

fn delete_guide_rows(conn: &Connection, guide_id: &str, include_root: bool) -> StoreResult<usize> {
    let mut removed = 0;
    removed += conn.execute("DELETE FROM rule_references WHERE guide_id = ?1", [guide_id])?;
    removed += conn.execute("DELETE FROM guide_rules WHERE guide_id = ?1", [guide_id])?;
    removed += conn.execute("DELETE FROM guide_groups WHERE guide_id = ?1", [guide_id])?;
    if include_root {
        removed += conn.execute("DELETE FROM guides WHERE id = ?1", [guide_id])?;
    }
    Ok(removed)
}

fn rule_filter(filter: &RuleFilter) -> Filter {
    let mut f = Filter::new()
        .eq("guide_id", filter.guide_id.as_deref())
        .eq("group_id", filter.group_id.as_deref());
    if let Some(severity) = filter.severity {
        f = f.clause("severity = ?", vec![boxed(severity.as_str())]);
    }
    if let Some(profile) = filter.profile_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        f = f.clause(
            "guide_id IN (SELECT id FROM guides WHERE profile_id = ? OR short_id = ?)",
            vec![
                boxed(profile.to_string()),
                boxed(ids::profile_short_id(profile).to_string()),
            ],
        );
    }
    f
}

// ----------------------------------------------------------------------------
// Store API
// ----------------------------------------------------------------------------

impl Store {
    pub fn save_guide(&self, guide: &Guide) -> StoreResult<()> {
        self.with_conn(|conn| upsert_guide(conn, guide))
    }

    pub fn get_guide(&self, id: &str) -> StoreResult<Guide> {
        self.with_conn(|conn| {
            GUIDES
                .one(conn, &Filter::new().eq("id", Some(id)), guide_row)?
                .ok_or_else(|| StoreError::not_found("guide", id))
        })
    }

    pub fn list_guides(&self, filter: &GuideFilter, page: PageRequest) -> StoreResult<Page<Guide>> {
        let f = Filter::new().eq("product", filter.product.as_deref());
        self.with_conn(|conn| GUIDES.page(conn, &f, page, guide_row))
    }

    pub fn save_group(&self, group: &Group) -> StoreResult<()> {
        self.with_conn(|conn| upsert_group(conn, group))
    }

    pub fn get_group(&self, guide_id: &str, id: &str) -> StoreResult<Group> {
        let f = Filter::new().eq("guide_id", Some(guide_id)).eq("id", Some(id));
        self.with_conn(|conn| {
            GROUPS
                .one(conn, &f, group_row)?
                .ok_or_else(|| StoreError::not_found("group", format!("{guide_id}/{id}")))
        })
    }

    pub fn list_groups(&self, filter: &GroupFilter, page: PageRequest) -> StoreResult<Page<Group>> {
        let mut f = Filter::new().eq("guide_id", filter.guide_id.as_deref());
        // an empty parent filter means "top-level groups"
        if let Some(parent) = filter.parent_id.as_deref() {
            f = f.clause("parent_id = ?", vec![boxed(parent.trim().to_string())]);
        }
        self.with_conn(|conn| GROUPS.page(conn, &f, page, group_row))
    }

    pub fn save_rule(&self, rule: &Rule) -> StoreResult<()> {
        self.with_tx(|tx| upsert_rule(tx, rule))
    }

    pub fn get_rule(&self, guide_id: &str, id: &str) -> StoreResult<Rule> {
        let f = Filter::new().eq("guide_id", Some(guide_id)).eq("id", Some(id));
        self.with_conn(|conn| {
            let mut rule = RULES
                .one(conn, &f, rule_row)?
                .ok_or_else(|| StoreError::not_found("rule", format!("{guide_id}/{id}")))?;
            rule.references = load_references(conn, guide_id, id)?;
            Ok(rule)
        })
    }

    pub fn list_rules(&self, filter: &RuleFilter, page: PageRequest) -> StoreResult<Page<Rule>> {
        let f = rule_filter(filter);
        self.with_conn(|conn| {
            let Page { items, total } = RULES.page(conn, &f, page, rule_row)?;
            Ok(Page {
                items: with_references(conn, items)?,
                total,
            })
        })
    }

    /// Replaces the guide and everything under it in one transaction.
    pub fn save_parsed_guide(&self, parsed: &ParsedGuide) -> StoreResult<()> {
        let guide_id = parsed.guide.id.as_str();
        self.with_tx(|tx| {
            upsert_guide(tx, &parsed.guide)?;
            delete_guide_rows(tx, guide_id, false)?;
            for group in &parsed.groups {
                upsert_group(tx, group)?;
            }
            for rule in &parsed.rules {
                upsert_rule(tx, rule)?;
            }
            Ok(())
        })?;
        tracing::debug!(
            guide = %guide_id,
            groups = parsed.groups.len(),
            rules = parsed.rules.len(),
            "saved guide"
        );
        Ok(())
    }

    pub fn get_tree(&self, guide_id: &str) -> StoreResult<GuideTree> {
        let guide = self.get_guide(guide_id)?;
        let scope = Filter::new().eq("guide_id", Some(guide_id));
        self.with_conn(|conn| {
            let groups = GROUPS.all(conn, &scope, None, group_row)?;
            let rules = with_references(conn, RULES.all(conn, &scope, None, rule_row)?)?;
            Ok(GuideTree { guide, groups, rules })
        })
    }

    /// The guide's groups and rules linked into a forest ordered by title.
    pub fn build_tree_nodes(&self, guide_id: &str) -> StoreResult<Vec<TreeNode>> {
        let tree = self.get_tree(guide_id)?;
        let nodes = tree
            .groups
            .iter()
            .map(FlatNode::from)
            .chain(tree.rules.iter().map(FlatNode::from))
            .collect();
        Ok(build_forest(nodes))
    }

    /// Cascades to groups, rules and references. Cross-references are kept.
    pub fn delete_guide(&self, id: &str) -> StoreResult<()> {
        let removed = self.with_tx(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM guides WHERE id = ?1)",
                [id],
                |r| r.get(0),
            )?;
            if !exists {
                return Err(StoreError::not_found("guide", id));
            }
            delete_guide_rows(tx, id, true)
        })?;
        tracing::info!(guide = %id, rows = removed, "deleted guide");
        Ok(())
    }
}
