//! JSON manifests, their profiles and profile-rule joins.

use crate::query::{Filter, Select};
use crate::{Store, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use ssgkb_model::{Manifest, Page, PageRequest, ParsedManifest, Profile, ProfileRule};

const MANIFESTS: Select<'static> = Select {
    from: "manifests",
    columns: "id, product, created_at, updated_at",
    order_by: "id",
};

const PROFILES: Select<'static> = Select {
    from: "profiles",
    columns: "id, manifest_id, product, profile_id, rule_count, created_at, updated_at",
    order_by: "id",
};

const PROFILE_RULES: Select<'static> = Select {
    from: "profile_rules",
    columns: "id, profile_id, rule_short_id, created_at",
    order_by: "id",
};

#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub manifest_id: Option<String>,
    pub product: Option<String>,
}

fn manifest_row(row: &Row<'_>) -> rusqlite::Result<Manifest> {
    Ok(Manifest {
        id: row.get(0)?,
        product: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn profile_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        manifest_id: row.get(1)?,
        product: row.get(2)?,
        profile_id: row.get(3)?,
        rule_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn profile_rule_row(row: &Row<'_>) -> rusqlite::Result<ProfileRule> {
    Ok(ProfileRule {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        rule_short_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn upsert_manifest(conn: &Connection, m: &Manifest) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO manifests (id, product, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET product = excluded.product, updated_at = excluded.updated_at",
        params![m.id, m.product, m.created_at, m.updated_at],
    )?;
    Ok(())
}

fn upsert_profile(conn: &Connection, p: &Profile) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO profiles (id, manifest_id, product, profile_id, rule_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            manifest_id = excluded.manifest_id,
            product = excluded.product,
            profile_id = excluded.profile_id,
            rule_count = excluded.rule_count,
            updated_at = excluded.updated_at",
    )?
    .execute(params![
        p.id,
        p.manifest_id,
        p.product,
        p.profile_id,
        p.rule_count,
        p.created_at,
        p.updated_at
    ])?;
    Ok(())
}

fn insert_profile_rule(conn: &Connection, r: &ProfileRule) -> StoreResult<i64> {
    conn.prepare_cached(
        "INSERT INTO profile_rules (profile_id, rule_short_id, created_at) VALUES (?1, ?2, ?3)",
    )?
    .execute(params![r.profile_id, r.rule_short_id, r.created_at])?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    pub fn save_manifest(&self, manifest: &Manifest) -> StoreResult<()> {
        self.with_conn(|conn| upsert_manifest(conn, manifest))
    }

    pub fn get_manifest(&self, id: &str) -> StoreResult<Manifest> {
        self.with_conn(|conn| {
            MANIFESTS
                .one(conn, &Filter::new().eq("id", Some(id)), manifest_row)?
                .ok_or_else(|| StoreError::not_found("manifest", id))
        })
    }

    pub fn list_manifests(&self, product: Option<&str>, page: PageRequest) -> StoreResult<Page<Manifest>> {
        let f = Filter::new().eq("product", product);
        self.with_conn(|conn| MANIFESTS.page(conn, &f, page, manifest_row))
    }

    pub fn save_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.with_conn(|conn| upsert_profile(conn, profile))
    }

    /// `id` is the `{product}:{short}` key.
    pub fn get_profile(&self, id: &str) -> StoreResult<Profile> {
        self.with_conn(|conn| {
            PROFILES
                .one(conn, &Filter::new().eq("id", Some(id)), profile_row)?
                .ok_or_else(|| StoreError::not_found("profile", id))
        })
    }

    pub fn list_profiles(&self, filter: &ProfileFilter, page: PageRequest) -> StoreResult<Page<Profile>> {
        let f = Filter::new()
            .eq("manifest_id", filter.manifest_id.as_deref())
            .eq("product", filter.product.as_deref());
        self.with_conn(|conn| PROFILES.page(conn, &f, page, profile_row))
    }

    /// Appends a join row; duplicates are allowed. Returns the new row id.
    pub fn save_profile_rule(&self, rule: &ProfileRule) -> StoreResult<i64> {
        self.with_conn(|conn| insert_profile_rule(conn, rule))
    }

    pub fn list_profile_rules(&self, profile_id: &str, page: PageRequest) -> StoreResult<Page<ProfileRule>> {
        let f = Filter::new().eq("profile_id", Some(profile_id));
        self.with_conn(|conn| PROFILE_RULES.page(conn, &f, page, profile_rule_row))
    }

    /// Upserts the manifest and replaces its profiles and their rule lists.
    pub fn save_parsed_manifest(&self, parsed: &ParsedManifest) -> StoreResult<()> {
        let manifest_id = parsed.manifest.id.as_str();
        self.with_tx(|tx| {
            upsert_manifest(tx, &parsed.manifest)?;
            tx.execute(
                "DELETE FROM profile_rules WHERE profile_id IN (SELECT id FROM profiles WHERE manifest_id = ?1)",
                [manifest_id],
            )?;
            tx.execute("DELETE FROM profiles WHERE manifest_id = ?1", [manifest_id])?;
            for profile in &parsed.profiles {
                // another manifest may have owned this key before
                tx.execute("DELETE FROM profile_rules WHERE profile_id = ?1", [&profile.id])?;
                upsert_profile(tx, profile)?;
            }
            for rule in &parsed.profile_rules {
                insert_profile_rule(tx, rule)?;
            }
            Ok(())
        })?;
        tracing::debug!(
            manifest = %manifest_id,
            profiles = parsed.profiles.len(),
            profile_rules = parsed.profile_rules.len(),
            "saved manifest"
        );
        Ok(())
    }
}
