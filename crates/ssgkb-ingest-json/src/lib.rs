//! JSON manifest ingestion
//!
//! A manifest maps each profile short id to the rule short ids it selects:
//!
//! ```json
//! {"product_name": "rhel9", "rules": {}, "profiles": {"cis": {"rules": ["aide_build_database"]}}}
//! ```
//!
//! The reader is forgiving: unknown keys are ignored, non-string rule entries
//! are skipped and a missing `profiles` object yields a manifest with no
//! profiles. Only unparseable JSON or a manifest whose product cannot be
//! determined is an error.

use chrono::Utc;
use serde_json::{Map, Value};
use ssgkb_model::ids;
use ssgkb_model::{Manifest, ParsedManifest, Profile, ProfileRule, SsgError, SsgResult};
use std::path::Path;

pub fn parse_manifest_file(path: &Path) -> SsgResult<ParsedManifest> {
    let bytes = std::fs::read(path).map_err(|e| SsgError::io_read(path, &e))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| SsgError::invalid(format!("{}: {e}", path.display())))?;

    let (id, file_product) = match ids::parse_manifest_name(path) {
        Some(name) => (name.id, Some(name.product)),
        None => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            tracing::debug!(path = %path.display(), "manifest name outside convention, using file stem");
            (stem, None)
        }
    };
    if id.is_empty() {
        return Err(SsgError::invalid(format!(
            "cannot derive manifest id from {}",
            path.display()
        )));
    }

    parse_manifest_value(&value, &id, file_product.as_deref())
}

/// Build a manifest from parsed JSON. `product_name` in the document wins over
/// the product taken from the file name.
pub fn parse_manifest_value(
    value: &Value,
    manifest_id: &str,
    file_product: Option<&str>,
) -> SsgResult<ParsedManifest> {
    let Some(root) = value.as_object() else {
        return Err(SsgError::invalid(format!(
            "{manifest_id}: manifest root is not a JSON object"
        )));
    };

    let product = string_field(root, "product_name")
        .filter(|p| !p.is_empty())
        .or(file_product.filter(|p| !p.is_empty()))
        .ok_or_else(|| SsgError::invalid(format!("{manifest_id}: no product name")))?
        .to_string();

    let now = Utc::now();
    let mut profiles = Vec::new();
    let mut profile_rules = Vec::new();

    if let Some(entries) = root.get("profiles").and_then(Value::as_object) {
        for (short, body) in entries {
            let short = ids::profile_short_id(short);
            let profile_id = ids::profile_key(&product, short);

            let rules: Vec<&str> = body
                .get("rules")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            for rule in &rules {
                profile_rules.push(ProfileRule {
                    id: 0,
                    profile_id: profile_id.clone(),
                    rule_short_id: ids::rule_short_id(rule).to_string(),
                    created_at: now,
                });
            }

            profiles.push(Profile {
                id: profile_id,
                manifest_id: manifest_id.to_string(),
                product: product.clone(),
                profile_id: short.to_string(),
                rule_count: rules.len() as i64,
                created_at: now,
                updated_at: now,
            });
        }
    }

    tracing::debug!(
        manifest = %manifest_id,
        profiles = profiles.len(),
        selections = profile_rules.len(),
        "parsed manifest"
    );

    Ok(ParsedManifest {
        manifest: Manifest {
            id: manifest_id.to_string(),
            product,
            created_at: now,
            updated_at: now,
        },
        profiles,
        profile_rules,
    })
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_string_rules_are_skipped() {
        let value = json!({
            "product_name": "rhel9",
            "profiles": {"cis": {"rules": ["aide_build_database", 7, null]}, "empty": {}}
        });
        let parsed = parse_manifest_value(&value, "manifest-rhel9", None).unwrap();
        assert_eq!(parsed.profiles.len(), 2);
        let cis = parsed.profiles.iter().find(|p| p.profile_id == "cis").unwrap();
        assert_eq!(cis.id, "rhel9:cis");
        assert_eq!(cis.rule_count, 1);
        let empty = parsed.profiles.iter().find(|p| p.profile_id == "empty").unwrap();
        assert_eq!(empty.rule_count, 0);
    }

    #[test]
    fn missing_product_everywhere_is_invalid() {
        let value = json!({"product_name": "", "profiles": {}});
        assert!(matches!(
            parse_manifest_value(&value, "weird", None),
            Err(SsgError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_manifest_value(&json!([1, 2]), "manifest-x", Some("x")),
            Err(SsgError::InvalidFormat(_))
        ));
    }

    #[test]
    fn full_profile_ids_are_shortened() {
        let value = json!({
            "product_name": "ol9",
            "profiles": {"xccdf_org.ssgproject.content_profile_stig": {"rules": []}}
        });
        let parsed = parse_manifest_value(&value, "manifest-ol9", None).unwrap();
        assert_eq!(parsed.profiles[0].profile_id, "stig");
        assert_eq!(parsed.profiles[0].id, "ol9:stig");
    }
}
