use ssgkb_ingest_json::parse_manifest_file;
use ssgkb_model::SsgError;

const MANIFEST: &str = r#"{"product_name":"test-product","rules":{},"profiles":{"cis":{"rules":["aide_build_database","account_disable_post_pw_expiration","accounts_password_pam_minlen"]},"stig":{"rules":["aide_build_database","auditd_data_retention_max_log_file"]}}}"#;

#[test]
fn manifest_profiles_and_selections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest-xyz.json");
    std::fs::write(&path, MANIFEST).unwrap();

    let parsed = parse_manifest_file(&path).unwrap();
    assert_eq!(parsed.manifest.id, "manifest-xyz");
    assert_eq!(parsed.manifest.product, "test-product");
    assert_eq!(parsed.profiles.len(), 2);

    let mut counts: Vec<i64> = parsed.profiles.iter().map(|p| p.rule_count).collect();
    counts.sort();
    assert_eq!(counts, vec![2, 3]);
    assert_eq!(parsed.profile_rules.len(), 5);

    let cis = parsed.profiles.iter().find(|p| p.profile_id == "cis").unwrap();
    assert_eq!(cis.id, "test-product:cis");
    assert_eq!(cis.manifest_id, "manifest-xyz");
    let cis_rules: Vec<&str> = parsed
        .profile_rules
        .iter()
        .filter(|r| r.profile_id == cis.id)
        .map(|r| r.rule_short_id.as_str())
        .collect();
    assert_eq!(
        cis_rules,
        vec![
            "aide_build_database",
            "account_disable_post_pw_expiration",
            "accounts_password_pam_minlen"
        ]
    );
}

#[test]
fn empty_product_name_falls_back_to_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let manifests = dir.path().join("manifests");
    std::fs::create_dir_all(&manifests).unwrap();
    let path = manifests.join("manifest-al2023.json");
    std::fs::write(&path, r#"{"product_name":"","rules":{},"profiles":{}}"#).unwrap();

    let parsed = parse_manifest_file(&path).unwrap();
    assert_eq!(parsed.manifest.id, "manifest-al2023");
    assert_eq!(parsed.manifest.product, "al2023");
    assert!(parsed.profiles.is_empty());
}

#[test]
fn broken_json_is_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest-rhel9.json");
    std::fs::write(&path, "{\"profiles\": ").unwrap();
    assert!(matches!(parse_manifest_file(&path), Err(SsgError::InvalidFormat(_))));
}
