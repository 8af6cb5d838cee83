//! Identifier patterns, format constants and filename conventions.
//!
//! Source files follow fixed naming conventions:
//!
//! ```text
//! guides/ssg-<product>-guide-<short_id>.html
//! tables/table-<product>-<type>.html
//! manifests/manifest-<product>.json
//! <datastreams>/ssg-<product>-ds.xml
//! ```
//!
//! `<product>` never contains a hyphen; `<short_id>` and `<type>` may.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const XCCDF_RULE_PREFIX: &str = "xccdf_org.ssgproject.content_rule_";
pub const XCCDF_GROUP_PREFIX: &str = "xccdf_org.ssgproject.content_group_";
pub const XCCDF_PROFILE_PREFIX: &str = "xccdf_org.ssgproject.content_profile_";
pub const XCCDF_BENCHMARK_MARKER: &str = "content_benchmark";

/// Informational; the data-stream parser matches on local names.
pub const XCCDF_12_NAMESPACE: &str = "http://checklists.nist.gov/xccdf/1.2";

/// Identifier systems that carry CCE numbers in data streams.
pub const CCE_SYSTEMS: [&str; 2] = ["https://nvd.nist.gov/cce/index.cfm", "http://cce.mitre.org"];

/// Full XCCDF rule id anywhere in a text; group 1 is the short id.
pub static RULE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"xccdf_org\.ssgproject\.content_rule_([a-z0-9_]+)").expect("rule id regex")
});

pub static CCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CCE-\d+-\d+").expect("cce regex"));

static SHORT_ID_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("short id regex"));
static RULE_ID_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^xccdf_org\.ssgproject\.content_rule_[a-z0-9_]+$").expect("rule id regex")
});
static CCE_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CCE-\d+-\d+$").expect("cce regex"));

pub fn is_rule_short_id(s: &str) -> bool {
    SHORT_ID_EXACT.is_match(s)
}

pub fn is_full_rule_id(s: &str) -> bool {
    RULE_ID_EXACT.is_match(s)
}

pub fn is_cce(s: &str) -> bool {
    CCE_EXACT.is_match(s)
}

pub fn is_cce_system(system: &str) -> bool {
    let system = system.trim().trim_end_matches('/');
    CCE_SYSTEMS
        .iter()
        .any(|known| known.trim_end_matches('/') == system)
}

/// Trailing segment of a full rule id (`..._content_rule_<short>`).
pub fn rule_short_id(full_id: &str) -> &str {
    full_id.strip_prefix(XCCDF_RULE_PREFIX).unwrap_or(full_id)
}

pub fn full_rule_id(short_id: &str) -> String {
    format!("{XCCDF_RULE_PREFIX}{short_id}")
}

/// Trailing segment of a full profile id; short ids pass through.
pub fn profile_short_id(profile_id: &str) -> &str {
    profile_id
        .strip_prefix(XCCDF_PROFILE_PREFIX)
        .unwrap_or(profile_id)
}

/// Profile key shared by manifests, guides and data streams: `{product}:{short}`.
pub fn profile_key(product: &str, profile_id: &str) -> String {
    format!("{product}:{}", profile_short_id(profile_id))
}

/// Trailing segment after `content_group_` / `content_rule_`, else the id itself.
pub fn node_short_id(id: &str) -> &str {
    for marker in ["content_group_", "content_rule_"] {
        if let Some(pos) = id.find(marker) {
            return &id[pos + marker.len()..];
        }
    }
    id
}

/// `accounts_password_pam_minlen` -> `Accounts Password Pam Minlen`.
pub fn humanize(short_id: &str) -> String {
    short_id
        .split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Filename conventions
// ============================================================================

/// `(id, product, short_id)` parsed from `ssg-<product>-guide-<short_id>.html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideName {
    pub id: String,
    pub product: String,
    pub short_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub id: String,
    pub product: String,
    pub table_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestName {
    pub id: String,
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStreamName {
    pub id: String,
    pub product: String,
}

fn file_stem_with_ext<'a>(path: &'a Path, ext: &str) -> Option<&'a str> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(ext)
}

/// Splits `<product>-<rest>` where product has no hyphen and both parts are non-empty.
fn split_product(s: &str) -> Option<(&str, &str)> {
    let (product, rest) = s.split_once('-')?;
    if product.is_empty() || rest.is_empty() {
        return None;
    }
    Some((product, rest))
}

pub fn parse_guide_name(path: &Path) -> Option<GuideName> {
    let stem = file_stem_with_ext(path, ".html")?;
    let body = stem.strip_prefix("ssg-")?;
    let (product, rest) = split_product(body)?;
    let short_id = rest.strip_prefix("guide-")?;
    if short_id.is_empty() {
        return None;
    }
    Some(GuideName {
        id: stem.to_string(),
        product: product.to_string(),
        short_id: short_id.to_string(),
    })
}

pub fn parse_table_name(path: &Path) -> Option<TableName> {
    let stem = file_stem_with_ext(path, ".html")?;
    let body = stem.strip_prefix("table-")?;
    let (product, table_type) = split_product(body)?;
    Some(TableName {
        id: stem.to_string(),
        product: product.to_string(),
        table_type: table_type.to_string(),
    })
}

pub fn parse_manifest_name(path: &Path) -> Option<ManifestName> {
    let stem = file_stem_with_ext(path, ".json")?;
    let product = stem.strip_prefix("manifest-")?;
    if product.is_empty() {
        return None;
    }
    Some(ManifestName {
        id: stem.to_string(),
        product: product.to_string(),
    })
}

pub fn parse_data_stream_name(path: &Path) -> Option<DataStreamName> {
    let stem = file_stem_with_ext(path, ".xml")?;
    let product = stem.strip_prefix("ssg-")?.strip_suffix("-ds")?;
    if product.is_empty() || product.contains('-') {
        return None;
    }
    Some(DataStreamName {
        id: stem.to_string(),
        product: product.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_name_from_path() {
        let name = parse_guide_name(Path::new("guides/ssg-al2023-guide-cis_server_l1.html")).unwrap();
        assert_eq!(name.id, "ssg-al2023-guide-cis_server_l1");
        assert_eq!(name.product, "al2023");
        assert_eq!(name.short_id, "cis_server_l1");
    }

    #[test]
    fn guide_name_rejects_other_files() {
        assert!(parse_guide_name(Path::new("ssg-rhel9-ds.xml")).is_none());
        assert!(parse_guide_name(Path::new("ssg-rhel9-guide-.html")).is_none());
        assert!(parse_guide_name(Path::new("table-rhel9-cces.html")).is_none());
    }

    #[test]
    fn table_type_may_contain_hyphens() {
        let name = parse_table_name(Path::new("table-rhel9-nistrefs-stig.html")).unwrap();
        assert_eq!(name.product, "rhel9");
        assert_eq!(name.table_type, "nistrefs-stig");
    }

    #[test]
    fn manifest_and_data_stream_names() {
        let m = parse_manifest_name(Path::new("manifests/manifest-al2023.json")).unwrap();
        assert_eq!((m.id.as_str(), m.product.as_str()), ("manifest-al2023", "al2023"));

        let ds = parse_data_stream_name(Path::new("ssg-rhel9-ds.xml")).unwrap();
        assert_eq!(ds.product, "rhel9");
        assert!(parse_data_stream_name(Path::new("invalid.xml")).is_none());
        assert!(parse_data_stream_name(Path::new("ssg-rhel9-ds-1.2.xml")).is_none());
    }

    #[test]
    fn identifier_shapes() {
        assert!(is_rule_short_id("aide_build_database"));
        assert!(!is_rule_short_id("Aide-Build"));
        assert!(is_full_rule_id("xccdf_org.ssgproject.content_rule_aide_build_database"));
        assert!(is_cce("CCE-80644-8"));
        assert!(!is_cce("CCE-80644"));
        assert!(is_cce_system("http://cce.mitre.org"));
        assert!(is_cce_system("https://nvd.nist.gov/cce/index.cfm"));
        assert!(!is_cce_system("https://public.cyber.mil/stigs/srg-stig-tools/"));
    }

    #[test]
    fn short_ids_and_profiles() {
        assert_eq!(
            rule_short_id("xccdf_org.ssgproject.content_rule_accounts_tmout"),
            "accounts_tmout"
        );
        assert_eq!(
            profile_key("rhel9", "xccdf_org.ssgproject.content_profile_cis"),
            "rhel9:cis"
        );
        assert_eq!(profile_key("rhel9", "stig"), "rhel9:stig");
        assert_eq!(
            node_short_id("xccdf_org.ssgproject.content_group_system"),
            "system"
        );
        assert_eq!(humanize("accounts_password_pam_minlen"), "Accounts Password Pam Minlen");
    }
}
