//! Typed entities persisted by the store.
//!
//! Primary keys are the identifiers found in the source (XCCDF ids,
//! filename-derived ids). XCCDF group/rule/profile ids repeat across products,
//! so those entities are scoped by their container (`guide_id` or
//! `benchmark_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Timestamp = DateTime<Utc>;

// ============================================================================
// Severity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    /// Fallback when the source does not state a severity.
    #[default]
    Medium,
    High,
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Unknown => "unknown",
        }
    }

    /// Lenient mapping for source values; XCCDF `info` and anything else
    /// unrecognised becomes `Unknown`.
    pub fn from_source(s: &str) -> Severity {
        s.parse().unwrap_or(Severity::Unknown)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "unknown" => Ok(Severity::Unknown),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

// ============================================================================
// HTML guides
// ============================================================================

/// One guide per `ssg-<product>-guide-<short_id>.html` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub id: String,
    pub product: String,
    pub profile_id: String,
    pub short_id: String,
    pub title: String,
    pub html_content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A group node of a guide's benchmark tree.
///
/// `parent_id` is empty for groups directly under the benchmark; `level` is
/// the depth from those roots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub guide_id: String,
    pub parent_id: String,
    pub title: String,
    pub description: String,
    pub level: i64,
    pub group_count: i64,
    pub rule_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub guide_id: String,
    pub group_id: String,
    pub short_id: String,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub severity: Severity,
    pub level: i64,
    pub references: Vec<Reference>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Row of a rule's identifiers table. Owned by the rule; `id` is assigned by
/// the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: i64,
    pub rule_id: String,
    pub href: String,
    pub label: String,
    pub value: String,
}

/// Output of the guide parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedGuide {
    pub guide: Guide,
    pub groups: Vec<Group>,
    pub rules: Vec<Rule>,
}

/// A guide with every group and rule (references loaded), unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideTree {
    pub guide: Guide,
    pub groups: Vec<Group>,
    pub rules: Vec<Rule>,
}

// ============================================================================
// HTML tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub product: String,
    pub table_type: String,
    pub title: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One source row; `position` is the row's index within the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub id: String,
    pub table_id: String,
    pub position: i64,
    pub mapping: String,
    pub rule_title: String,
    pub description: String,
    pub rationale: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTable {
    pub table: Table,
    pub entries: Vec<TableEntry>,
}

// ============================================================================
// JSON manifests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub product: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// `id` is `{product}:{profile_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub manifest_id: String,
    pub product: String,
    pub profile_id: String,
    pub rule_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRule {
    pub id: i64,
    pub profile_id: String,
    pub rule_short_id: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedManifest {
    pub manifest: Manifest,
    pub profiles: Vec<Profile>,
    pub profile_rules: Vec<ProfileRule>,
}

// ============================================================================
// SCAP data streams
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStream {
    pub id: String,
    pub product: String,
    pub scap_version: String,
    pub timestamp: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: String,
    pub data_stream_id: String,
    pub title: String,
    pub description: String,
    pub version: String,
    pub status: String,
    pub status_date: String,
    pub profile_count: i64,
    pub group_count: i64,
    pub rule_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsProfile {
    pub id: String,
    pub benchmark_id: String,
    pub title: String,
    pub description: String,
    pub version: String,
    pub rule_count: i64,
    pub selected_rules: Vec<DsProfileRule>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsProfileRule {
    pub profile_id: String,
    pub rule_id: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsGroup {
    pub id: String,
    pub benchmark_id: String,
    pub parent_id: String,
    pub title: String,
    pub description: String,
    pub level: i64,
    pub group_count: i64,
    pub rule_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsRule {
    pub id: String,
    pub benchmark_id: String,
    pub group_id: String,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub severity: Severity,
    pub selected: bool,
    pub weight: String,
    pub version: String,
    pub references: Vec<DsRuleReference>,
    pub identifiers: Vec<DsRuleIdentifier>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsRuleReference {
    pub href: String,
    pub ref_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsRuleIdentifier {
    pub system: String,
    pub identifier: String,
}

impl DsRule {
    /// CCE numbers carried by identifiers in a recognised CCE system.
    pub fn cce_identifiers(&self) -> impl Iterator<Item = &str> {
        self.identifiers
            .iter()
            .filter(|ident| crate::ids::is_cce_system(&ident.system))
            .map(|ident| ident.identifier.trim())
    }
}

/// Output of the data-stream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDataStream {
    pub data_stream: DataStream,
    pub benchmark: Benchmark,
    pub profiles: Vec<DsProfile>,
    pub groups: Vec<DsGroup>,
    pub rules: Vec<DsRule>,
}

// ============================================================================
// Pagination
// ============================================================================

pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// A page of results plus the filtered total before pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Offset/limit after clamping: negative offsets become 0, non-positive
/// limits become [`DEFAULT_PAGE_LIMIT`]. Only [`PageRequest::new`] builds
/// one, so a request never carries an unclamped window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    offset: i64,
    limit: i64,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: offset.max(0),
            limit: if limit <= 0 { DEFAULT_PAGE_LIMIT } else { limit },
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parsing_is_lenient() {
        assert_eq!(Severity::from_source("HIGH"), Severity::High);
        assert_eq!(Severity::from_source("info"), Severity::Unknown);
        assert_eq!(Severity::default(), Severity::Medium);
        assert_eq!("low".parse::<Severity>().unwrap(), Severity::Low);
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(-5, 0), PageRequest { offset: 0, limit: 100 });
        assert_eq!(PageRequest::new(20, -1).limit(), 100);
        assert_eq!(PageRequest::new(20, -1).offset(), 20);
        assert_eq!(PageRequest::new(3, 7), PageRequest { offset: 3, limit: 7 });
        assert_eq!(PageRequest::default(), PageRequest::new(0, 0));
    }

    #[test]
    fn cce_identifiers_filter_by_system() {
        let now = Utc::now();
        let rule = DsRule {
            id: "xccdf_org.ssgproject.content_rule_a".into(),
            benchmark_id: "b".into(),
            group_id: "g".into(),
            title: String::new(),
            description: String::new(),
            rationale: String::new(),
            severity: Severity::Medium,
            selected: false,
            weight: "10.0".into(),
            version: String::new(),
            references: vec![],
            identifiers: vec![
                DsRuleIdentifier {
                    system: "https://nvd.nist.gov/cce/index.cfm".into(),
                    identifier: "CCE-80644-8".into(),
                },
                DsRuleIdentifier {
                    system: "http://cce.mitre.org".into(),
                    identifier: "CCE-12345-6".into(),
                },
                DsRuleIdentifier {
                    system: "https://example.org/other".into(),
                    identifier: "X-1".into(),
                },
            ],
            created_at: now,
            updated_at: now,
        };
        let cces: Vec<&str> = rule.cce_identifiers().collect();
        assert_eq!(cces, vec!["CCE-80644-8", "CCE-12345-6"]);
    }
}
