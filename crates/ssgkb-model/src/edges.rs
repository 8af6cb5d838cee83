//! Cross-reference edges between SSG objects.
//!
//! Edges are rows in an append-only table. The graph they describe is cyclic
//! on purpose; it is walked by query, never materialised as linked objects.

use crate::entities::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Guide,
    Table,
    Manifest,
    Datastream,
    Rule,
    Profile,
    Product,
    Cce,
}

impl ObjectType {
    pub const ALL: [ObjectType; 8] = [
        ObjectType::Guide,
        ObjectType::Table,
        ObjectType::Manifest,
        ObjectType::Datastream,
        ObjectType::Rule,
        ObjectType::Profile,
        ObjectType::Product,
        ObjectType::Cce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Guide => "guide",
            ObjectType::Table => "table",
            ObjectType::Manifest => "manifest",
            ObjectType::Datastream => "datastream",
            ObjectType::Rule => "rule",
            ObjectType::Profile => "profile",
            ObjectType::Product => "product",
            ObjectType::Cce => "cce",
        }
    }

    /// Identifier nodes are edge targets that stand for a shared key rather
    /// than a parsed document.
    pub fn is_identifier(&self) -> bool {
        matches!(
            self,
            ObjectType::Rule | ObjectType::Profile | ObjectType::Product | ObjectType::Cce
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown object type '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    RuleId,
    Cce,
    Product,
    ProfileId,
}

impl LinkType {
    pub const ALL: [LinkType; 4] = [
        LinkType::RuleId,
        LinkType::Cce,
        LinkType::Product,
        LinkType::ProfileId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::RuleId => "rule_id",
            LinkType::Cce => "cce",
            LinkType::Product => "product",
            LinkType::ProfileId => "profile_id",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown link type '{s}'"))
    }
}

/// A typed edge. `id` is assigned by the store (0 until saved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub id: i64,
    pub source_type: ObjectType,
    pub source_id: String,
    pub target_type: ObjectType,
    pub target_id: String,
    pub link_type: LinkType,
    pub metadata_json: String,
    pub created_at: Timestamp,
}

impl CrossReference {
    pub fn new(
        source: (ObjectType, &str),
        target: (ObjectType, &str),
        link_type: LinkType,
        metadata: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: 0,
            source_type: source.0,
            source_id: source.1.to_string(),
            target_type: target.0,
            target_id: target.1.to_string(),
            link_type,
            metadata_json: metadata.to_string(),
            created_at,
        }
    }

    pub fn source_key(&self) -> (ObjectType, &str) {
        (self.source_type, self.source_id.as_str())
    }

    pub fn target_key(&self) -> (ObjectType, &str) {
        (self.target_type, self.target_id.as_str())
    }

    pub fn metadata(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata_json).unwrap_or(serde_json::Value::Null)
    }
}
