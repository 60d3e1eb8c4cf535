//! SQL Clause Tags
//!
//! Canonical clause identifiers detected in decomposition output and used to
//! pick guidance text for the planning and generation stages.

pub mod detector;
pub mod policy;

pub use detector::{detect, extract_json_object};
pub use policy::{policy_for, ClauseGuidance};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declaration order is the canonical order used wherever tags are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClauseTag {
    #[serde(rename = "SELECT")]
    Select,
    #[serde(rename = "FROM")]
    From,
    #[serde(rename = "WHERE")]
    Where,
    #[serde(rename = "JOIN")]
    Join,
    #[serde(rename = "GROUP BY")]
    GroupBy,
    #[serde(rename = "HAVING")]
    Having,
    #[serde(rename = "ORDER BY")]
    OrderBy,
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "UNION")]
    Union,
    #[serde(rename = "INTERSECT")]
    Intersect,
    #[serde(rename = "EXCEPT")]
    Except,
    #[serde(rename = "DISTINCT")]
    Distinct,
    #[serde(rename = "SUBQUERY")]
    Subquery,
}

impl ClauseTag {
    pub const ALL: [ClauseTag; 13] = [
        ClauseTag::Select,
        ClauseTag::From,
        ClauseTag::Where,
        ClauseTag::Join,
        ClauseTag::GroupBy,
        ClauseTag::Having,
        ClauseTag::OrderBy,
        ClauseTag::Limit,
        ClauseTag::Union,
        ClauseTag::Intersect,
        ClauseTag::Except,
        ClauseTag::Distinct,
        ClauseTag::Subquery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseTag::Select => "SELECT",
            ClauseTag::From => "FROM",
            ClauseTag::Where => "WHERE",
            ClauseTag::Join => "JOIN",
            ClauseTag::GroupBy => "GROUP BY",
            ClauseTag::Having => "HAVING",
            ClauseTag::OrderBy => "ORDER BY",
            ClauseTag::Limit => "LIMIT",
            ClauseTag::Union => "UNION",
            ClauseTag::Intersect => "INTERSECT",
            ClauseTag::Except => "EXCEPT",
            ClauseTag::Distinct => "DISTINCT",
            ClauseTag::Subquery => "SUBQUERY",
        }
    }

    /// Lenient tag parsing: case and inner whitespace are ignored, so
    /// `"group  by"`, `"GROUPBY"` and `"Group By"` all map to `GroupBy`.
    pub fn parse(tag: &str) -> Option<ClauseTag> {
        let squashed: String = tag
            .split_whitespace()
            .collect::<String>()
            .to_uppercase();
        ClauseTag::ALL
            .into_iter()
            .find(|t| t.as_str().replace(' ', "") == squashed)
    }
}

impl fmt::Display for ClauseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
