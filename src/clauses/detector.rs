//! Clause Detector
//!
//! Reads the decomposition stage's output and works out which SQL clauses the
//! question needs. The output is tried as JSON first, against a fixed list of
//! shapes; anything else falls back to a keyword scan over the raw text.

use super::ClauseTag;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

lazy_static! {
    /// Clause name plus synonyms, matched case-insensitively at a word start.
    static ref KEYWORD_PATTERNS: Vec<(ClauseTag, Regex)> = {
        let table: [(ClauseTag, &str); 13] = [
            (ClauseTag::Select, r"SELECT|COLUMNS|FIELDS"),
            (ClauseTag::From, r"FROM|TABLE"),
            (ClauseTag::Where, r"WHERE|FILTER|CONDITION"),
            (ClauseTag::Join, r"JOIN|(?:INNER|LEFT|RIGHT|OUTER)\s+JOIN"),
            (ClauseTag::GroupBy, r"GROUP\s+BY|GROUPING|AGGREGAT"),
            (ClauseTag::Having, r"HAVING"),
            (ClauseTag::OrderBy, r"ORDER\s+BY|SORT|ORDERING"),
            (ClauseTag::Limit, r"LIMIT|TOP|FIRST"),
            (ClauseTag::Union, r"UNION"),
            (ClauseTag::Intersect, r"INTERSECT"),
            (ClauseTag::Except, r"EXCEPT|MINUS"),
            (ClauseTag::Distinct, r"DISTINCT|UNIQUE"),
            (ClauseTag::Subquery, r"SUBQUER|NESTED|INNER\s+QUERY"),
        ];
        table
            .into_iter()
            .map(|(tag, pattern)| {
                let regex = Regex::new(&format!(r"(?i)\b(?:{})", pattern)).unwrap();
                (tag, regex)
            })
            .collect()
    };
}

/// One accepted decomposition layout. Returns `None` when the value does not
/// have this shape, so the next one gets a chance.
type ShapeParser = fn(&Value) -> Option<HashSet<ClauseTag>>;

const SHAPES: [ShapeParser; 3] = [tagged_list, sub_item_list, free_form];

/// Detect the clause tags mentioned in decomposition output. Never fails;
/// unreadable input yields an empty set.
pub fn detect(decomposition_output: &str) -> HashSet<ClauseTag> {
    match serde_json::from_str::<Value>(decomposition_output) {
        Ok(value) => SHAPES
            .iter()
            .find_map(|shape| shape(&value))
            .unwrap_or_default(),
        Err(e) => {
            debug!("Decomposition is not JSON ({}), scanning text", e);
            extract_from_text(decomposition_output)
        }
    }
}

/// Outermost `{ ... }` span of a model response, if there is one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// `{"clauses": ["SELECT", "WHERE"]}`
fn tagged_list(value: &Value) -> Option<HashSet<ClauseTag>> {
    let tags: HashSet<ClauseTag> = value
        .get("clauses")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .filter_map(ClauseTag::parse)
        .collect();
    (!tags.is_empty()).then_some(tags)
}

/// `{"subproblems": [...]}` or a bare array, where each item is either
/// `{"clause": "..."}` or a free-text description.
fn sub_item_list(value: &Value) -> Option<HashSet<ClauseTag>> {
    let items = value
        .get("subproblems")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())?;

    let mut tags = HashSet::new();
    for item in items {
        if let Some(clause) = item.get("clause").and_then(Value::as_str) {
            match ClauseTag::parse(clause) {
                Some(tag) => {
                    tags.insert(tag);
                }
                None => tags.extend(extract_from_text(clause)),
            }
        } else if let Some(description) = item.get("description").and_then(Value::as_str) {
            tags.extend(extract_from_text(description));
        } else if let Some(text) = item.as_str() {
            tags.extend(extract_from_text(text));
        }
    }
    (!tags.is_empty()).then_some(tags)
}

/// Anything else: serialize back to text and scan it.
fn free_form(value: &Value) -> Option<HashSet<ClauseTag>> {
    Some(extract_from_text(&value.to_string()))
}

/// Keyword scan. Each tag is added at most once however many synonyms hit.
pub fn extract_from_text(text: &str) -> HashSet<ClauseTag> {
    KEYWORD_PATTERNS
        .iter()
        .filter(|(_, regex)| regex.is_match(text))
        .map(|(tag, _)| *tag)
        .collect()
}
