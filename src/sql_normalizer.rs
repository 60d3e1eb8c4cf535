//! SQL Normalizer
//!
//! Turns raw model output into a single executable statement: markup removed,
//! anything before the first `select`/`insert` dropped, whitespace canonical.
//! `normalize` is idempotent.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STATEMENT_START: Regex = Regex::new(r"\b(select|insert)\b").unwrap();
    static ref SQL_LABEL: Regex = Regex::new(r"^(?:sql\b[:\s]*)+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref SPACE_BEFORE_COMMA: Regex = Regex::new(r"\s+,").unwrap();
}

pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    // Fence markers first so a keyword hidden behind backticks is found on
    // the first pass rather than the second.
    let unfenced = lowered.replace("```sql", "").replace('`', "");

    let statement = match STATEMENT_START.find(&unfenced) {
        Some(m) => &unfenced[m.start()..],
        None => unfenced.as_str(),
    };

    let unlabeled = SQL_LABEL.replace(statement.trim(), "");
    let collapsed = WHITESPACE.replace_all(&unlabeled, " ");
    let mut sql = SPACE_BEFORE_COMMA.replace_all(collapsed.trim(), ",").into_owned();

    while let Some(stripped) = sql.strip_suffix(';') {
        sql = stripped.trim_end().to_string();
    }

    sql
}
