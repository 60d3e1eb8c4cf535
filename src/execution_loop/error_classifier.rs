//! Error Classifier
//!
//! Classifies SQLite execution errors into a small taxonomy so the correction
//! plan prompt can carry a targeted repair hint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL error classification taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlErrorClass {
    TableNotFound,
    ColumnNotFound,
    AmbiguousColumn,
    FunctionNotFound,
    SyntaxError,
    MisusedAggregate,
    ColumnCountMismatch,
    /// The query ran but returned different rows than the reference.
    ResultMismatch,
    ExecutionError(String),
}

impl fmt::Display for SqlErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlErrorClass::TableNotFound => write!(f, "TableNotFound"),
            SqlErrorClass::ColumnNotFound => write!(f, "ColumnNotFound"),
            SqlErrorClass::AmbiguousColumn => write!(f, "AmbiguousColumn"),
            SqlErrorClass::FunctionNotFound => write!(f, "FunctionNotFound"),
            SqlErrorClass::SyntaxError => write!(f, "SyntaxError"),
            SqlErrorClass::MisusedAggregate => write!(f, "MisusedAggregate"),
            SqlErrorClass::ColumnCountMismatch => write!(f, "ColumnCountMismatch"),
            SqlErrorClass::ResultMismatch => write!(f, "ResultMismatch"),
            SqlErrorClass::ExecutionError(msg) => write!(f, "ExecutionError({})", msg),
        }
    }
}

impl SqlErrorClass {
    /// Repair hint appended to the correction plan prompt.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            SqlErrorClass::TableNotFound => {
                "A table referenced in the query does not exist. Use only tables listed in the schema."
            }
            SqlErrorClass::ColumnNotFound => {
                "A column referenced in the query does not exist. Check every column against its table in the schema."
            }
            SqlErrorClass::AmbiguousColumn => {
                "A column name exists in several joined tables. Qualify it with its table name or alias."
            }
            SqlErrorClass::FunctionNotFound => {
                "The query uses a function SQLite does not provide. Rewrite it with SQLite built-ins."
            }
            SqlErrorClass::SyntaxError => {
                "The query is not valid SQLite syntax. Check keywords, parentheses, quoting and clause order."
            }
            SqlErrorClass::MisusedAggregate => {
                "An aggregate is used where it is not allowed. Move aggregate filters to HAVING and group non-aggregated columns."
            }
            SqlErrorClass::ColumnCountMismatch => {
                "The branches of a compound query select different numbers of columns. Make them match."
            }
            SqlErrorClass::ResultMismatch => {
                "The query runs but returns the wrong rows. Re-check filters, joins, grouping, ordering and limits against the question."
            }
            SqlErrorClass::ExecutionError(_) => {
                "The query failed to execute. Fix the cause reported in the error."
            }
        }
    }
}

/// Error classifier
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an execution error; `None` means the query ran but did not match.
    pub fn classify(&self, error: Option<&str>) -> SqlErrorClass {
        let Some(error) = error else {
            return SqlErrorClass::ResultMismatch;
        };
        let error_msg = error.to_lowercase();

        if error_msg.contains("no such table") {
            return SqlErrorClass::TableNotFound;
        }

        if error_msg.contains("no such column") {
            return SqlErrorClass::ColumnNotFound;
        }

        if error_msg.contains("ambiguous column") {
            return SqlErrorClass::AmbiguousColumn;
        }

        if error_msg.contains("no such function") {
            return SqlErrorClass::FunctionNotFound;
        }

        if error_msg.contains("syntax error") || error_msg.contains("incomplete input") {
            return SqlErrorClass::SyntaxError;
        }

        if error_msg.contains("misuse of aggregate") || error_msg.contains("aggregate functions are not allowed") {
            return SqlErrorClass::MisusedAggregate;
        }

        if error_msg.contains("same number of result columns") {
            return SqlErrorClass::ColumnCountMismatch;
        }

        SqlErrorClass::ExecutionError(error.to_string())
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
