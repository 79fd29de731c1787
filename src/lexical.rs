//! Lexical pre-validation of the two inputs (codes 101-104).
//!
//! Both the data graph and the Domain Specification must survive these
//! checks before any other work happens. The checks short-circuit; a hit
//! becomes an `Invalid` report containing exactly one entry.

use serde_json::Value as Json;

use crate::report::{ErrorEntry, ErrorKind, Severity, VerificationReport};

/// Which input a lexical error message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    DataGraph,
    DomainSpecification,
}

impl InputKind {
    fn label(&self) -> &'static str {
        match self {
            InputKind::DataGraph => "data graph",
            InputKind::DomainSpecification => "Domain Specification",
        }
    }
}

/// Parses raw text into JSON; failure is lexical error 101.
pub fn parse_input(text: &str, kind: InputKind) -> Result<Json, ErrorEntry> {
    serde_json::from_str(text).map_err(|_| {
        ErrorEntry::new(
            ErrorKind::JsonError,
            Severity::Critical,
            101,
            "Invalid JSON",
            format!(
                "The input {} is not valid JSON (cannot be parsed to JSON).",
                kind.label()
            ),
        )
    })
}

/// Checks 102-104 in order, short-circuiting on the first hit.
pub fn lexical_check(input: &Json, kind: InputKind) -> Option<ErrorEntry> {
    if is_empty_input(input) {
        return Some(ErrorEntry::new(
            ErrorKind::JsonError,
            Severity::Critical,
            102,
            "Empty JSON",
            format!("The input {} is empty.", kind.label()),
        ));
    }
    if !input.is_object() {
        return Some(ErrorEntry::new(
            ErrorKind::JsonError,
            Severity::Critical,
            103,
            "No JSON Object",
            format!("The input {} is not a JSON object.", kind.label()),
        ));
    }
    if contains_null(input) {
        return Some(ErrorEntry::new(
            ErrorKind::JsonError,
            Severity::Critical,
            104,
            "Usage of undefined",
            format!("The input {} uses 'undefined' as value.", kind.label()),
        ));
    }
    None
}

/// Report wrapper for a lexical failure of one input.
pub fn lexical_report(entry: ErrorEntry, kind: InputKind) -> VerificationReport {
    VerificationReport::single(
        entry,
        format!(
            "An error was detected during the lexical check of the input {}.",
            kind.label()
        ),
    )
}

fn is_empty_input(input: &Json) -> bool {
    match input {
        Json::Null => true,
        Json::String(s) => s.is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// JSON `null` anywhere below the top level stands for a serialized
/// "undefined" and is rejected.
fn contains_null(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Array(items) => items.iter().any(contains_null),
        Json::Object(map) => map.values().any(contains_null),
        _ => false,
    }
}
