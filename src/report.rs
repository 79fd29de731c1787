//! Error entries, verdict folding and report rendering.
//!
//! Validation produces one flat stream of [`ErrorEntry`] values. The verdict
//! is folded from entry severities, and the same stream can be rendered into
//! two wire formats: the DS-native report and a SHACL-style
//! `sh:ValidationReport`. Rendering is pure; validation never knows which
//! format is requested.

use serde::Serialize;
use serde_json::{json, Map, Value as Json};

use crate::normalize::DsContext;

/// Category of a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    JsonError,
    MetaError,
    ComplianceError,
    DataError,
    ExecutionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::JsonError => "JsonError",
            ErrorKind::MetaError => "MetaError",
            ErrorKind::ComplianceError => "ComplianceError",
            ErrorKind::DataError => "DataError",
            ErrorKind::ExecutionError => "ExecutionError",
        }
    }
}

/// Severity of a report entry. Ordering matters for verdict folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Informational,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Informational => "Informational",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }

    fn shacl_str(&self) -> &'static str {
        match self {
            Severity::Informational => "sh:Info",
            Severity::Warning => "sh:Warning",
            Severity::Error | Severity::Critical => "sh:Violation",
        }
    }
}

/// A single violation or fault found during verification.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub code: u16,
    pub name: &'static str,
    pub message: String,
    /// Location in the Domain Specification, `$ . / _` grammar, prefixed form.
    pub ds_path: Option<String>,
    /// Location in the data graph: alternating entity / property tokens.
    pub data_path: Option<Vec<String>>,
    /// Offending values in binding-cell form. Usually empty or a single
    /// element; undeclared-property entries (502) carry the whole value list
    /// so the SHACL renderer can expand one result per triple.
    pub values: Vec<Json>,
}

impl ErrorEntry {
    pub fn new(
        kind: ErrorKind,
        severity: Severity,
        code: u16,
        name: &'static str,
        message: impl Into<String>,
    ) -> Self {
        ErrorEntry {
            kind,
            severity,
            code,
            name,
            message: message.into(),
            ds_path: None,
            data_path: None,
            values: Vec::new(),
        }
    }

    pub fn at(mut self, ds_path: impl Into<String>, data_path: &[String]) -> Self {
        self.ds_path = Some(ds_path.into());
        self.data_path = Some(data_path.to_vec());
        self
    }

    pub fn with_ds_path(mut self, ds_path: impl Into<String>) -> Self {
        self.ds_path = Some(ds_path.into());
        self
    }

    pub fn with_values(mut self, values: Vec<Json>) -> Self {
        self.values = values;
        self
    }
}

/// Overall verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Valid,
    ValidWithWarnings,
    Invalid,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Valid => "Valid",
            Verdict::ValidWithWarnings => "ValidWithWarnings",
            Verdict::Invalid => "Invalid",
        }
    }

    pub fn is_conformant(&self) -> bool {
        !matches!(self, Verdict::Invalid)
    }
}

/// Output format of [`VerificationReport::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// DS-native report (`ds:VerificationReport`).
    Ds,
    /// SHACL-style report (`sh:ValidationReport`).
    Shacl,
}

const REPORT_NAME: &str = "Compliance Verification Report";

/// The result of one verification run.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub verdict: Verdict,
    pub name: String,
    pub description: String,
    pub errors: Vec<ErrorEntry>,
}

impl VerificationReport {
    /// Folds the verdict from the entry severities and rewrites `data_path`
    /// tokens from prefixed indicators back to absolute URIs. `ds_path`
    /// entries keep their compact prefixed form.
    pub(crate) fn from_errors(mut errors: Vec<ErrorEntry>, ctx: &DsContext) -> Self {
        let mut verdict = Verdict::Valid;
        for entry in &mut errors {
            if let Some(path) = &mut entry.data_path {
                for token in path.iter_mut() {
                    *token = ctx.indicator_to_uri(token);
                }
            }
            if verdict != Verdict::Invalid {
                match entry.severity {
                    Severity::Warning => verdict = Verdict::ValidWithWarnings,
                    Severity::Error | Severity::Critical => verdict = Verdict::Invalid,
                    Severity::Informational => {}
                }
            }
        }
        let description = match verdict {
            Verdict::Valid => "The data graph is in compliance with the Domain Specification.",
            Verdict::ValidWithWarnings => {
                "The data graph is in compliance with the Domain Specification, but with Warnings"
            }
            Verdict::Invalid => {
                "The data graph is NOT in compliance with the Domain Specification"
            }
        };
        VerificationReport {
            verdict,
            name: REPORT_NAME.to_owned(),
            description: description.to_owned(),
            errors,
        }
    }

    /// A report consisting of exactly one abort-class entry.
    pub(crate) fn single(entry: ErrorEntry, description: impl Into<String>) -> Self {
        VerificationReport {
            verdict: Verdict::Invalid,
            name: REPORT_NAME.to_owned(),
            description: description.into(),
            errors: vec![entry],
        }
    }

    pub fn render(&self, format: ReportFormat) -> Json {
        match format {
            ReportFormat::Ds => self.to_ds_json(),
            ReportFormat::Shacl => self.to_shacl_json(),
        }
    }

    /// DS-native rendering: one entry per violation.
    pub fn to_ds_json(&self) -> Json {
        let mut report = Map::new();
        report.insert(
            "@context".into(),
            json!({
                "schema": "http://schema.org/",
                "ds": "http://vocab.sti2.at/ds/",
                "sh": "http://www.w3.org/ns/shacl#"
            }),
        );
        report.insert("@type".into(), json!("ds:VerificationReport"));
        report.insert("ds:validationResult".into(), json!(self.verdict.as_str()));
        report.insert("schema:name".into(), json!(self.name));
        report.insert("schema:description".into(), json!(self.description));
        if !self.errors.is_empty() {
            let entries: Vec<Json> = self.errors.iter().map(ds_entry).collect();
            report.insert("ds:errors".into(), Json::Array(entries));
        }
        Json::Object(report)
    }

    /// SHACL-style rendering. Undeclared-property entries (502) expand into
    /// one `sh:ValidationResult` per offending triple.
    pub fn to_shacl_json(&self) -> Json {
        let mut results = Vec::new();
        for entry in &self.errors {
            if entry.code == 502 && entry.values.len() > 1 {
                for value in &entry.values {
                    results.push(shacl_result(entry, Some(value.clone())));
                }
            } else {
                results.push(shacl_result(entry, entry.values.first().cloned()));
            }
        }

        let mut report = Map::new();
        report.insert(
            "@context".into(),
            json!({
                "schema": "http://schema.org/",
                "sh": "http://www.w3.org/ns/shacl#"
            }),
        );
        report.insert("@type".into(), json!("sh:ValidationReport"));
        if results.is_empty() {
            report.insert("sh:conforms".into(), json!(true));
        } else {
            report.insert("sh:conforms".into(), json!(false));
            report.insert("sh:result".into(), Json::Array(results));
        }
        Json::Object(report)
    }
}

fn ds_entry(entry: &ErrorEntry) -> Json {
    let mut obj = Map::new();
    obj.insert("@type".into(), json!(format!("ds:{}", entry.kind.as_str())));
    obj.insert("ds:severity".into(), json!(entry.severity.as_str()));
    obj.insert("ds:errorCode".into(), json!(entry.code));
    obj.insert("schema:name".into(), json!(entry.name));
    obj.insert("schema:description".into(), json!(entry.message));
    if let Some(value) = entry.values.first() {
        obj.insert("sh:value".into(), value.clone());
    }
    if let Some(ds_path) = &entry.ds_path {
        obj.insert("ds:dsPath".into(), json!(ds_path));
    }
    if let Some(data_path) = &entry.data_path {
        obj.insert("ds:dataPath".into(), json!(data_path));
    }
    Json::Object(obj)
}

fn shacl_result(entry: &ErrorEntry, value: Option<Json>) -> Json {
    let (focus_node, result_path) = split_data_path(entry.data_path.as_deref());
    let mut obj = Map::new();
    obj.insert("@type".into(), json!("sh:ValidationResult"));
    obj.insert(
        "sh:resultSeverity".into(),
        json!(entry.severity.shacl_str()),
    );
    if let Some(focus) = focus_node {
        obj.insert("sh:focusNode".into(), json!(focus));
    }
    if let Some(path) = result_path {
        obj.insert("sh:resultPath".into(), json!(path));
    }
    if let Some(value) = value {
        obj.insert("sh:value".into(), value);
    }
    obj.insert("schema:name".into(), json!(entry.name));
    obj.insert("sh:resultMessage".into(), json!(entry.message));
    obj.insert(
        "sh:sourceConstraintComponent".into(),
        json!(constraint_component(entry.code)),
    );
    if let Some(ds_path) = &entry.ds_path {
        obj.insert("sh:sourceShape".into(), json!(ds_path));
    }
    Json::Object(obj)
}

/// Data paths alternate entity and property tokens starting with an entity,
/// so an even length means the path ends on a property.
fn split_data_path(path: Option<&[String]>) -> (Option<&str>, Option<&str>) {
    match path {
        None | Some([]) => (None, None),
        Some(tokens) if tokens.len() % 2 == 0 => (
            tokens.get(tokens.len() - 2).map(String::as_str),
            tokens.last().map(String::as_str),
        ),
        Some(tokens) => (tokens.last().map(String::as_str), None),
    }
}

fn constraint_component(code: u16) -> &'static str {
    match code {
        501 => "sh:ClassConstraintComponent",
        502 => "sh:ClosedConstraintComponent",
        503 => "sh:MinCountConstraintComponent",
        504 => "sh:MaxCountConstraintComponent",
        505 => "sh:OrConstraintComponent",
        506 | 535 => "sh:InConstraintComponent",
        511 => "sh:MaxLengthConstraintComponent",
        512 => "sh:MinLengthConstraintComponent",
        513 => "sh:PatternConstraintComponent",
        514 => "sh:LanguageInConstraintComponent",
        515 => "sh:UniqueLangConstraintComponent",
        521 => "sh:MinExclusiveConstraintComponent",
        522 => "sh:MinInclusiveConstraintComponent",
        523 => "sh:MaxExclusiveConstraintComponent",
        524 => "sh:MaxInclusiveConstraintComponent",
        531 => "sh:EqualsConstraintComponent",
        532 => "sh:DisjointConstraintComponent",
        533 => "sh:LessThanConstraintComponent",
        534 => "sh:LessThanOrEqualsConstraintComponent",
        536 => "sh:HasValueConstraintComponent",
        _ => "sh:NodeConstraintComponent",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(code: u16) -> ErrorEntry {
        ErrorEntry::new(
            ErrorKind::ComplianceError,
            Severity::Warning,
            code,
            "Non-conform property",
            "test",
        )
    }

    #[test]
    fn verdict_folding() {
        let ctx = DsContext::verification_context();
        let report = VerificationReport::from_errors(vec![], &ctx);
        assert_eq!(report.verdict, Verdict::Valid);

        let report = VerificationReport::from_errors(vec![warning(502)], &ctx);
        assert_eq!(report.verdict, Verdict::ValidWithWarnings);
        assert!(report.verdict.is_conformant());

        let mut critical = warning(501);
        critical.severity = Severity::Critical;
        let report = VerificationReport::from_errors(vec![warning(502), critical], &ctx);
        assert_eq!(report.verdict, Verdict::Invalid);
    }

    #[test]
    fn data_path_rewritten_to_absolute() {
        let ctx = DsContext::verification_context();
        let entry = warning(502).at("$", &["https://example.com/x".into(), "schema:name".into()]);
        let report = VerificationReport::from_errors(vec![entry], &ctx);
        assert_eq!(
            report.errors[0].data_path.as_ref().unwrap()[1],
            "http://schema.org/name"
        );
        // dsPath keeps the compact form
        assert_eq!(report.errors[0].ds_path.as_deref(), Some("$"));
    }

    #[test]
    fn shacl_expands_undeclared_property_per_triple() {
        let ctx = DsContext::verification_context();
        let entry = warning(502)
            .at("$", &["https://example.com/x".into(), "schema:name".into()])
            .with_values(vec![
                json!({ "type": "literal", "value": "a" }),
                json!({ "type": "literal", "value": "b" }),
            ]);
        let report = VerificationReport::from_errors(vec![entry], &ctx);
        let rendered = report.render(ReportFormat::Shacl);
        let results = rendered["sh:result"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["sh:value"]["value"], "a");
        assert_eq!(results[1]["sh:value"]["value"], "b");
        assert_eq!(
            results[0]["sh:focusNode"].as_str(),
            Some("https://example.com/x")
        );
        assert_eq!(
            results[0]["sh:resultPath"].as_str(),
            Some("http://schema.org/name")
        );
        assert_eq!(
            results[0]["sh:sourceConstraintComponent"],
            "sh:ClosedConstraintComponent"
        );
        assert_eq!(rendered["sh:conforms"], false);
    }

    #[test]
    fn ds_rendering_shape() {
        let ctx = DsContext::verification_context();
        let report = VerificationReport::from_errors(vec![warning(502).with_ds_path("$")], &ctx);
        let rendered = report.render(ReportFormat::Ds);
        assert_eq!(rendered["@type"], "ds:VerificationReport");
        assert_eq!(rendered["ds:validationResult"], "ValidWithWarnings");
        assert_eq!(rendered["ds:errors"][0]["ds:errorCode"], 502);
        assert_eq!(rendered["ds:errors"][0]["@type"], "ds:ComplianceError");
    }
}
