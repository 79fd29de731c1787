//! XSD datatype handling: lexical grammars, value comparison categories and
//! the facet checks (codes 511-524).
//!
//! Literal values arrive as strings. A datatype range applies to a value
//! only if the string is a member of the datatype's lexical space; facet
//! checks then run on the typed value. A facet bound that itself fails to
//! parse counts as a violation of that facet.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// The XSD datatypes a Domain Specification may constrain a literal to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XsdKind {
    String,
    Boolean,
    Date,
    DateTime,
    Time,
    Double,
    Float,
    Integer,
    AnyUri,
    /// An `xsd:`-prefixed name the engine does not know (MetaError 400).
    Unknown(String),
}

impl XsdKind {
    /// Parses a `sh:datatype` token. Non-`xsd:` tokens yield `None` and the
    /// range silently never applies.
    pub fn from_token(token: &str) -> Option<XsdKind> {
        let local = token.strip_prefix("xsd:")?;
        Some(match local {
            "string" => XsdKind::String,
            "boolean" => XsdKind::Boolean,
            "date" => XsdKind::Date,
            "dateTime" => XsdKind::DateTime,
            "time" => XsdKind::Time,
            "double" => XsdKind::Double,
            "float" => XsdKind::Float,
            "integer" => XsdKind::Integer,
            "anyURI" => XsdKind::AnyUri,
            _ => XsdKind::Unknown(token.to_owned()),
        })
    }

    /// The prefixed token, used by the shape-path grammar.
    pub fn token(&self) -> &str {
        match self {
            XsdKind::String => "xsd:string",
            XsdKind::Boolean => "xsd:boolean",
            XsdKind::Date => "xsd:date",
            XsdKind::DateTime => "xsd:dateTime",
            XsdKind::Time => "xsd:time",
            XsdKind::Double => "xsd:double",
            XsdKind::Float => "xsd:float",
            XsdKind::Integer => "xsd:integer",
            XsdKind::AnyUri => "xsd:anyURI",
            XsdKind::Unknown(token) => token,
        }
    }

    /// Lexical-space membership of a literal.
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            XsdKind::String => true,
            XsdKind::Boolean => text == "true" || text == "false",
            XsdKind::Date => parse_date(text).is_some(),
            XsdKind::DateTime => parse_date_time(text).is_some(),
            XsdKind::Time => parse_time(text).is_some(),
            XsdKind::Double | XsdKind::Float => parse_number(text).is_some(),
            XsdKind::Integer => parse_number(text).is_some_and(|n| n.fract() == 0.0),
            XsdKind::AnyUri => looks_like_url(text),
            XsdKind::Unknown(_) => false,
        }
    }
}

/// String facets (sh:maxLength, sh:minLength, sh:pattern, sh:languageIn) and
/// range facets (sh:minExclusive .. sh:maxInclusive). Bounds are kept in
/// their lexical form and parsed with the value's own grammar at check time.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub max_length: Option<u64>,
    pub min_length: Option<u64>,
    pub pattern: Option<Regex>,
    pub language_in: Option<Vec<String>>,
    pub min_exclusive: Option<String>,
    pub min_inclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub max_inclusive: Option<String>,
}

/// A failed facet check, to be wrapped with path context by the validator.
#[derive(Debug, Clone)]
pub struct FacetViolation {
    pub code: u16,
    pub name: &'static str,
    pub message: String,
}

/// Runs every facet applicable to `kind` against an accepted literal.
pub fn check_facets(
    kind: &XsdKind,
    text: &str,
    language: Option<&str>,
    facets: &Facets,
) -> Vec<FacetViolation> {
    match kind {
        XsdKind::String => {
            let mut violations = string_facets(text, facets);
            if let Some(allowed) = &facets.language_in {
                let matches = language
                    .is_some_and(|lang| allowed.iter().any(|a| a.eq_ignore_ascii_case(lang)));
                if !matches {
                    violations.push(FacetViolation {
                        code: 514,
                        name: "Non-conform sh:languageIn",
                        message: "The data graph has a string value that does not match any of the language tags specified by the domain specification.".into(),
                    });
                }
            }
            violations
        }
        XsdKind::AnyUri => string_facets(text, facets),
        XsdKind::Date => ordered_facets(text, facets, parse_date, "date"),
        XsdKind::DateTime => ordered_facets(text, facets, parse_date_time, "dateTime"),
        XsdKind::Time => ordered_facets(text, facets, parse_time, "time"),
        XsdKind::Double | XsdKind::Float | XsdKind::Integer => {
            ordered_facets(text, facets, parse_number, "numeric")
        }
        XsdKind::Boolean | XsdKind::Unknown(_) => Vec::new(),
    }
}

fn string_facets(text: &str, facets: &Facets) -> Vec<FacetViolation> {
    let mut violations = Vec::new();
    let length = text.chars().count() as u64;
    if facets.max_length.is_some_and(|max| length > max) {
        violations.push(FacetViolation {
            code: 511,
            name: "Non-conform sh:maxLength",
            message: "The data graph has a string value with a length that is greater than allowed by the domain specification.".into(),
        });
    }
    if facets.min_length.is_some_and(|min| length < min) {
        violations.push(FacetViolation {
            code: 512,
            name: "Non-conform sh:minLength",
            message: "The data graph has a string value with a length that is lesser than allowed by the domain specification.".into(),
        });
    }
    if let Some(pattern) = &facets.pattern {
        if !pattern.is_match(text) {
            violations.push(FacetViolation {
                code: 513,
                name: "Non-conform sh:pattern",
                message: "The data graph has a string value that does not match the Regex pattern specified by the domain specification.".into(),
            });
        }
    }
    violations
}

fn ordered_facets<T, P>(text: &str, facets: &Facets, parse: P, unit: &str) -> Vec<FacetViolation>
where
    T: PartialOrd,
    P: Fn(&str) -> Option<T>,
{
    let Some(value) = parse(text) else {
        return Vec::new();
    };
    let mut violations = Vec::new();
    // a bound that cannot be parsed fails its facet check
    let mut check = |bound: &Option<String>, code: u16, name: &'static str,
                     ok: &dyn Fn(&T, &T) -> bool,
                     direction: &str| {
        if let Some(bound) = bound {
            if !parse(bound).is_some_and(|b| ok(&value, &b)) {
                violations.push(FacetViolation {
                    code,
                    name,
                    message: format!(
                        "The data graph has a {unit} value that is {direction} than allowed by the domain specification."
                    ),
                });
            }
        }
    };
    check(
        &facets.min_exclusive,
        521,
        "Non-conform sh:minExclusive",
        &|v, b| v > b,
        "smaller",
    );
    check(
        &facets.min_inclusive,
        522,
        "Non-conform sh:minInclusive",
        &|v, b| v >= b,
        "smaller",
    );
    check(
        &facets.max_exclusive,
        523,
        "Non-conform sh:maxExclusive",
        &|v, b| v < b,
        "greater",
    );
    check(
        &facets.max_inclusive,
        524,
        "Non-conform sh:maxInclusive",
        &|v, b| v <= b,
        "greater",
    );
    violations
}

/// Comparison category of a literal for sh:lessThan / sh:lessThanOrEquals.
/// Classification order: number, time, date, dateTime, plain string.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparable {
    Number(f64),
    Time(NaiveTime),
    Moment(NaiveDateTime),
    Text(String),
}

impl Comparable {
    pub fn classify(text: &str) -> Comparable {
        if let Some(n) = parse_number(text) {
            return Comparable::Number(n);
        }
        if let Some(t) = parse_time(text) {
            return Comparable::Time(t);
        }
        if let Some(dt) = parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)) {
            return Comparable::Moment(dt);
        }
        if let Some(dt) = parse_date_time(text) {
            return Comparable::Moment(dt);
        }
        Comparable::Text(text.to_owned())
    }

    pub fn category_name(&self) -> &'static str {
        match self {
            Comparable::Number(_) => "numeric",
            Comparable::Time(_) => "time",
            Comparable::Moment(_) => "date",
            Comparable::Text(_) => "string",
        }
    }

    /// `None` when the two values belong to different categories.
    pub fn less_than(&self, other: &Comparable) -> Option<bool> {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => Some(a < b),
            (Comparable::Time(a), Comparable::Time(b)) => Some(a < b),
            (Comparable::Moment(a), Comparable::Moment(b)) => Some(a < b),
            (Comparable::Text(a), Comparable::Text(b)) => Some(a < b),
            _ => None,
        }
    }

    pub fn less_than_or_equal(&self, other: &Comparable) -> Option<bool> {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => Some(a <= b),
            (Comparable::Time(a), Comparable::Time(b)) => Some(a <= b),
            (Comparable::Moment(a), Comparable::Moment(b)) => Some(a <= b),
            (Comparable::Text(a), Comparable::Text(b)) => Some(a <= b),
            _ => None,
        }
    }
}

static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("hardcoded regex"));
static MONTH_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--(\d{2})-?(\d{2})$").expect("hardcoded regex"));

/// Accepted date forms: `YYYY-MM-DD`, `YYYYMMDD`, `YYYY-MM`, `--MM-DD`,
/// `--MMDD`. Partial forms get a fixed day / year so they stay comparable.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    if let Some(caps) = YEAR_MONTH_RE.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month = caps[1].parse().ok()?;
        let day = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(2000, month, day);
    }
    None
}

/// Accepted time forms: `HH:mm`, `HH:mm:ss`, `HH:mm:ss.fff`, each with an
/// optional `Z` or `+hh:mm` offset suffix (the offset is not applied).
pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = strip_offset(text);
    for format in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Some(time);
        }
    }
    None
}

/// ISO 8601 date-times with optional fractional seconds (`.` or `,`) and an
/// optional offset. Offset forms are normalized to UTC before comparison.
pub(crate) fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.replacen(',', ".", 1);
    if let Ok(with_offset) = chrono::DateTime::parse_from_rfc3339(&text) {
        return Some(with_offset.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(dt);
        }
    }
    None
}

pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn strip_offset(text: &str) -> &str {
    if let Some(stripped) = text.strip_suffix('Z') {
        return stripped;
    }
    // +hh:mm / -hh:mm
    if text.len() > 6 && text.is_char_boundary(text.len() - 6) {
        let (head, tail) = text.split_at(text.len() - 6);
        let bytes = tail.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-')
            && bytes[3] == b':'
            && bytes[1].is_ascii_digit()
            && bytes[2].is_ascii_digit()
            && bytes[4].is_ascii_digit()
            && bytes[5].is_ascii_digit()
        {
            return head;
        }
    }
    text
}

fn looks_like_url(text: &str) -> bool {
    text.starts_with("http://")
        || text.starts_with("https://")
        || text.starts_with("ftp://")
        || text.starts_with("www.")
}
