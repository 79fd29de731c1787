//! Typed shape graph built from a flattened Domain Specification.
//!
//! Every range alternative is classified exactly once, while the vocabulary
//! oracle is at hand, into the closed [`RangeShape`] union. Range nodes that
//! fit no strategy are dropped here; a property whose `sh:or` list compiles
//! to nothing keeps its `has_range_union` flag so the validator can report
//! its values as non-conform.

use std::collections::HashSet;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::datatype::{Facets, XsdKind};
use crate::error::VerifyError;
use crate::normalize::FlatDs;
use crate::vocab::VocabularyOracle;

/// How the root shape selects the entities it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// `sh:targetClass`: the root entity types must match bijectively.
    Class(Vec<String>),
    /// `sh:targetSubjectOf`: no type matching happens on the root.
    SubjectOf(String),
    None,
}

#[derive(Debug, Clone)]
pub struct RootShape {
    pub target: TargetSpec,
    /// Ids of property shapes in [`ShapeGraph::properties`].
    pub properties: Vec<String>,
}

/// A nested node shape referenced through `sh:node`.
#[derive(Debug, Clone)]
pub struct NodeShape {
    pub properties: Vec<String>,
}

/// One alternative from a property's `sh:or` union.
#[derive(Debug, Clone)]
pub enum RangeShape {
    /// `sh:datatype` plus its facets.
    Datatype { kind: XsdKind, facets: Facets },
    /// `sh:class` + `sh:node`: a typed reference validated recursively.
    RestrictedClass { classes: Vec<String>, node: String },
    /// Single enumeration class with an `sh:in` member whitelist.
    RestrictedEnumeration { class: String, allowed: Vec<String> },
    /// `sh:class` only: a typed reference without further constraints.
    StandardClass { classes: Vec<String> },
    /// Single enumeration class without a member whitelist.
    Enumeration { class: String },
}

impl RangeShape {
    /// Whether this range is addressed by a `/`-step token of the shape-path
    /// grammar (datatype token, or `_`-joined class set).
    pub fn matches_token(&self, token: &str) -> bool {
        match self {
            RangeShape::Datatype { kind, .. } => kind.token() == token,
            RangeShape::RestrictedClass { classes, .. }
            | RangeShape::StandardClass { classes } => classes_match_token(classes, token),
            RangeShape::RestrictedEnumeration { class, .. }
            | RangeShape::Enumeration { class } => class == token,
        }
    }
}

fn classes_match_token(classes: &[String], token: &str) -> bool {
    let tokens: Vec<&str> = token.split('_').collect();
    tokens.len() == classes.len()
        && tokens.iter().all(|t| classes.iter().any(|c| c == t))
        && classes.iter().all(|c| tokens.contains(&c.as_str()))
}

/// The `_`-joined class set used in shape paths and recursion.
pub fn stringify_classes(classes: &[String]) -> String {
    classes.join("_")
}

#[derive(Debug, Clone)]
pub struct PropertyShape {
    /// Prefixed property name, e.g. `schema:name`.
    pub path: String,
    pub min_count: Option<u64>,
    pub max_count: Option<u64>,
    /// Whether the DS carried an `sh:or` union at all. Without one, no
    /// range or cross-value checks run for this property.
    pub has_range_union: bool,
    pub ranges: Vec<RangeShape>,
    pub unique_lang: bool,
    pub in_list: Option<Vec<String>>,
    pub has_value: Option<String>,
    pub equals: Option<String>,
    pub disjoint: Option<String>,
    pub less_than: Option<String>,
    pub less_than_or_equals: Option<String>,
}

/// The compiled Domain Specification.
#[derive(Debug, Clone)]
pub struct ShapeGraph {
    pub root: RootShape,
    pub nodes: IndexMap<String, NodeShape>,
    pub properties: IndexMap<String, PropertyShape>,
}

impl ShapeGraph {
    pub fn build(
        flat: &FlatDs,
        root_id: &str,
        oracle: &dyn VocabularyOracle,
    ) -> Result<ShapeGraph, VerifyError> {
        let raw_root = flat.node(root_id).ok_or_else(|| VerifyError::Internal {
            message: format!("Domain Specification has no node '{root_id}'"),
        })?;

        let target = if let Some(classes) = string_array(raw_root.get("sh:targetClass")) {
            TargetSpec::Class(classes)
        } else if let Some(Json::String(prop)) = raw_root.get("sh:targetSubjectOf") {
            TargetSpec::SubjectOf(prop.clone())
        } else {
            TargetSpec::None
        };

        let mut builder = Builder {
            flat,
            oracle,
            nodes: IndexMap::new(),
            properties: IndexMap::new(),
            in_progress: HashSet::new(),
        };
        let property_ids = string_array(raw_root.get("sh:property")).unwrap_or_default();
        for id in &property_ids {
            builder.build_property(id)?;
        }

        Ok(ShapeGraph {
            root: RootShape {
                target,
                properties: property_ids,
            },
            nodes: builder.nodes,
            properties: builder.properties,
        })
    }

    pub fn property(&self, id: &str) -> Option<&PropertyShape> {
        self.properties.get(id)
    }

    pub fn node(&self, id: &str) -> Option<&NodeShape> {
        self.nodes.get(id)
    }
}

struct Builder<'a> {
    flat: &'a FlatDs,
    oracle: &'a dyn VocabularyOracle,
    nodes: IndexMap<String, NodeShape>,
    properties: IndexMap<String, PropertyShape>,
    /// Property ids currently being compiled; shape cycles re-entering one
    /// of them terminate here.
    in_progress: HashSet<String>,
}

impl Builder<'_> {
    fn build_node(&mut self, node_id: &str) -> Result<(), VerifyError> {
        if self.nodes.contains_key(node_id) {
            return Ok(());
        }
        let raw = self.flat.node(node_id).ok_or_else(|| VerifyError::Internal {
            message: format!("sh:node references unknown node '{node_id}'"),
        })?;
        let property_ids = string_array(raw.get("sh:property")).unwrap_or_default();
        // inserted before recursing so shape cycles terminate
        self.nodes.insert(
            node_id.to_owned(),
            NodeShape {
                properties: property_ids.clone(),
            },
        );
        for id in &property_ids {
            self.build_property(id)?;
        }
        Ok(())
    }

    fn build_property(&mut self, prop_id: &str) -> Result<(), VerifyError> {
        if self.properties.contains_key(prop_id) || !self.in_progress.insert(prop_id.to_owned())
        {
            return Ok(());
        }
        let raw = self.flat.node(prop_id).ok_or_else(|| VerifyError::Internal {
            message: format!("sh:property references unknown node '{prop_id}'"),
        })?;
        let path = raw
            .get("sh:path")
            .and_then(Json::as_str)
            .ok_or_else(|| VerifyError::Internal {
                message: format!("property shape '{prop_id}' has no sh:path"),
            })?
            .to_owned();

        let range_ids = string_array(raw.get("sh:or"));
        let has_range_union = range_ids.is_some();
        let mut ranges = Vec::new();
        let mut unique_lang = false;
        for range_id in range_ids.unwrap_or_default() {
            let raw_range =
                self.flat
                    .node(&range_id)
                    .ok_or_else(|| VerifyError::Internal {
                        message: format!("sh:or references unknown node '{range_id}'"),
                    })?;
            if raw_range.get("sh:uniqueLang").and_then(Json::as_bool) == Some(true) {
                unique_lang = true;
            }
            if let Some(range) = self.classify_range(raw_range)? {
                ranges.push(range);
            }
        }

        self.properties.insert(
            prop_id.to_owned(),
            PropertyShape {
                path,
                min_count: count_value(raw.get("sh:minCount")),
                max_count: count_value(raw.get("sh:maxCount")),
                has_range_union,
                ranges,
                unique_lang,
                in_list: scalar_array(raw.get("sh:in")),
                has_value: scalar_value(raw.get("sh:hasValue")),
                equals: raw.get("sh:equals").and_then(Json::as_str).map(str::to_owned),
                disjoint: raw
                    .get("sh:disjoint")
                    .and_then(Json::as_str)
                    .map(str::to_owned),
                less_than: raw
                    .get("sh:lessThan")
                    .and_then(Json::as_str)
                    .map(str::to_owned),
                less_than_or_equals: raw
                    .get("sh:lessThanOrEquals")
                    .and_then(Json::as_str)
                    .map(str::to_owned),
            },
        );
        Ok(())
    }

    /// Classification probes run in the same order the ranges are tried
    /// during matching; a node fitting none of them is unusable and dropped.
    fn classify_range(
        &mut self,
        raw: &Map<String, Json>,
    ) -> Result<Option<RangeShape>, VerifyError> {
        let classes = string_array(raw.get("sh:class"));
        let has_in = raw.get("sh:in").is_some();
        let node = raw.get("sh:node").and_then(Json::as_str);

        if let Some(datatype) = raw.get("sh:datatype").and_then(Json::as_str) {
            // non-xsd datatypes never apply
            let Some(kind) = XsdKind::from_token(datatype) else {
                return Ok(None);
            };
            return Ok(Some(RangeShape::Datatype {
                kind,
                facets: parse_facets(raw),
            }));
        }
        if let (Some(classes), Some(node), false) = (&classes, node, has_in) {
            self.build_node(node)?;
            return Ok(Some(RangeShape::RestrictedClass {
                classes: classes.clone(),
                node: node.to_owned(),
            }));
        }
        if let Some(classes) = &classes {
            let single_enum = classes.len() == 1
                && self.oracle.is_valid_enumeration(&classes[0]);
            if single_enum && has_in {
                return Ok(Some(RangeShape::RestrictedEnumeration {
                    class: classes[0].clone(),
                    allowed: scalar_array(raw.get("sh:in")).unwrap_or_default(),
                }));
            }
            if single_enum {
                return Ok(Some(RangeShape::Enumeration {
                    class: classes[0].clone(),
                }));
            }
            if !has_in && classes.iter().all(|c| self.oracle.is_valid_class(c)) {
                return Ok(Some(RangeShape::StandardClass {
                    classes: classes.clone(),
                }));
            }
        }
        Ok(None)
    }
}

fn parse_facets(raw: &Map<String, Json>) -> Facets {
    Facets {
        max_length: count_value(raw.get("sh:maxLength")),
        min_length: count_value(raw.get("sh:minLength")),
        pattern: raw
            .get("sh:pattern")
            .and_then(Json::as_str)
            .and_then(|p| Regex::new(p).ok()),
        language_in: scalar_array(raw.get("sh:languageIn")),
        min_exclusive: scalar_value(raw.get("sh:minExclusive")),
        min_inclusive: scalar_value(raw.get("sh:minInclusive")),
        max_exclusive: scalar_value(raw.get("sh:maxExclusive")),
        max_inclusive: scalar_value(raw.get("sh:maxInclusive")),
    }
}

fn string_array(value: Option<&Json>) -> Option<Vec<String>> {
    match value {
        Some(Json::Array(items)) => Some(
            items
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        _ => None,
    }
}

fn scalar_array(value: Option<&Json>) -> Option<Vec<String>> {
    match value {
        Some(Json::Array(items)) => Some(items.iter().filter_map(scalar_string).collect()),
        _ => None,
    }
}

fn scalar_value(value: Option<&Json>) -> Option<String> {
    value.and_then(scalar_string)
}

fn scalar_string(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn count_value(value: Option<&Json>) -> Option<u64> {
    value.and_then(Json::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::testutil::hotel_vocabulary;
    use crate::vocab::SchemaOrgOracle;
    use serde_json::json;

    fn build(ds: &Json) -> ShapeGraph {
        let flat = FlatDs::from_document(ds).unwrap();
        let root = flat.root_id().unwrap().to_owned();
        let oracle = SchemaOrgOracle::from_vocabulary(&hotel_vocabulary()).unwrap();
        ShapeGraph::build(&flat, &root, &oracle).unwrap()
    }

    fn hotel_ds() -> Json {
        json!({
            "@context": {},
            "@id": "https://example.com/ds/hotel",
            "@type": ["sh:NodeShape", "schema:CreativeWork"],
            "schema:schemaVersion": "https://schema.org/version/11.0/",
            "sh:targetClass": "schema:Hotel",
            "sh:property": [
                {
                    "@id": "_:name",
                    "sh:path": "schema:name",
                    "sh:minCount": 1,
                    "sh:maxCount": 2,
                    "sh:or": [
                        { "sh:datatype": "xsd:string", "sh:maxLength": 50 }
                    ]
                },
                {
                    "@id": "_:address",
                    "sh:path": "schema:address",
                    "sh:or": [
                        {
                            "sh:class": ["schema:PostalAddress"],
                            "sh:node": {
                                "@id": "_:addressNode",
                                "sh:property": [{
                                    "sh:path": "schema:addressLocality",
                                    "sh:or": [ { "sh:datatype": "xsd:string" } ]
                                }]
                            }
                        }
                    ]
                },
                {
                    "@id": "_:day",
                    "sh:path": "schema:openingDays",
                    "sh:or": [
                        {
                            "sh:class": ["schema:DayOfWeek"],
                            "sh:in": ["http://schema.org/Monday", "http://schema.org/Friday"]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn classifies_all_strategies() {
        let shapes = build(&hotel_ds());
        assert_eq!(
            shapes.root.target,
            TargetSpec::Class(vec!["schema:Hotel".into()])
        );
        assert_eq!(shapes.root.properties.len(), 3);

        let name = shapes.property("_:name").unwrap();
        assert_eq!(name.path, "schema:name");
        assert_eq!(name.min_count, Some(1));
        assert_eq!(name.max_count, Some(2));
        assert!(matches!(
            &name.ranges[0],
            RangeShape::Datatype { kind: XsdKind::String, facets }
                if facets.max_length == Some(50)
        ));

        let address = shapes.property("_:address").unwrap();
        let RangeShape::RestrictedClass { classes, node } = &address.ranges[0] else {
            panic!("expected restricted class");
        };
        assert_eq!(classes, &["schema:PostalAddress".to_owned()]);
        assert!(shapes.node(node).is_some());
        // the nested node's property shape was compiled too
        let nested = &shapes.node(node).unwrap().properties[0];
        assert_eq!(
            shapes.property(nested).unwrap().path,
            "schema:addressLocality"
        );

        let day = shapes.property("_:day").unwrap();
        assert!(matches!(
            &day.ranges[0],
            RangeShape::RestrictedEnumeration { class, allowed }
                if class == "schema:DayOfWeek" && allowed.len() == 2
        ));
    }

    #[test]
    fn unusable_ranges_are_dropped_but_union_remains() {
        let ds = json!({
            "@id": "ds1",
            "@type": ["sh:NodeShape", "schema:CreativeWork"],
            "sh:targetClass": ["schema:Hotel"],
            "sh:property": [{
                "@id": "_:p",
                "sh:path": "schema:foo",
                "sh:or": [
                    { "sh:datatype": "schema:Text" },
                    { "sh:class": ["schema:NoSuchClass"] }
                ]
            }]
        });
        let shapes = build(&ds);
        let prop = shapes.property("_:p").unwrap();
        assert!(prop.has_range_union);
        assert!(prop.ranges.is_empty());
    }

    #[test]
    fn property_without_union_is_unconstrained() {
        let ds = json!({
            "@id": "ds1",
            "@type": ["sh:NodeShape", "schema:CreativeWork"],
            "sh:targetClass": ["schema:Hotel"],
            "sh:property": [{ "@id": "_:p", "sh:path": "schema:foo" }]
        });
        let shapes = build(&ds);
        let prop = shapes.property("_:p").unwrap();
        assert!(!prop.has_range_union);
    }

    #[test]
    fn range_tokens_match_class_sets_in_any_order() {
        let range = RangeShape::StandardClass {
            classes: vec!["schema:Place".into(), "schema:Organization".into()],
        };
        assert!(range.matches_token("schema:Place_schema:Organization"));
        assert!(range.matches_token("schema:Organization_schema:Place"));
        assert!(!range.matches_token("schema:Place"));

        let range = RangeShape::Datatype {
            kind: XsdKind::String,
            facets: Facets::default(),
        };
        assert!(range.matches_token("xsd:string"));
    }
}
