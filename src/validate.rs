//! The recursive constraint validator and range matcher.
//!
//! Validation starts at the root entity against the root shape and walks
//! referenced entities through `sh:node` ranges. Violations accumulate in a
//! flat entry list; only internal faults surface as `Err`, and the engine
//! boundary converts those into a single ExecutionError 999 report.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::datatype::{check_facets, Comparable, XsdKind};
use crate::error::VerifyError;
use crate::graph::{DataGraph, Entity, Value};
use crate::lexical::{lexical_check, lexical_report, InputKind};
use crate::normalize::{pretty_print_uri, FlatDs};
use crate::path::{resolve_entity, resolve_shape, resolve_values, ShapeCursor};
use crate::report::{ErrorEntry, ErrorKind, Severity, VerificationReport};
use crate::shapes::{stringify_classes, PropertyShape, RangeShape, ShapeGraph, TargetSpec};
use crate::vocab::VocabularyOracle;

/// Verifies data graphs against Domain Specifications using a fixed
/// vocabulary oracle.
pub struct Verifier {
    oracle: Arc<dyn VocabularyOracle>,
}

impl Verifier {
    pub fn new(oracle: Arc<dyn VocabularyOracle>) -> Self {
        Verifier { oracle }
    }

    pub fn verify(&self, data: &Json, ds: &Json) -> VerificationReport {
        self.verify_with(data, ds, false)
    }

    /// `ignore_target_matching` skips the `sh:targetClass` check on the root
    /// entity; bulk ingestion pipelines match targets upstream.
    pub fn verify_with(
        &self,
        data: &Json,
        ds: &Json,
        ignore_target_matching: bool,
    ) -> VerificationReport {
        if let Some(entry) = lexical_check(data, InputKind::DataGraph) {
            return lexical_report(entry, InputKind::DataGraph);
        }
        if let Some(entry) = lexical_check(ds, InputKind::DomainSpecification) {
            return lexical_report(entry, InputKind::DomainSpecification);
        }
        match self.run(data, ds, ignore_target_matching) {
            Ok(report) => report,
            Err(_) => execution_error_report(),
        }
    }

    fn run(
        &self,
        data: &Json,
        ds: &Json,
        ignore_target_matching: bool,
    ) -> Result<VerificationReport, VerifyError> {
        let flat = FlatDs::from_document(ds)?;
        let Some(root_id) = flat.root_id().map(str::to_owned) else {
            return Ok(missing_version_report());
        };
        let version_present = flat
            .node(&root_id)
            .and_then(|n| n.get("schema:schemaVersion"))
            .is_some_and(Json::is_string);
        if !version_present {
            return Ok(missing_version_report());
        }

        let shapes = ShapeGraph::build(&flat, &root_id, self.oracle.as_ref())?;
        let graph = DataGraph::from_json(data, &flat.context)?;

        let ctx = Context {
            graph: &graph,
            shapes: &shapes,
            oracle: self.oracle.as_ref(),
        };
        let mut errors = Vec::new();
        ctx.validate_entity(
            &[graph.root.clone()],
            "$",
            ignore_target_matching,
            &mut errors,
        )?;
        Ok(VerificationReport::from_errors(errors, &flat.context))
    }
}

fn execution_error_report() -> VerificationReport {
    VerificationReport::single(
        ErrorEntry::new(
            ErrorKind::ExecutionError,
            Severity::Critical,
            999,
            "Execution Error",
            "There was an error during the verification process, make sure the sent data graph and domain specification have a valid serialization.",
        )
        .with_ds_path("$"),
        "There was an execution error during the verification process, make sure the sent data graph and domain specification have a valid serialization.",
    )
}

fn missing_version_report() -> VerificationReport {
    let message = "There was an execution error during the verification process: The Domain Specification does not provide the used schema.org version number.";
    VerificationReport::single(
        ErrorEntry::new(
            ErrorKind::ExecutionError,
            Severity::Critical,
            999,
            "Execution Error",
            message,
        )
        .with_ds_path("$"),
        message,
    )
}

struct Context<'a> {
    graph: &'a DataGraph,
    shapes: &'a ShapeGraph,
    oracle: &'a dyn VocabularyOracle,
}

impl Context<'_> {
    fn validate_entity(
        &self,
        data_path: &[String],
        ds_path: &str,
        ignore_target_matching: bool,
        errors: &mut Vec<ErrorEntry>,
    ) -> Result<(), VerifyError> {
        let entity = resolve_entity(self.graph, data_path)?;
        let property_ids = match resolve_shape(self.shapes, ds_path)? {
            ShapeCursor::Root(root) => {
                if let TargetSpec::Class(targets) = &root.target {
                    if !ignore_target_matching
                        && !types_match(targets, &entity.types, self.oracle)
                    {
                        errors.push(
                            compliance(
                                Severity::Critical,
                                501,
                                "Non-conform target @type",
                                "The data graph has a @type that is not specified by the Domain Specification.",
                            )
                            .at(ds_path, data_path),
                        );
                        return Ok(());
                    }
                }
                &root.properties
            }
            ShapeCursor::Range(RangeShape::RestrictedClass { node, .. }) => {
                &self
                    .shapes
                    .node(node)
                    .ok_or_else(|| VerifyError::ShapePath {
                        path: ds_path.to_owned(),
                    })?
                    .properties
            }
            _ => {
                return Err(VerifyError::ShapePath {
                    path: ds_path.to_owned(),
                })
            }
        };

        let mut declared = Vec::with_capacity(property_ids.len());
        for prop_id in property_ids {
            let prop = self
                .shapes
                .property(prop_id)
                .ok_or_else(|| VerifyError::Internal {
                    message: format!("unknown property shape '{prop_id}'"),
                })?;
            declared.push(prop.path.as_str());

            let prop_ds_path = format!("{ds_path}.{}", prop.path);
            validate_cardinality(entity, prop, data_path, &prop_ds_path, errors);
            if entity.properties.contains_key(&prop.path) {
                let mut prop_data_path = data_path.to_vec();
                prop_data_path.push(prop.path.clone());
                self.validate_ranges(prop, &prop_data_path, &prop_ds_path, errors)?;
            }
        }

        // undeclared property sweep
        for (name, values) in &entity.properties {
            if name == "@type" || declared.contains(&name.as_str()) {
                continue;
            }
            errors.push(
                compliance(
                    Severity::Warning,
                    502,
                    "Non-conform property",
                    format!(
                        "The entity has a property ('{}') that is not specified by the domain specification.",
                        pretty_print_uri(name)
                    ),
                )
                .at(ds_path, data_path)
                .with_values(values.iter().map(Value::to_json).collect()),
            );
        }
        Ok(())
    }

    fn validate_ranges(
        &self,
        prop: &PropertyShape,
        data_path: &[String],
        ds_path: &str,
        errors: &mut Vec<ErrorEntry>,
    ) -> Result<(), VerifyError> {
        // without a range union there is nothing to check for this property
        if !prop.has_range_union {
            return Ok(());
        }
        let values = resolve_values(self.graph, data_path)?;

        check_unique_lang(prop, values, data_path, ds_path, errors);
        check_in(prop, values, data_path, ds_path, errors);
        check_has_value(prop, values, data_path, ds_path, errors);
        self.check_equals(prop, values, data_path, ds_path, errors);
        self.check_disjoint(prop, values, data_path, ds_path, errors);
        self.check_less_than(prop, values, data_path, ds_path, false, errors);
        self.check_less_than(prop, values, data_path, ds_path, true, errors);

        // a defective range is reported once per property, not per value
        for range in &prop.ranges {
            if let RangeShape::Datatype {
                kind: XsdKind::Unknown(token),
                ..
            } = range
            {
                errors.push(
                    ErrorEntry::new(
                        ErrorKind::MetaError,
                        Severity::Critical,
                        400,
                        "DS Meta Error",
                        format!(
                            "The given domain specification includes a data type definition that is not valid: {token}"
                        ),
                    )
                    .at(ds_path, data_path),
                );
            }
        }

        for value in values {
            if let Some(target) = value.as_reference() {
                if self.graph.entity(target).is_none() {
                    let mut dangling_path = data_path.to_vec();
                    dangling_path.push(target.to_owned());
                    errors.push(
                        ErrorEntry::new(
                            ErrorKind::DataError,
                            Severity::Error,
                            900,
                            "Non-existing entity",
                            format!(
                                "The data graph has a property ('{}') with a referenced entity that does not exist in the data graph.",
                                pretty_print_uri(&prop.path)
                            ),
                        )
                        .at(ds_path, &dangling_path),
                    );
                    continue;
                }
            }

            // best match over the range union: fewest errors wins, a clean
            // match short-circuits
            let mut best: Option<Vec<ErrorEntry>> = None;
            for range in &prop.ranges {
                let Some(attempt) =
                    self.match_range(range, value, &prop.path, data_path, ds_path)?
                else {
                    continue;
                };
                let better = best
                    .as_ref()
                    .map(|b| attempt.len() < b.len())
                    .unwrap_or(true);
                if better {
                    best = Some(attempt);
                }
                if best.as_ref().is_some_and(Vec::is_empty) {
                    break;
                }
            }
            match best {
                None => errors.push(
                    compliance(
                        Severity::Error,
                        505,
                        "Non-conform range",
                        format!(
                            "The data graph has a property ('{}') with a @type/datatype that is non-conform to the domain specification.",
                            pretty_print_uri(&prop.path)
                        ),
                    )
                    .at(ds_path, data_path),
                ),
                Some(attempt) => errors.extend(attempt),
            }
        }
        Ok(())
    }

    /// `Ok(None)` means the range does not apply to this value; `Ok(Some)`
    /// means it applied, with the violations of that interpretation.
    fn match_range(
        &self,
        range: &RangeShape,
        value: &Value,
        property: &str,
        data_path: &[String],
        ds_path: &str,
    ) -> Result<Option<Vec<ErrorEntry>>, VerifyError> {
        match range {
            RangeShape::Datatype {
                kind: XsdKind::Unknown(_),
                ..
            } => Ok(None),
            RangeShape::Datatype { kind, facets } => {
                let Some(text) = value.as_literal() else {
                    return Ok(None);
                };
                if !kind.accepts(text) {
                    return Ok(None);
                }
                let attempt = check_facets(kind, text, value.language(), facets)
                    .into_iter()
                    .map(|v| {
                        compliance(Severity::Error, v.code, v.name, v.message)
                            .at(ds_path, data_path)
                            .with_values(vec![value.to_json()])
                    })
                    .collect();
                Ok(Some(attempt))
            }
            RangeShape::RestrictedClass { classes, .. } => {
                let Some(target_id) = value.as_reference() else {
                    return Ok(None);
                };
                let Some(target) = self.graph.entity(target_id) else {
                    return Ok(None);
                };
                let first_is_enum = target
                    .types
                    .first()
                    .is_some_and(|t| self.oracle.is_valid_enumeration(t));
                if target.types.is_empty()
                    || first_is_enum
                    || !types_match(&target.types, classes, self.oracle)
                {
                    return Ok(None);
                }
                let mut nested_path = data_path.to_vec();
                nested_path.push(target_id.to_owned());
                let nested_ds_path = format!("{ds_path}/{}", stringify_classes(classes));
                let mut attempt = Vec::new();
                self.validate_entity(&nested_path, &nested_ds_path, false, &mut attempt)?;
                Ok(Some(attempt))
            }
            RangeShape::RestrictedEnumeration { allowed, .. } => {
                let conforms = value
                    .as_literal()
                    .is_some_and(|text| allowed.iter().any(|a| a == text));
                if conforms {
                    Ok(Some(Vec::new()))
                } else {
                    Ok(Some(vec![
                        compliance(
                            Severity::Error,
                            506,
                            "Non-conform enumeration value",
                            format!(
                                "The data graph has a property ('{}') with an enumeration value that is non-conform to the domain specification.",
                                pretty_print_uri(property)
                            ),
                        )
                        .at(ds_path, data_path)
                        .with_values(vec![value.to_json()]),
                    ]))
                }
            }
            RangeShape::StandardClass { classes } => {
                let Some(target_id) = value.as_reference() else {
                    return Ok(None);
                };
                let Some(target) = self.graph.entity(target_id) else {
                    return Ok(None);
                };
                if !target.types.is_empty()
                    && types_match(classes, &target.types, self.oracle)
                {
                    Ok(Some(Vec::new()))
                } else {
                    Ok(None)
                }
            }
            RangeShape::Enumeration { .. } => {
                // any literal is accepted as an enumeration member
                Ok(value.as_literal().map(|_| Vec::new()))
            }
        }
    }

    fn check_equals(
        &self,
        prop: &PropertyShape,
        values: &[Value],
        data_path: &[String],
        ds_path: &str,
        errors: &mut Vec<ErrorEntry>,
    ) {
        let Some(foreign_prop) = &prop.equals else {
            return;
        };
        // absence of the sibling property is itself a violation here
        let conforms = match self.foreign_values(data_path, foreign_prop) {
            Some(foreign) => literal_sets_equal(values, foreign),
            None => false,
        };
        if !conforms {
            errors.push(
                compliance(
                    Severity::Error,
                    531,
                    "Non-conform sh:equals",
                    format!(
                        "The data graph has a property ('{}') with values that are not equal to the values of another property ('{}') as specified by the domain specification.",
                        pretty_print_uri(&prop.path),
                        pretty_print_uri(foreign_prop)
                    ),
                )
                .at(ds_path, data_path),
            );
        }
    }

    fn check_disjoint(
        &self,
        prop: &PropertyShape,
        values: &[Value],
        data_path: &[String],
        ds_path: &str,
        errors: &mut Vec<ErrorEntry>,
    ) {
        let Some(foreign_prop) = &prop.disjoint else {
            return;
        };
        // absence of the sibling property satisfies disjointness
        let Some(foreign) = self.foreign_values(data_path, foreign_prop) else {
            return;
        };
        let locals: HashSet<&str> = values.iter().filter_map(Value::as_literal).collect();
        let overlapping = foreign
            .iter()
            .filter_map(Value::as_literal)
            .any(|text| locals.contains(text));
        if overlapping {
            errors.push(
                compliance(
                    Severity::Error,
                    532,
                    "Non-conform sh:disjoint",
                    format!(
                        "The data graph has a property ('{}') with values that are not disjoint to the values of another property ('{}') as specified by the domain specification.",
                        pretty_print_uri(&prop.path),
                        pretty_print_uri(foreign_prop)
                    ),
                )
                .at(ds_path, data_path),
            );
        }
    }

    fn check_less_than(
        &self,
        prop: &PropertyShape,
        values: &[Value],
        data_path: &[String],
        ds_path: &str,
        or_equals: bool,
        errors: &mut Vec<ErrorEntry>,
    ) {
        let (foreign_prop, code, name, relation) = if or_equals {
            let Some(p) = &prop.less_than_or_equals else {
                return;
            };
            (p, 534, "Non-conform sh:lessThanOrEquals", "less than or equal to")
        } else {
            let Some(p) = &prop.less_than else {
                return;
            };
            (p, 533, "Non-conform sh:lessThan", "less than")
        };
        let Some(foreign) = self.foreign_values(data_path, foreign_prop) else {
            return;
        };

        let mut push = |message: String| {
            errors.push(
                compliance(Severity::Error, code, name, message).at(ds_path, data_path),
            );
        };
        let classify_side = |side: &[Value], push: &mut dyn FnMut(String)| -> Vec<Comparable> {
            let mut classified = Vec::new();
            for value in side {
                match value.as_literal() {
                    Some(text) => classified.push(Comparable::classify(text)),
                    None => push(format!(
                        "The data graph has a property ('{}') with a non-literal value that cannot be compared to the values of another property ('{}') as specified by the domain specification.",
                        pretty_print_uri(&prop.path),
                        pretty_print_uri(foreign_prop)
                    )),
                }
            }
            classified
        };
        let locals = classify_side(values, &mut push);
        let foreigns = classify_side(foreign, &mut push);

        for local in &locals {
            for other in &foreigns {
                let ordered = if or_equals {
                    local.less_than_or_equal(other)
                } else {
                    local.less_than(other)
                };
                match ordered {
                    Some(true) => {}
                    Some(false) => push(format!(
                        "The data graph has a property ('{}') with a {} value that is not {relation} the {} value of another property ('{}') as specified by the domain specification.",
                        pretty_print_uri(&prop.path),
                        local.category_name(),
                        other.category_name(),
                        pretty_print_uri(foreign_prop)
                    )),
                    // cross-category pairs cannot be ordered and fail
                    None => push(format!(
                        "The data graph has a property ('{}') with a {} value that cannot be compared to a {} value of another property ('{}') as specified by the domain specification.",
                        pretty_print_uri(&prop.path),
                        local.category_name(),
                        other.category_name(),
                        pretty_print_uri(foreign_prop)
                    )),
                }
            }
        }
    }

    /// The value list of a sibling property of the entity the data path
    /// points into, or `None` when it is absent.
    fn foreign_values(&self, data_path: &[String], foreign_prop: &str) -> Option<&[Value]> {
        let mut foreign_path = data_path.to_vec();
        foreign_path.pop()?;
        foreign_path.push(foreign_prop.to_owned());
        resolve_values(self.graph, &foreign_path).ok()
    }
}

/// Both sides must be all-literal and cover each other as sets.
fn literal_sets_equal(left: &[Value], right: &[Value]) -> bool {
    let collect = |side: &[Value]| -> Option<HashSet<String>> {
        side.iter()
            .map(|v| v.as_literal().map(str::to_owned))
            .collect()
    };
    match (collect(left), collect(right)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn check_unique_lang(
    prop: &PropertyShape,
    values: &[Value],
    data_path: &[String],
    ds_path: &str,
    errors: &mut Vec<ErrorEntry>,
) {
    if !prop.unique_lang {
        return;
    }
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for value in values {
        let Some(lang) = value.language() else {
            continue;
        };
        if !seen.insert(lang) && reported.insert(lang) {
            errors.push(
                compliance(
                    Severity::Error,
                    515,
                    "Non-conform sh:uniqueLang",
                    "The data graph has a property with multiple string values that use the same language tag, which is not allowed by the domain specification.",
                )
                .at(ds_path, data_path),
            );
        }
    }
}

fn check_in(
    prop: &PropertyShape,
    values: &[Value],
    data_path: &[String],
    ds_path: &str,
    errors: &mut Vec<ErrorEntry>,
) {
    let Some(allowed) = &prop.in_list else {
        return;
    };
    for value in values {
        let conforms = value
            .as_literal()
            .is_some_and(|text| allowed.iter().any(|a| a == text));
        if !conforms {
            errors.push(
                compliance(
                    Severity::Error,
                    535,
                    "Non-conform sh:in",
                    "The data graph has a literal value that does not match any of the allowed values specified by the domain specification.",
                )
                .at(ds_path, data_path)
                .with_values(vec![value.to_json()]),
            );
        }
    }
}

fn check_has_value(
    prop: &PropertyShape,
    values: &[Value],
    data_path: &[String],
    ds_path: &str,
    errors: &mut Vec<ErrorEntry>,
) {
    let Some(expected) = &prop.has_value else {
        return;
    };
    let found = values
        .iter()
        .any(|v| v.as_literal() == Some(expected.as_str()));
    if !found {
        errors.push(
            compliance(
                Severity::Error,
                536,
                "Non-conform sh:hasValue",
                "The data graph is missing a literal value that is specified as mandatory by the domain specification.",
            )
            .at(ds_path, data_path),
        );
    }
}

fn validate_cardinality(
    entity: &Entity,
    prop: &PropertyShape,
    data_path: &[String],
    prop_ds_path: &str,
    errors: &mut Vec<ErrorEntry>,
) {
    let count = entity.properties.get(&prop.path).map(Vec::len);
    let cardinality_message = || {
        format!(
            "The entity has a property ('{}') with a cardinality that is not in compliance with the domain specification.",
            pretty_print_uri(&prop.path)
        )
    };
    let mut path_with_property = data_path.to_vec();
    path_with_property.push(prop.path.clone());

    if let Some(min) = prop.min_count {
        match count {
            None if min > 0 => errors.push(
                compliance(
                    Severity::Error,
                    503,
                    "Missing Property",
                    format!(
                        "The entity is missing a property ('{}') that is defined as required by the domain specification.",
                        pretty_print_uri(&prop.path)
                    ),
                )
                .at(prop_ds_path, data_path),
            ),
            Some(n) if min > 1 && (n as u64) < min => errors.push(
                compliance(Severity::Error, 504, "Non-conform cardinality", cardinality_message())
                    .at(prop_ds_path, &path_with_property),
            ),
            _ => {}
        }
    }
    if let (Some(max), Some(n)) = (prop.max_count, count) {
        if (n as u64) > max {
            errors.push(
                compliance(Severity::Error, 504, "Non-conform cardinality", cardinality_message())
                    .at(prop_ds_path, &path_with_property),
            );
        }
    }
}

/// Bijective type matching: the two sets must be the same size, every data
/// type must equal or specialize some target type, and every target type
/// must be covered by some data type.
fn types_match(ds_types: &[String], data_types: &[String], oracle: &dyn VocabularyOracle) -> bool {
    if ds_types.len() != data_types.len() {
        return false;
    }
    let covered = |data_type: &String| {
        ds_types
            .iter()
            .any(|ds| ds == data_type || oracle.is_superclass(ds, data_type))
    };
    let covering = |ds_type: &String| {
        data_types
            .iter()
            .any(|data| ds_type == data || oracle.is_superclass(ds_type, data))
    };
    data_types.iter().all(covered) && ds_types.iter().all(covering)
}

fn compliance(
    severity: Severity,
    code: u16,
    name: &'static str,
    message: impl Into<String>,
) -> ErrorEntry {
    ErrorEntry::new(ErrorKind::ComplianceError, severity, code, name, message)
}
