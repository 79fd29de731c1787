//! Path resolution over the two graphs.
//!
//! Data paths are token vectors alternating entity ids and property names:
//! `[entity, property, referenced-entity, property, ...]`. Shape paths are
//! strings in the `$ . / _` grammar: `$` is the root shape, `.name` steps
//! into a property shape, `/token` steps into one alternative of its range
//! union (a datatype token or a `_`-joined class set).

use crate::error::VerifyError;
use crate::graph::{DataGraph, Entity, Value};
use crate::shapes::{PropertyShape, RangeShape, RootShape, ShapeGraph};

/// Where a data path resolution ended up.
#[derive(Debug)]
pub enum DataCursor<'a> {
    Entity(&'a Entity),
    Values(&'a [Value]),
}

/// Walks a data path. Entity steps move into a property's value list;
/// value-list steps move into the referenced entity named by the token.
pub fn resolve_data<'a>(
    graph: &'a DataGraph,
    path: &[String],
) -> Result<DataCursor<'a>, VerifyError> {
    let (first, rest) = path.split_first().ok_or_else(|| VerifyError::Internal {
        message: "empty data path".into(),
    })?;
    let mut cursor = DataCursor::Entity(graph.entity(first).ok_or_else(|| {
        VerifyError::DataPath {
            token: first.clone(),
        }
    })?);
    for token in rest {
        cursor = match cursor {
            DataCursor::Entity(entity) => DataCursor::Values(
                entity
                    .properties
                    .get(token)
                    .map(Vec::as_slice)
                    .ok_or_else(|| VerifyError::DataPath {
                        token: token.clone(),
                    })?,
            ),
            DataCursor::Values(values) => {
                let referenced = values
                    .iter()
                    .any(|v| v.as_reference() == Some(token.as_str()));
                if !referenced {
                    return Err(VerifyError::DataPath {
                        token: token.clone(),
                    });
                }
                DataCursor::Entity(graph.entity(token).ok_or_else(|| VerifyError::DataPath {
                    token: token.clone(),
                })?)
            }
        };
    }
    Ok(cursor)
}

pub fn resolve_entity<'a>(
    graph: &'a DataGraph,
    path: &[String],
) -> Result<&'a Entity, VerifyError> {
    match resolve_data(graph, path)? {
        DataCursor::Entity(entity) => Ok(entity),
        DataCursor::Values(_) => Err(VerifyError::Internal {
            message: format!("data path '{}' does not end on an entity", path.join(" > ")),
        }),
    }
}

pub fn resolve_values<'a>(
    graph: &'a DataGraph,
    path: &[String],
) -> Result<&'a [Value], VerifyError> {
    match resolve_data(graph, path)? {
        DataCursor::Values(values) => Ok(values),
        DataCursor::Entity(_) => Err(VerifyError::Internal {
            message: format!(
                "data path '{}' does not end on a property",
                path.join(" > ")
            ),
        }),
    }
}

/// Where a shape path resolution ended up.
#[derive(Debug)]
pub enum ShapeCursor<'a> {
    Root(&'a RootShape),
    Property(&'a PropertyShape),
    Range(&'a RangeShape),
}

pub fn resolve_shape<'a>(
    shapes: &'a ShapeGraph,
    path: &str,
) -> Result<ShapeCursor<'a>, VerifyError> {
    let bad_path = || VerifyError::ShapePath {
        path: path.to_owned(),
    };
    let mut rest = path.strip_prefix('$').ok_or_else(bad_path)?;
    let mut cursor = ShapeCursor::Root(&shapes.root);
    while !rest.is_empty() {
        let separator = rest.chars().next().ok_or_else(bad_path)?;
        let tail = &rest[1..];
        let token_end = tail
            .find(|c| c == '.' || c == '/')
            .unwrap_or(tail.len());
        let token = &tail[..token_end];
        rest = &tail[token_end..];
        if token.is_empty() {
            return Err(bad_path());
        }

        cursor = match (separator, cursor) {
            ('.', ShapeCursor::Root(root)) => {
                ShapeCursor::Property(find_property(shapes, &root.properties, token, bad_path)?)
            }
            ('.', ShapeCursor::Range(RangeShape::RestrictedClass { node, .. })) => {
                let node_shape = shapes.node(node).ok_or_else(bad_path)?;
                ShapeCursor::Property(find_property(
                    shapes,
                    &node_shape.properties,
                    token,
                    bad_path,
                )?)
            }
            ('/', ShapeCursor::Property(prop)) => ShapeCursor::Range(
                prop.ranges
                    .iter()
                    .find(|r| r.matches_token(token))
                    .ok_or_else(bad_path)?,
            ),
            _ => return Err(bad_path()),
        };
    }
    Ok(cursor)
}

fn find_property<'a, F>(
    shapes: &'a ShapeGraph,
    property_ids: &[String],
    token: &str,
    bad_path: F,
) -> Result<&'a PropertyShape, VerifyError>
where
    F: Fn() -> VerifyError,
{
    property_ids
        .iter()
        .filter_map(|id| shapes.property(id))
        .find(|p| p.path == token)
        .ok_or_else(bad_path)
}
