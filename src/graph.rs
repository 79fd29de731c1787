//! In-memory data graph model.
//!
//! A data record arrives as a flat JSON object mapping node ids to entities.
//! Entity properties hold arrays of binding cells
//! (`{"type": "literal"|"uri"|"bnode"|"reference", "value": ..., "xml:lang": ...}`).
//! Parsing rewrites property keys and `@type` values from absolute URIs to
//! their compact prefixed form via the merged context, so the validator and
//! the shape graph speak the same vocabulary.

use indexmap::IndexMap;
use serde_json::{json, Value as Json};

use crate::error::VerifyError;
use crate::normalize::DsContext;

/// Reserved key marking the entity where validation starts.
pub const ROOT_ENTITY_KEY: &str = "@RootEntity";

/// A single property value: either a literal or a reference to another node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Literal {
        text: String,
        language: Option<String>,
    },
    Reference {
        target: String,
    },
}

impl Value {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal { text, .. } => Some(text),
            Value::Reference { .. } => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Value::Reference { target } => Some(target),
            Value::Literal { .. } => None,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Value::Literal { language, .. } => language.as_deref(),
            Value::Reference { .. } => None,
        }
    }

    /// Renders the value back into its binding-cell JSON form.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Literal {
                text,
                language: Some(lang),
            } => json!({ "type": "literal", "value": text, "xml:lang": lang }),
            Value::Literal {
                text,
                language: None,
            } => json!({ "type": "literal", "value": text }),
            Value::Reference { target } => {
                let kind = if target.starts_with("_:") { "bnode" } else { "uri" };
                json!({ "type": kind, "value": target })
            }
        }
    }
}

/// One node of the data graph.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    /// Prefixed type names, e.g. `schema:Hotel`.
    pub types: Vec<String>,
    /// Prefixed property name to its value list.
    pub properties: IndexMap<String, Vec<Value>>,
}

/// A flat data graph plus the id of the entity validation starts from.
#[derive(Debug, Clone)]
pub struct DataGraph {
    pub nodes: IndexMap<String, Entity>,
    pub root: String,
}

impl DataGraph {
    /// Parses the flat bindings-style JSON form. Property keys and type
    /// names are compacted through `ctx`; the reserved [`ROOT_ENTITY_KEY`]
    /// selects the root, falling back to the first node.
    pub fn from_json(data: &Json, ctx: &DsContext) -> Result<Self, VerifyError> {
        let map = data.as_object().ok_or_else(|| VerifyError::Internal {
            message: "data graph is not a JSON object".into(),
        })?;

        let mut nodes = IndexMap::new();
        let mut root = None;
        for (id, raw) in map {
            if id == ROOT_ENTITY_KEY {
                root = raw.as_str().map(str::to_owned);
                continue;
            }
            nodes.insert(id.clone(), parse_entity(raw, ctx)?);
        }
        if nodes.is_empty() {
            return Err(VerifyError::Internal {
                message: "data graph contains no entities".into(),
            });
        }
        let root = match root {
            Some(id) if nodes.contains_key(&id) => id,
            // marker absent or dangling: start at the first node
            _ => nodes
                .keys()
                .next()
                .cloned()
                .unwrap_or_default(),
        };
        Ok(DataGraph { nodes, root })
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.nodes.get(id)
    }
}

fn parse_entity(raw: &Json, ctx: &DsContext) -> Result<Entity, VerifyError> {
    let obj = raw.as_object().ok_or_else(|| VerifyError::Internal {
        message: "data graph entity is not a JSON object".into(),
    })?;

    let mut entity = Entity::default();
    for (key, val) in obj {
        if key == ROOT_ENTITY_KEY {
            continue;
        }
        if key == "@type" {
            entity.types = match val {
                Json::Array(items) => items
                    .iter()
                    .filter_map(Json::as_str)
                    .map(|t| ctx.uri_to_indicator(t))
                    .collect(),
                Json::String(t) => vec![ctx.uri_to_indicator(t)],
                _ => Vec::new(),
            };
            continue;
        }
        let cells = match val {
            Json::Array(items) => items.iter().map(parse_value).collect::<Result<_, _>>()?,
            other => vec![parse_value(other)?],
        };
        entity.properties.insert(ctx.uri_to_indicator(key), cells);
    }
    Ok(entity)
}

fn parse_value(cell: &Json) -> Result<Value, VerifyError> {
    match cell {
        Json::Object(obj) => {
            let value = obj
                .get("value")
                .map(json_scalar_to_string)
                .or_else(|| obj.get("@id").and_then(Json::as_str).map(str::to_owned))
                .ok_or_else(|| VerifyError::Internal {
                    message: "property value cell has no 'value'".into(),
                })?;
            match obj.get("type").and_then(Json::as_str) {
                Some("uri") | Some("bnode") | Some("reference") => {
                    Ok(Value::Reference { target: value })
                }
                Some("literal") | None => Ok(Value::Literal {
                    text: value,
                    language: obj
                        .get("xml:lang")
                        .and_then(Json::as_str)
                        .filter(|l| !l.is_empty())
                        .map(str::to_owned),
                }),
                Some(other) => Err(VerifyError::Internal {
                    message: format!("unknown value cell type '{other}'"),
                }),
            }
        }
        Json::String(s) => Ok(Value::Literal {
            text: s.clone(),
            language: None,
        }),
        Json::Number(n) => Ok(Value::Literal {
            text: n.to_string(),
            language: None,
        }),
        Json::Bool(b) => Ok(Value::Literal {
            text: b.to_string(),
            language: None,
        }),
        _ => Err(VerifyError::Internal {
            message: "property value cell has an unsupported JSON type".into(),
        }),
    }
}

fn json_scalar_to_string(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
