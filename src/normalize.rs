//! Domain Specification normalization.
//!
//! Before validation the DS is brought into a fixed flat form: a merged
//! JSON-LD context (the DS's own context overlaid with the verification
//! prefixes), a flat id-to-node map where nested shape objects are replaced
//! by id references, and array coercion for the shape keys that may carry a
//! single scalar. Full JSON-LD processing is out of scope; the flattener
//! handles exactly the document shapes Domain Specifications use.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::error::VerifyError;

/// Prefixes every verification run knows about, independent of the DS.
const VERIFICATION_PREFIXES: [(&str, &str); 5] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("sh", "http://www.w3.org/ns/shacl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("schema", "http://schema.org/"),
];

/// Shape keys that may carry a single string but are handled as arrays.
const COERCED_KEYS: [&str; 3] = ["sh:property", "sh:class", "sh:targetClass"];

/// The merged prefix context used for compacting and expanding names.
#[derive(Debug, Clone)]
pub struct DsContext {
    prefixes: IndexMap<String, String>,
}

impl DsContext {
    /// The fixed verification prefixes only.
    pub fn verification_context() -> Self {
        let mut prefixes = IndexMap::new();
        for (indicator, uri) in VERIFICATION_PREFIXES {
            prefixes.insert(indicator.to_owned(), uri.to_owned());
        }
        DsContext { prefixes }
    }

    /// The DS's own `@context` string entries overlaid with the fixed
    /// verification prefixes (the fixed ones win on collision).
    pub fn merged(ds_context: Option<&Json>) -> Self {
        let mut prefixes = IndexMap::new();
        if let Some(Json::Object(entries)) = ds_context {
            for (indicator, value) in entries {
                if let Json::String(uri) = value {
                    prefixes.insert(indicator.clone(), uri.clone());
                }
            }
        }
        for (indicator, uri) in VERIFICATION_PREFIXES {
            prefixes.insert(indicator.to_owned(), uri.to_owned());
        }
        DsContext { prefixes }
    }

    /// Compacts an absolute URI to its prefixed form, e.g.
    /// `http://schema.org/name` to `schema:name`. Unknown URIs pass through.
    pub fn uri_to_indicator(&self, uri: &str) -> String {
        for (indicator, prefix_uri) in &self.prefixes {
            if let Some(local) = uri.strip_prefix(prefix_uri.as_str()) {
                if !local.is_empty() {
                    return format!("{indicator}:{local}");
                }
            }
        }
        uri.to_owned()
    }

    /// Expands a prefixed name back to its absolute URI. Strings without a
    /// known prefix pass through.
    pub fn indicator_to_uri(&self, name: &str) -> String {
        for (indicator, prefix_uri) in &self.prefixes {
            if let Some(local) = name.strip_prefix(indicator.as_str()) {
                if let Some(local) = local.strip_prefix(':') {
                    return format!("{prefix_uri}{local}");
                }
            }
        }
        name.to_owned()
    }
}

/// A Domain Specification flattened to an id-to-node map.
#[derive(Debug, Clone)]
pub struct FlatDs {
    pub nodes: IndexMap<String, Map<String, Json>>,
    pub context: DsContext,
}

impl FlatDs {
    /// Flattens a DS document. Accepts both the already-flat `@graph` form
    /// and a single nested root node; anonymous nested nodes get `_:bN` ids.
    pub fn from_document(ds: &Json) -> Result<Self, VerifyError> {
        let doc = ds.as_object().ok_or_else(|| VerifyError::Internal {
            message: "Domain Specification is not a JSON object".into(),
        })?;
        let context = DsContext::merged(doc.get("@context"));

        let mut flattener = Flattener {
            nodes: IndexMap::new(),
            blank_counter: 0,
        };
        match doc.get("@graph") {
            Some(Json::Array(graph)) => {
                for node in graph {
                    let obj = node.as_object().ok_or_else(|| VerifyError::Internal {
                        message: "@graph member is not a JSON object".into(),
                    })?;
                    flattener.flatten_node(obj);
                }
            }
            Some(_) => {
                return Err(VerifyError::Internal {
                    message: "@graph is not an array".into(),
                })
            }
            None => {
                // single nested root node form
                let mut root: Map<String, Json> = doc.clone();
                root.remove("@context");
                flattener.flatten_node(&root);
            }
        }

        let mut nodes = flattener.nodes;
        for node in nodes.values_mut() {
            coerce_shape_arrays(node);
        }
        Ok(FlatDs { nodes, context })
    }

    /// The id of the node typed both `sh:NodeShape` and `schema:CreativeWork`.
    pub fn root_id(&self) -> Option<&str> {
        for (id, node) in &self.nodes {
            if let Some(Json::Array(types)) = node.get("@type") {
                let has = |t: &str| types.iter().any(|v| v.as_str() == Some(t));
                if has("sh:NodeShape") && has("schema:CreativeWork") {
                    return Some(id);
                }
            }
        }
        None
    }

    pub fn node(&self, id: &str) -> Option<&Map<String, Json>> {
        self.nodes.get(id)
    }
}

struct Flattener {
    nodes: IndexMap<String, Map<String, Json>>,
    blank_counter: usize,
}

impl Flattener {
    /// Registers a node and returns its id; nested node objects in its
    /// property values are replaced by their id strings.
    fn flatten_node(&mut self, obj: &Map<String, Json>) -> String {
        let id = match obj.get("@id").and_then(Json::as_str) {
            Some(id) => id.to_owned(),
            None => {
                let id = format!("_:b{}", self.blank_counter);
                self.blank_counter += 1;
                id
            }
        };
        // reserve the slot first so flattening order equals document order
        self.nodes.insert(id.clone(), Map::new());

        let mut flat = Map::new();
        flat.insert("@id".into(), Json::String(id.clone()));
        for (key, value) in obj {
            if key == "@id" {
                continue;
            }
            flat.insert(key.clone(), self.flatten_value(value));
        }
        self.nodes.insert(id.clone(), flat);
        id
    }

    fn flatten_value(&mut self, value: &Json) -> Json {
        match value {
            Json::Array(items) => {
                Json::Array(items.iter().map(|v| self.flatten_value(v)).collect())
            }
            Json::Object(obj) => {
                // a pure reference stays a reference, anything else is a node
                if obj.len() == 1 {
                    if let Some(Json::String(id)) = obj.get("@id") {
                        return Json::String(id.clone());
                    }
                }
                Json::String(self.flatten_node(obj))
            }
            other => other.clone(),
        }
    }
}

fn coerce_shape_arrays(node: &mut Map<String, Json>) {
    for key in COERCED_KEYS {
        if let Some(value) = node.get(key) {
            if value.is_string() {
                let single = value.clone();
                node.insert(key.to_owned(), Json::Array(vec![single]));
            }
        }
    }
}

/// Strips the `schema:` prefix for human-readable messages.
pub fn pretty_print_uri(uri: &str) -> &str {
    uri.strip_prefix("schema:").unwrap_or(uri)
}
