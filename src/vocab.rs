//! Vocabulary knowledge for the verification engine.
//!
//! Class hierarchy questions (subclass relations, known classes, known
//! enumerations) are answered by a [`VocabularyOracle`]. The standard
//! implementation is built from schema.org vocabulary JSON-LD documents;
//! oracles are shared process-wide through an [`OracleRegistry`] keyed by
//! the exact vocabulary URL set, so concurrent verifications with the same
//! vocabularies initialize the hierarchy exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;

use crate::error::VerifyError;
use crate::normalize::FlatDs;

/// Answers class-hierarchy questions during validation.
pub trait VocabularyOracle: Send + Sync {
    /// Whether `superclass` is a transitive superclass of `class`.
    fn is_superclass(&self, superclass: &str, class: &str) -> bool;
    /// Whether `name` is a known non-enumeration class.
    fn is_valid_class(&self, name: &str) -> bool;
    /// Whether `name` is a known enumeration.
    fn is_valid_enumeration(&self, name: &str) -> bool;
}

/// Oracle built from schema.org release dumps (`all-layers.jsonld`) and
/// external vocabularies of the same shape.
pub struct SchemaOrgOracle {
    /// Class name to its transitive superclass set.
    superclasses: HashMap<String, HashSet<String>>,
    enumerations: HashSet<String>,
}

impl SchemaOrgOracle {
    pub fn from_vocabulary(doc: &Json) -> Result<Self, VerifyError> {
        Self::from_vocabularies(std::slice::from_ref(doc))
    }

    /// Merges one or more vocabulary documents and computes the transitive
    /// `rdfs:subClassOf` closure.
    pub fn from_vocabularies(docs: &[Json]) -> Result<Self, VerifyError> {
        let mut direct: HashMap<String, HashSet<String>> = HashMap::new();
        for doc in docs {
            let graph = doc
                .get("@graph")
                .and_then(Json::as_array)
                .ok_or_else(|| VerifyError::InvalidVocabulary {
                    message: "vocabulary document has no @graph array".into(),
                })?;
            for node in graph {
                let Some(id) = node.get("@id").and_then(Json::as_str) else {
                    continue;
                };
                if !has_type(node, "rdfs:Class") {
                    continue;
                }
                let id = compact_schema_id(id);
                let parents = direct.entry(id).or_default();
                for parent in subclass_targets(node.get("rdfs:subClassOf")) {
                    parents.insert(parent);
                }
            }
        }
        if direct.is_empty() {
            return Err(VerifyError::InvalidVocabulary {
                message: "vocabulary documents define no classes".into(),
            });
        }

        // transitive closure, one DFS per class
        let mut superclasses = HashMap::with_capacity(direct.len());
        for class in direct.keys() {
            let mut closure = HashSet::new();
            let mut stack: Vec<&String> = direct[class].iter().collect();
            while let Some(parent) = stack.pop() {
                if closure.insert(parent.clone()) {
                    if let Some(grandparents) = direct.get(parent) {
                        stack.extend(grandparents);
                    }
                }
            }
            superclasses.insert(class.clone(), closure);
        }

        let enumerations = superclasses
            .iter()
            .filter(|(name, closure)| {
                *name == "schema:Enumeration" || closure.contains("schema:Enumeration")
            })
            .map(|(name, _)| name.clone())
            .collect();

        Ok(SchemaOrgOracle {
            superclasses,
            enumerations,
        })
    }
}

impl VocabularyOracle for SchemaOrgOracle {
    fn is_superclass(&self, superclass: &str, class: &str) -> bool {
        self.superclasses
            .get(class)
            .is_some_and(|closure| closure.contains(superclass))
    }

    fn is_valid_class(&self, name: &str) -> bool {
        self.superclasses.contains_key(name) && !self.enumerations.contains(name)
    }

    fn is_valid_enumeration(&self, name: &str) -> bool {
        self.enumerations.contains(name)
    }
}

fn has_type(node: &Json, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Json::String(t)) => t == wanted,
        Some(Json::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn subclass_targets(value: Option<&Json>) -> Vec<String> {
    let mut targets = Vec::new();
    let mut push = |v: &Json| {
        let id = match v {
            Json::String(s) => Some(s.as_str()),
            Json::Object(obj) => obj.get("@id").and_then(Json::as_str),
            _ => None,
        };
        if let Some(id) = id {
            targets.push(compact_schema_id(id));
        }
    };
    match value {
        Some(Json::Array(items)) => items.iter().for_each(&mut push),
        Some(single) => push(single),
        None => {}
    }
    targets
}

/// Vocabulary dumps mix `schema:X`, `http://schema.org/X` and
/// `https://schema.org/X` spellings; the oracle stores the compact form.
fn compact_schema_id(id: &str) -> String {
    for prefix in ["http://schema.org/", "https://schema.org/"] {
        if let Some(local) = id.strip_prefix(prefix) {
            return format!("schema:{local}");
        }
    }
    id.to_owned()
}

enum Slot {
    Pending,
    Ready(Arc<dyn VocabularyOracle>),
}

/// Process-wide oracle sharing with exactly-once initialization per
/// vocabulary URL set. Concurrent requesters for a key that is being
/// initialized block until it is ready; a failed initialization clears the
/// slot so a later caller can retry.
pub struct OracleRegistry {
    inner: Mutex<HashMap<Vec<String>, Slot>>,
    ready: Condvar,
}

impl OracleRegistry {
    pub fn new() -> Self {
        OracleRegistry {
            inner: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
        }
    }

    pub fn get_or_init<F>(
        &self,
        vocab_urls: &[String],
        init: F,
    ) -> Result<Arc<dyn VocabularyOracle>, VerifyError>
    where
        F: FnOnce() -> Result<Arc<dyn VocabularyOracle>, VerifyError>,
    {
        let key = registry_key(vocab_urls);
        let mut slots = self.lock()?;
        loop {
            match slots.get(&key) {
                Some(Slot::Ready(oracle)) => return Ok(Arc::clone(oracle)),
                Some(Slot::Pending) => {
                    slots = self
                        .ready
                        .wait(slots)
                        .map_err(|_| poisoned_registry())?;
                }
                None => {
                    slots.insert(key.clone(), Slot::Pending);
                    break;
                }
            }
        }
        drop(slots);

        let result = init();
        let mut slots = self.lock()?;
        match &result {
            Ok(oracle) => {
                slots.insert(key, Slot::Ready(Arc::clone(oracle)));
            }
            Err(_) => {
                slots.remove(&key);
            }
        }
        drop(slots);
        self.ready.notify_all();
        result
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Vec<String>, Slot>>, VerifyError> {
        self.inner.lock().map_err(|_| poisoned_registry())
    }
}

impl Default for OracleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned_registry() -> VerifyError {
    VerifyError::OracleInit {
        message: "oracle registry lock poisoned".into(),
    }
}

/// The key is order-insensitive: the same URL set always maps to the same
/// oracle.
fn registry_key(vocab_urls: &[String]) -> Vec<String> {
    let mut key: Vec<String> = vocab_urls.to_vec();
    key.sort();
    key.dedup();
    key
}

static GLOBAL_REGISTRY: Lazy<OracleRegistry> = Lazy::new(OracleRegistry::new);

/// The shared process-wide registry.
pub fn global_registry() -> &'static OracleRegistry {
    &GLOBAL_REGISTRY
}

static SDO_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"schema\.org/version/([0-9.]+)/").unwrap_or_else(|_| unreachable!())
});

/// The vocabularies a DS needs: its `ds:usedVocabularies` plus the
/// schema.org release dump derived from `schema:schemaVersion`.
pub fn vocabulary_urls(ds: &FlatDs) -> Result<Vec<String>, VerifyError> {
    let root = ds
        .root_id()
        .and_then(|id| ds.node(id))
        .ok_or_else(|| VerifyError::Internal {
            message: "Domain Specification has no root node".into(),
        })?;

    let mut urls = Vec::new();
    if let Some(Json::Array(used)) = root.get("ds:usedVocabularies") {
        for entry in used {
            if let Some(url) = entry.as_str() {
                urls.push(url.to_owned());
            }
        }
    }
    if let Some(version_url) = root.get("schema:schemaVersion").and_then(Json::as_str) {
        let version = SDO_VERSION_RE
            .captures(version_url)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| VerifyError::Internal {
                message: format!("cannot extract schema.org version from '{version_url}'"),
            })?;
        urls.push(format!(
            "https://raw.githubusercontent.com/schemaorg/schemaorg/main/data/releases/{}/all-layers.jsonld",
            version.as_str()
        ));
    }
    Ok(urls)
}

/// Fetches a vocabulary JSON-LD document over HTTP.
#[cfg(feature = "remote")]
pub fn load_vocabulary_url(url: &str) -> Result<Json, VerifyError> {
    let response = reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| VerifyError::NetworkError {
            url: url.to_owned(),
            source,
        })?;
    response.json().map_err(|source| VerifyError::NetworkError {
        url: url.to_owned(),
        source,
    })
}


#[cfg(all(test, feature = "remote"))]
mod remote_tests {
    use super::*;

    #[test]
    fn fetches_vocabulary_documents() {
        let mut server = mockito::Server::new();
        let body = serde_json::to_string(&testutil::hotel_vocabulary()).unwrap();
        let mock = server
            .mock("GET", "/vocab.jsonld")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();

        let url = format!("{}/vocab.jsonld", server.url());
        let doc = load_vocabulary_url(&url).unwrap();
        assert!(doc.get("@graph").is_some());
        mock.assert();
    }

    #[test]
    fn http_errors_surface_as_network_errors() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/missing.jsonld")
            .with_status(404)
            .create();

        let url = format!("{}/missing.jsonld", server.url());
        let err = load_vocabulary_url(&url).unwrap_err();
        assert!(matches!(err, VerifyError::NetworkError { .. }));
        mock.assert();
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::hotel_vocabulary;
    use super::*;
    use serde_json::json;

    #[test]
    fn transitive_superclasses() {
        let oracle = SchemaOrgOracle::from_vocabulary(&hotel_vocabulary()).unwrap();
        assert!(oracle.is_superclass("schema:LodgingBusiness", "schema:Hotel"));
        assert!(oracle.is_superclass("schema:Thing", "schema:Hotel"));
        assert!(oracle.is_superclass("schema:Organization", "schema:Hotel"));
        assert!(!oracle.is_superclass("schema:Hotel", "schema:LodgingBusiness"));
        assert!(!oracle.is_superclass("schema:Hotel", "schema:Hotel"));
    }

    #[test]
    fn classes_and_enumerations_are_distinct() {
        let oracle = SchemaOrgOracle::from_vocabulary(&hotel_vocabulary()).unwrap();
        assert!(oracle.is_valid_class("schema:Hotel"));
        assert!(!oracle.is_valid_class("schema:DayOfWeek"));
        assert!(oracle.is_valid_enumeration("schema:DayOfWeek"));
        assert!(!oracle.is_valid_enumeration("schema:Hotel"));
        // properties are not classes
        assert!(!oracle.is_valid_class("schema:name"));
        assert!(!oracle.is_valid_class("schema:Nonsense"));
    }

    #[test]
    fn registry_initializes_once_per_key() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let registry = OracleRegistry::new();
        let calls = AtomicUsize::new(0);
        let urls = vec!["https://a".to_owned(), "https://b".to_owned()];
        let make = || -> Result<Arc<dyn VocabularyOracle>, VerifyError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(
                SchemaOrgOracle::from_vocabulary(&hotel_vocabulary()).unwrap(),
            ))
        };

        registry.get_or_init(&urls, make).unwrap();
        // same set in a different order hits the cached oracle
        let reordered = vec!["https://b".to_owned(), "https://a".to_owned()];
        registry.get_or_init(&reordered, make).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_clears_slot_on_failure() {
        let registry = OracleRegistry::new();
        let urls = vec!["https://a".to_owned()];
        let failed = registry.get_or_init(&urls, || {
            Err(VerifyError::OracleInit {
                message: "boom".into(),
            })
        });
        assert!(failed.is_err());

        // the key is free again
        let ok = registry.get_or_init(&urls, || {
            Ok(Arc::new(
                SchemaOrgOracle::from_vocabulary(&hotel_vocabulary()).unwrap(),
            ) as Arc<dyn VocabularyOracle>)
        });
        assert!(ok.is_ok());
    }

    #[test]
    fn vocabulary_urls_from_ds() {
        let ds = json!({
            "@graph": [{
                "@id": "ds1",
                "@type": ["sh:NodeShape", "schema:CreativeWork"],
                "ds:usedVocabularies": ["https://example.com/vocab.jsonld"],
                "schema:schemaVersion": "https://schema.org/version/11.0/"
            }]
        });
        let flat = FlatDs::from_document(&ds).unwrap();
        let urls = vocabulary_urls(&flat).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://example.com/vocab.jsonld".to_owned(),
                "https://raw.githubusercontent.com/schemaorg/schemaorg/main/data/releases/11.0/all-layers.jsonld".to_owned(),
            ]
        );
    }
}
