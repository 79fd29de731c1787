//! DS Compliance Verifier
//!
//! Verification of graph-structured data records against Domain
//! Specifications (DS), SHACL-based documents that constrain which types,
//! properties, ranges and value facets a conforming record must carry.
//!
//! A verification takes a data graph (flat JSON-LD-style entity bindings)
//! and a DS document, walks the shape graph starting at the root node shape,
//! and produces a [`VerificationReport`] with a verdict and a flat list of
//! coded error entries.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ds_verify::{SchemaOrgOracle, Verdict, Verifier};
//! use serde_json::json;
//!
//! let vocabulary = json!({
//!     "@graph": [
//!         { "@id": "schema:Hotel", "@type": "rdfs:Class" }
//!     ]
//! });
//! let ds = json!({
//!     "@id": "https://example.com/ds/hotel",
//!     "@type": ["sh:NodeShape", "schema:CreativeWork"],
//!     "schema:schemaVersion": "https://schema.org/version/11.0/",
//!     "sh:targetClass": "schema:Hotel",
//!     "sh:property": [{
//!         "sh:path": "schema:name",
//!         "sh:minCount": 1,
//!         "sh:or": [ { "sh:datatype": "xsd:string" } ]
//!     }]
//! });
//! let data = json!({
//!     "https://example.com/hotel1": {
//!         "@type": ["http://schema.org/Hotel"],
//!         "http://schema.org/name": [
//!             { "type": "literal", "value": "Grand Budapest" }
//!         ]
//!     }
//! });
//!
//! let oracle = SchemaOrgOracle::from_vocabulary(&vocabulary).unwrap();
//! let verifier = Verifier::new(Arc::new(oracle));
//! let report = verifier.verify(&data, &ds);
//! assert_eq!(report.verdict, Verdict::Valid);
//! ```
//!
//! # Error codes
//!
//! | Range | Kind | Meaning |
//! |-------|------|---------|
//! | 101-104 | JsonError | lexical problems with an input document |
//! | 400 | MetaError | defect in the DS itself |
//! | 501-536 | ComplianceError | the data graph violates the DS |
//! | 900 | DataError | dangling entity reference in the data graph |
//! | 999 | ExecutionError | the engine could not complete the run |
//!
//! Reports render in two formats: the DS-native entry list and a
//! SHACL `sh:ValidationReport` (see [`ReportFormat`]).

mod datatype;
mod error;
mod graph;
mod lexical;
mod normalize;
mod path;
mod report;
mod shapes;
mod validate;
mod vocab;

pub use error::VerifyError;
pub use graph::{DataGraph, Entity, Value, ROOT_ENTITY_KEY};
pub use lexical::{lexical_check, lexical_report, parse_input, InputKind};
pub use normalize::{DsContext, FlatDs};
pub use report::{
    ErrorEntry, ErrorKind, ReportFormat, Severity, Verdict, VerificationReport,
};
pub use validate::Verifier;
pub use vocab::{
    global_registry, vocabulary_urls, OracleRegistry, SchemaOrgOracle, VocabularyOracle,
};

#[cfg(feature = "remote")]
pub use vocab::load_vocabulary_url;
