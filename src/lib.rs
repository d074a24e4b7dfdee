//! Cascading inheritance and reduction engine for hierarchical JSON
//! configuration documents.
//!
//! Configuration lives in a tree of documents; a node inherits everything its
//! ancestors define and writes only what it changes. `doc-cascade` implements
//! the two directions of that model plus the schema navigation around it:
//!
//! - **Compile**: fold a root-first ancestor chain into the effective
//!   document a node actually sees ([`compile_chain`]).
//! - **Reduce**: given a fully edited candidate document, compute the minimal
//!   override that reproduces it when merged over the compiled ancestors
//!   ([`reduce`]).
//! - **Schema navigation**: resolve a field path against a JSON-Schema-like
//!   definition index, disambiguating unions, and find the document location
//!   of a named field ([`SchemaIndex`]).
//!
//! The engine is pure: every operation takes borrowed JSON values and returns
//! new ones, never mutating its input.
//!
//! # Round trip
//!
//! ```text
//! compiled  = compile_chain(chain, None)
//! override  = reduce(candidate, compiled)
//! candidate = compile_chain(chain + [override], Some(self))   (modulo noise)
//! ```
//!
//! Reduction keeps identity-keyed record lists (gateways, accounts, routes)
//! minimal while pinning their order, skips literals a `$template` formula in
//! the compiled document already produces, and always writes the keys listed
//! in [`EngineConfig::preserved_keys`].
//!
//! # Quick Start
//!
//! ```
//! use doc_cascade::{compile_chain, reduce, EngineConfig};
//! use serde_json::json;
//!
//! let cfg = EngineConfig::new();
//! let chain = vec![
//!     json!({"currency": "USD", "feed": {"enabled": true}}),
//!     json!({"feed": {"delay": 900}}),
//! ];
//!
//! let compiled = compile_chain(&chain, None, &cfg);
//! assert_eq!(compiled["feed"], json!({"enabled": true, "delay": 900}));
//!
//! // The candidate changes one nested field; the override carries only that.
//! let candidate = json!({
//!     "currency": "USD",
//!     "feed": {"enabled": true, "delay": 1800}
//! });
//! let override_doc = reduce(&candidate, &compiled, &cfg).unwrap();
//! assert_eq!(override_doc, Some(json!({"feed": {"delay": 1800}})));
//! ```

mod align;
mod compile;
mod config;
mod error;
mod path;
mod reduce;
mod schema;
mod template;

// Core operations
pub use compile::compile_chain;
pub use reduce::reduce;

// Record-list reconciliation
pub use align::{align_and_reduce, identity_field, is_identity_keyed, merge_records};

// Schema navigation
pub use schema::{SchemaIndex, SchemaKind, SchemaNode, WILDCARD};

// Template expressions
pub use template::{
    base_value, evaluate, results_equal, template_source, BASE_KEY, TEMPLATE_KEY,
};

// Configuration and addressing
pub use config::EngineConfig;
pub use error::{value_type_name, CascadeError, CascadeResult};
pub use path::{parse_path, FieldPath, Segment};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
