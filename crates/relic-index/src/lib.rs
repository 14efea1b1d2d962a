//! The graph indexing engine.
//!
//! Compiles a declarative field-mapping configuration into typed rules
//! ([`rules::CompiledRules`]), then walks an object's linked-data graph to
//! produce one flat search document per admitted entity
//! ([`indexer::index`]). Transitively referenced entities are discovered
//! through a worklist fixpoint, so everything reachable from the root gets
//! indexed exactly once per type.

pub mod config;
pub mod error;
pub mod indexer;
pub mod licenses;
pub mod rules;

pub use config::{
    FacetSpec, FieldConfig, FieldRule, FilterSpec, MappingConfig, ResolveSpec, Transform,
    TypeConfig, ValidateSpec,
};
pub use error::{IndexError, IndexResult};
pub use indexer::{index, Document, FileResolver, IndexOutput};
pub use licenses::LicenseMap;
pub use rules::{CompiledRules, FacetField};
