//! In-memory model of one object's linked-data record.
//!
//! A record is a flattened graph: an array of entities connected by typed
//! `{ "@id": ... }` references. [`GraphModel::load`] builds the id and
//! reverse-reference indexes once; the model is read-only afterward, for the
//! duration of one indexing pass.

pub mod entity;
pub mod error;
pub mod model;

pub use entity::{as_array, ref_id, Entity};
pub use error::{GraphError, GraphResult};
pub use model::{GraphModel, Hop, ReverseRef};
