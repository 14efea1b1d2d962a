//! Pairtree identifier-to-path encoding.
//!
//! Maps an opaque object identifier onto a sequence of short directory
//! names so that any identifier (including ones containing characters
//! that are unsafe on common filesystems) lands in a stable, collision-free
//! location under a storage root.
//!
//! The encoding is one-directional: no inverse is guaranteed or required.

pub mod encode;

pub use encode::{encode, to_path};
