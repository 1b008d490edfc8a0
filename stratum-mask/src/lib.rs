//! Field masks for partially loaded entity graphs.
//!
//! A [`FieldMask`] describes a set of attribute paths. Each path is a
//! sequence of attribute names that either ends at a leaf or continues into
//! a nested entity's own mask. Masks answer two questions for the lifecycle:
//! which attributes a caller needs, and which attributes an entity already
//! holds. Comparing the two lets a load skip data that is already resident.
//!
//! All operations are pure. The algebra satisfies:
//! - **Reflexive containment**: `a.includes(&a)`
//! - **Transitive containment**: `a ⊇ b` and `b ⊇ c` imply `a ⊇ c`
//! - **Merge is an upper bound**: `merge(a, b)` includes both `a` and `b`

mod error;
mod mask;

pub use error::{MaskError, MaskResult};
pub use mask::FieldMask;
