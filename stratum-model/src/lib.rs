//! Entity model for stratum.
//!
//! Defines the in-memory side of a partially loaded entity graph:
//! - [`Attribute`]: a tri-state value slot with optional computed accessors
//! - [`Entity`]: an identified set of attributes, forkable copy-on-write
//! - [`EntityType`]: declares an entity type's attributes, kind, exposure and hooks
//! - [`EntityHooks`]: optional lifecycle callbacks (save, delete, load)
//! - [`Registry`]: type lookup plus an identity map of live instances
//!
//! Serialization to and from the wire [`Record`](stratum_types::Record)
//! shape lives on [`Entity`]. Stores, layers and the lifecycle operations
//! that move records between them are built on top of this crate.

mod attribute;
mod entity;
mod entity_type;
mod error;
mod exposure;
mod hooks;
mod introspection;
mod registry;
mod serialize;
mod value;

pub use attribute::{
    Attribute, AttributeOptions, AttributeOwner, DefaultProvider, GetValueOptions, Getter,
    Presence, Setter,
};
pub use entity::{Entity, EntityRef};
pub use entity_type::{AttributeDefinition, EntityKind, EntityType, EntityTypeBuilder, EntityTypeRef};
pub use error::{ModelError, ModelResult};
pub use exposure::{AttributeExposure, ExposureTable, Operation};
pub use hooks::{EntityHooks, NoHooks};
pub use introspection::{AttributeIntrospection, TypeIntrospection};
pub use registry::{EntityResolver, Registry};
pub use serialize::{DeserializeOptions, SerializeOptions};
pub use value::Value;

pub use stratum_mask::FieldMask;
pub use stratum_types::{EntityId, Record};
