//! Entity lifecycle and graph population for stratum.
//!
//! A [`Layer`] owns a registry of entity types and decides, per call and
//! per type, where each lifecycle operation is served:
//!
//! - by the [`Store`](stratum_storage::Store) bound to the type, or
//! - by the parent layer, through the [`RemoteLayer`] contract.
//!
//! Layers chain: a `Layer` implements `RemoteLayer` itself, enforcing each
//! type's exposure table on the calls it serves.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stratum_layer::{Layer, LayerConfig, LoadOptions};
//! use stratum_model::{AttributeOptions, EntityType, FieldMask};
//! use stratum_storage::MemoryStore;
//!
//! # async fn example() -> stratum_layer::LayerResult<()> {
//! let layer = Layer::new(LayerConfig::named("backend"));
//! layer.register(
//!     EntityType::document("Movie")
//!         .attribute("title", AttributeOptions::new())
//!         .build()?,
//! )?;
//! layer.bind_store("Movie", Arc::new(MemoryStore::new("memory")))?;
//!
//! let movie = layer.create("Movie")?;
//! movie.set("title", "Inception")?;
//! layer.save(&[movie.clone()], &Default::default()).await?;
//!
//! let options = LoadOptions::fields(FieldMask::from_paths(["title"]).unwrap());
//! let found = layer.get_one("Movie", movie.id().as_str(), &options).await?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod layer;
mod lifecycle;
mod population;
mod remote;
mod serve;

pub use config::{LayerConfig, PopulationConfig};
pub use error::{LayerError, LayerResult};
pub use layer::Layer;
pub use lifecycle::{FindOptions, LoadOptions};
pub use remote::RemoteLayer;

pub use stratum_types::{DeleteRequest, SaveRequest};
