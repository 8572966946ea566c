//! Core entity types for MapEntity.
//!
//! Domain models plug in through [`EntityModel`]; their views are declared
//! explicitly in a [`ViewCatalog`] and registered once at startup with a
//! [`RegistryBuilder`]. The resulting [`Registry`] is read-only. Layer
//! payloads derived from models are kept in a [`CacheStore`] and checked
//! against the model's latest mutation on every read.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod capability;
pub mod error;
pub mod geometry;
pub mod model;
pub mod registry;
pub mod routes;
pub mod row;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;
pub mod view;

#[cfg(feature = "disk-cache")]
pub use cache::{CacheError, DiskCacheStore};
pub use cache::{CacheEntry, CacheKey, CacheStore, MemoryCacheStore};
pub use capability::{HttpMethod, ViewCapability};
pub use error::ConfigurationError;
pub use geometry::{
    GeometryKind, ReprojectError, Reprojector, SpatialGeometry, SphericalMercator, Srid,
};
pub use model::{EntityModel, Language, ModelIdentity, Queryset, Timestamp};
pub use registry::{EntityDescriptor, Registry, RegistryBuilder};
pub use routes::{RouteEntry, RouteTable, build_route_table, route_name};
pub use row::{EntityId, FieldValue, Row};
pub use settings::Settings;
pub use view::{Column, ViewCatalog, ViewModule, ViewSpec};
