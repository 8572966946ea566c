//! Facade crate for MapEntity.
//!
//! This crate re-exports the entity registry from `mapentity-core` and the
//! export dispatcher from `mapentity-export`. The disk layer cache and the
//! in-memory test doubles sit behind feature flags.

#![forbid(unsafe_code)]

pub use mapentity_core::{
    CacheEntry, CacheKey, CacheStore, Column, ConfigurationError, EntityDescriptor, EntityId,
    EntityModel, FieldValue, HttpMethod, Language, MemoryCacheStore, ModelIdentity, Queryset,
    Registry, RegistryBuilder, RouteEntry, RouteTable, Row, Settings, Timestamp, ViewCapability,
    ViewCatalog, ViewModule, ViewSpec,
};
pub use mapentity_export::{
    CacheStatus, DirDocumentSource, DocumentSource, ErrorResponse, ExportDispatcher, ExportError,
    ExportOutcome, ExportRequest, Format, MemoryDocumentSource, TemplateLocator,
};

#[cfg(feature = "disk-cache")]
pub use mapentity_core::{CacheError, DiskCacheStore};

#[cfg(feature = "test-support")]
pub use mapentity_core::test_support;
