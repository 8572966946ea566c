//! The contract every domain model fulfils to be managed as an entity.
//!
//! Domain crates (treks, points of interest, land edges, ...) are external
//! collaborators. The core only needs a stable identity, the time of the
//! latest mutation and a lazily evaluated queryset of [`Row`] values.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntityId, Row};

/// Mutation time reported by models and stored alongside cached payloads.
pub type Timestamp = DateTime<Utc>;

/// Lazily evaluated rows of one model.
///
/// Exporters pull rows one by one so peak memory stays bounded by the size
/// of a single row rather than the whole queryset.
pub type Queryset<'a> = Box<dyn Iterator<Item = Row> + Send + 'a>;

/// Stable, process-unique name of a domain entity type (e.g. `trek`).
///
/// Identities are normalised to lowercase so that `Trek` and `trek` name
/// the same model.
///
/// # Examples
/// ```
/// use mapentity_core::ModelIdentity;
///
/// let trek = ModelIdentity::new("Trek");
/// assert_eq!(trek.as_str(), "trek");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelIdentity(String);

impl ModelIdentity {
    /// Build an identity from a model name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_lowercase())
    }

    /// Borrow the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Language code selecting translated labels (e.g. `en`, `fr`).
///
/// # Examples
/// ```
/// use mapentity_core::Language;
///
/// let french = Language::new("FR");
/// assert_eq!(french.as_str(), "fr");
/// assert_eq!(french.suffix(), "_fr");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    /// Build a language from its code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    /// Borrow the language code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Suffix appended to per-language resource names, e.g. `_en`.
    #[must_use]
    pub fn suffix(&self) -> String {
        format!("_{}", self.0)
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::new("en")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A domain model the entity layer can expose.
///
/// Implementations must be cheap to query concurrently: the registry and
/// the export dispatcher share them across request threads.
///
/// # Examples
/// ```
/// use mapentity_core::{EntityId, EntityModel, ModelIdentity, Queryset, Row, Timestamp};
///
/// struct Treks {
///     rows: Vec<Row>,
/// }
///
/// impl EntityModel for Treks {
///     fn identity(&self) -> ModelIdentity {
///         ModelIdentity::new("trek")
///     }
///
///     fn app_label(&self) -> &str {
///         "trekking"
///     }
///
///     fn latest_mutation_timestamp(&self) -> Option<Timestamp> {
///         None
///     }
///
///     fn rows(&self) -> Queryset<'_> {
///         Box::new(self.rows.iter().cloned())
///     }
/// }
///
/// let treks = Treks { rows: vec![Row::new(EntityId(1))] };
/// assert_eq!(treks.views_module(), "trekking.views");
/// assert_eq!(treks.verbose_name_plural(), "treks");
/// assert!(treks.get(EntityId(1)).is_some());
/// ```
pub trait EntityModel: Send + Sync {
    /// Identity used as the registry and cache key.
    fn identity(&self) -> ModelIdentity;

    /// Label of the feature module (application) owning the model.
    fn app_label(&self) -> &str;

    /// Human readable singular name.
    fn verbose_name(&self) -> String {
        self.identity().to_string()
    }

    /// Human readable plural name, used by menus.
    fn verbose_name_plural(&self) -> String {
        format!("{}s", self.verbose_name())
    }

    /// Name of the collaborator module declaring this model's views.
    fn views_module(&self) -> String {
        format!("{}.views", self.app_label())
    }

    /// Time of the most recent mutation, or `None` when no rows exist.
    fn latest_mutation_timestamp(&self) -> Option<Timestamp>;

    /// All rows of the model.
    fn rows(&self) -> Queryset<'_>;

    /// A single row by primary key.
    fn get(&self, pk: EntityId) -> Option<Row> {
        self.rows().find(|row| row.pk == pk)
    }
}
