//! Process-wide table of managed entities.
//!
//! A [`RegistryBuilder`] collects registrations during startup. Calling
//! [`RegistryBuilder::finish`] freezes it into a [`Registry`] that is only
//! read afterwards, either passed around by reference or installed once in
//! the process-wide slot with [`Registry::install`].

use std::collections::BTreeSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;

use crate::{
    ConfigurationError, EntityModel, ModelIdentity, RouteEntry, RouteTable, ViewCapability,
    ViewCatalog, ViewSpec, build_route_table, route_name,
};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Immutable metadata of one registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    /// Model identity.
    pub identity: ModelIdentity,
    /// Feature module owning the model.
    pub app_label: String,
    /// Namespace prefixed to every route name.
    pub namespace: String,
    /// Singular label.
    pub label: String,
    /// Plural label shown in menus.
    pub plural_label: String,
    /// Default icon.
    pub icon: String,
    /// 16 pixel icon.
    pub icon_small: String,
    /// 96 pixel icon.
    pub icon_big: String,
    /// Whether the entity appears in navigation menus.
    pub menu: bool,
    /// Route name of the list page.
    pub list_route_name: String,
}

impl EntityDescriptor {
    fn describe(model: &dyn EntityModel, namespace: &str, menu: bool) -> Self {
        let identity = model.identity();
        Self {
            app_label: model.app_label().to_owned(),
            namespace: namespace.to_owned(),
            label: model.verbose_name(),
            plural_label: model.verbose_name_plural(),
            icon: format!("images/{identity}.png"),
            icon_small: format!("images/{identity}-16.png"),
            icon_big: format!("images/{identity}-96.png"),
            menu,
            list_route_name: route_name(namespace, &identity, ViewCapability::List),
            identity,
        }
    }
}

#[derive(Debug, Clone)]
struct Registration {
    descriptor: EntityDescriptor,
    routes: RouteTable,
}

/// Collects registrations until the registry is frozen.
///
/// # Examples
/// ```
/// use mapentity_core::{
///     EntityModel, ModelIdentity, RegistryBuilder, ViewCapability, ViewCatalog, ViewModule,
///     ViewSpec,
/// };
/// # use mapentity_core::{Queryset, Timestamp};
/// # struct Treks;
/// # impl EntityModel for Treks {
/// #     fn identity(&self) -> ModelIdentity { ModelIdentity::new("trek") }
/// #     fn app_label(&self) -> &str { "trekking" }
/// #     fn latest_mutation_timestamp(&self) -> Option<Timestamp> { None }
/// #     fn rows(&self) -> Queryset<'_> { Box::new(std::iter::empty()) }
/// # }
///
/// let trek = ModelIdentity::new("trek");
/// let catalog = ViewCatalog::new().with_module(
///     ViewModule::new("trekking.views")
///         .with_view(ViewSpec::new("TrekList", trek.clone(), ViewCapability::List)),
/// );
/// let mut builder = RegistryBuilder::new(["trekking"], catalog);
/// let routes = builder.register(&Treks, None, true).unwrap();
/// assert_eq!(routes.len(), 1);
/// assert!(builder.register(&Treks, None, true).unwrap().is_empty());
/// assert_eq!(builder.finish().entities().count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    installed_apps: BTreeSet<String>,
    catalog: ViewCatalog,
    entries: IndexMap<ModelIdentity, Registration>,
}

impl RegistryBuilder {
    /// Start a registry for the given installed feature modules.
    pub fn new<I, S>(installed_apps: I, catalog: ViewCatalog) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            installed_apps: installed_apps.into_iter().map(Into::into).collect(),
            catalog,
            entries: IndexMap::new(),
        }
    }

    /// Register `model` and return the routes to mount.
    ///
    /// The namespace is `route_name_prefix` when given, otherwise the
    /// model's application label. Registering a model twice, or a model
    /// whose application is not installed, has no effect and returns an
    /// empty table.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MissingViewsModule`] when the catalog
    /// has no module named after [`EntityModel::views_module`], and
    /// [`ConfigurationError::DuplicateCapability`] when two views claim the
    /// same capability.
    pub fn register(
        &mut self,
        model: &dyn EntityModel,
        route_name_prefix: Option<&str>,
        menu: bool,
    ) -> Result<RouteTable, ConfigurationError> {
        let identity = model.identity();
        if !self.installed_apps.contains(model.app_label()) {
            debug!(
                "skipping {identity}: application {} is not installed",
                model.app_label()
            );
            return Ok(RouteTable::empty());
        }
        if self.entries.contains_key(&identity) {
            debug!("{identity} is already registered");
            return Ok(RouteTable::empty());
        }

        let module_name = model.views_module();
        let module = self.catalog.module(&module_name).ok_or_else(|| {
            ConfigurationError::MissingViewsModule {
                model: identity.clone(),
                module: module_name.clone(),
            }
        })?;
        let namespace = route_name_prefix.unwrap_or_else(|| model.app_label());
        let routes = build_route_table(namespace, &identity, module.views_for(&identity))?;
        let descriptor = EntityDescriptor::describe(model, namespace, menu);

        info!(
            "registered {identity} under `{namespace}` with {} routes",
            routes.len()
        );
        self.entries.insert(
            identity,
            Registration {
                descriptor,
                routes: routes.clone(),
            },
        );
        Ok(routes)
    }

    /// Freeze the registrations.
    #[must_use]
    pub fn finish(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

/// Read-only registry of entity descriptors and their routes.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: IndexMap<ModelIdentity, Registration>,
}

impl Registry {
    /// Descriptors in registration order.
    ///
    /// The iterator is cheap to clone, and each call starts over.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> + Clone {
        self.entries.values().map(|entry| &entry.descriptor)
    }

    /// Descriptors flagged for menus, in registration order.
    pub fn menu_entities(&self) -> impl Iterator<Item = &EntityDescriptor> + Clone {
        self.entities().filter(|descriptor| descriptor.menu)
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor of `model`.
    #[must_use]
    pub fn descriptor(&self, model: &ModelIdentity) -> Option<&EntityDescriptor> {
        self.entries.get(model).map(|entry| &entry.descriptor)
    }

    /// Route table of `model`.
    #[must_use]
    pub fn routes(&self, model: &ModelIdentity) -> Option<&RouteTable> {
        self.entries.get(model).map(|entry| &entry.routes)
    }

    /// Any route by its name.
    #[must_use]
    pub fn route(&self, route_name: &str) -> Option<&RouteEntry> {
        self.entries
            .values()
            .find_map(|entry| entry.routes.get(route_name))
    }

    /// View serving `capability` for `model`.
    #[must_use]
    pub fn view(&self, model: &ModelIdentity, capability: ViewCapability) -> Option<&ViewSpec> {
        self.routes(model)
            .and_then(|routes| routes.by_capability(capability))
            .map(|entry| &entry.view)
    }

    /// Store the registry in the process-wide slot.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::AlreadyInitialised`] when a registry
    /// was installed before.
    pub fn install(self) -> Result<&'static Self, ConfigurationError> {
        let count = self.len();
        if GLOBAL.set(self).is_err() {
            return Err(ConfigurationError::AlreadyInitialised);
        }
        info!("entity registry initialised with {count} entities");
        GLOBAL.get().ok_or(ConfigurationError::AlreadyInitialised)
    }

    /// The installed registry, if any.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get()
    }
}
