//! Explicit view declarations.
//!
//! Feature modules declare their views at startup by adding [`ViewSpec`]
//! values to a named [`ViewModule`]; the registry later looks the module up
//! in a [`ViewCatalog`] instead of scanning code at runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ModelIdentity, ViewCapability};

/// A declared list column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Row field the column reads.
    pub field: String,
    /// Header text; the field name is used when absent.
    #[serde(default)]
    pub label: Option<String>,
}

impl Column {
    /// A column headed by its field name.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            label: None,
        }
    }

    /// A column with an explicit header.
    pub fn labelled(field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            label: Some(label.into()),
        }
    }

    /// Text written in the header row.
    #[must_use]
    pub fn header(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.field)
    }
}

impl From<&str> for Column {
    fn from(field: &str) -> Self {
        Self::new(field)
    }
}

/// One view implementation bound to a model.
///
/// # Examples
/// ```
/// use mapentity_core::{ModelIdentity, ViewCapability, ViewSpec};
///
/// let layer = ViewSpec::new("TrekLayer", ModelIdentity::new("trek"), ViewCapability::Layer)
///     .with_properties(["name", "color_index"]);
/// assert_eq!(layer.properties, vec!["name", "color_index"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSpec {
    /// Name of the view, used in diagnostics.
    pub name: String,
    /// Model the view serves.
    pub model: ModelIdentity,
    /// Operation the view implements.
    pub capability: ViewCapability,
    /// Declared property subset for map layers.
    #[serde(default)]
    pub properties: Vec<String>,
    /// Declared columns for lists and exports.
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl ViewSpec {
    /// Declare a view.
    pub fn new(name: impl Into<String>, model: ModelIdentity, capability: ViewCapability) -> Self {
        Self {
            name: name.into(),
            model,
            capability,
            properties: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Set the layer property subset.
    #[must_use]
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Set the list columns.
    #[must_use]
    pub fn with_columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Views declared by one feature module (e.g. `trekking.views`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewModule {
    name: String,
    views: Vec<ViewSpec>,
}

impl ViewModule {
    /// An empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: Vec::new(),
        }
    }

    /// Add a view declaration.
    #[must_use]
    pub fn with_view(mut self, view: ViewSpec) -> Self {
        self.views.push(view);
        self
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Views declared for `model`, in declaration order.
    pub fn views_for<'a>(&'a self, model: &'a ModelIdentity) -> impl Iterator<Item = &'a ViewSpec> {
        self.views.iter().filter(move |view| &view.model == model)
    }
}

/// All collaborator view modules known at startup.
#[derive(Debug, Clone, Default)]
pub struct ViewCatalog {
    modules: HashMap<String, ViewModule>,
}

impl ViewCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, replacing one with the same name.
    #[must_use]
    pub fn with_module(mut self, module: ViewModule) -> Self {
        self.insert(module);
        self
    }

    /// Add a module in place.
    pub fn insert(&mut self, module: ViewModule) {
        self.modules.insert(module.name.clone(), module);
    }

    /// Look a module up by name.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ViewModule> {
        self.modules.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn module_filters_views_by_model() {
        let trek = ModelIdentity::new("trek");
        let poi = ModelIdentity::new("poi");
        let module = ViewModule::new("trekking.views")
            .with_view(ViewSpec::new("TrekLayer", trek.clone(), ViewCapability::Layer))
            .with_view(ViewSpec::new("PoiLayer", poi, ViewCapability::Layer))
            .with_view(ViewSpec::new("TrekDetail", trek.clone(), ViewCapability::Detail));
        let names: Vec<_> = module.views_for(&trek).map(|view| view.name.as_str()).collect();
        assert_eq!(names, ["TrekLayer", "TrekDetail"]);
    }

    #[rstest]
    fn column_header_defaults_to_field() {
        assert_eq!(Column::new("name").header(), "name");
        assert_eq!(Column::labelled("name", "Nom").header(), "Nom");
    }
}
