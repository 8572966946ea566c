//! JSON manifest declaring installed applications, models and views.

use std::io::BufReader;

use camino::Utf8Path;
use mapentity_core::{
    ModelIdentity, Registry, RegistryBuilder, Settings, ViewCatalog, ViewModule, ViewSpec,
};
use mapentity_fs::open_utf8_file;
use serde::Deserialize;

use crate::CliError;
use crate::dataset::DatasetModel;

/// Startup declaration of a MapEntity deployment.
///
/// ```json
/// {
///   "installed_apps": ["trekking"],
///   "settings": { "languages": ["fr", "en"] },
///   "models": [{ "name": "trek", "app_label": "trekking" }],
///   "modules": [{
///     "name": "trekking.views",
///     "views": [{ "name": "TrekLayer", "model": "trek", "capability": "layer" }]
///   }]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Manifest {
    pub(crate) installed_apps: Vec<String>,
    #[serde(default)]
    pub(crate) settings: Settings,
    #[serde(default)]
    pub(crate) models: Vec<ModelEntry>,
    #[serde(default)]
    pub(crate) modules: Vec<ModuleEntry>,
}

/// One model to register, in menu order.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelEntry {
    pub(crate) name: String,
    pub(crate) app_label: String,
    #[serde(default)]
    pub(crate) verbose_name: Option<String>,
    #[serde(default)]
    pub(crate) verbose_name_plural: Option<String>,
    #[serde(default = "default_menu")]
    pub(crate) menu: bool,
    #[serde(default)]
    pub(crate) route_name_prefix: Option<String>,
}

/// A collaborator views module and its declarations.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModuleEntry {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) views: Vec<ViewSpec>,
}

const fn default_menu() -> bool {
    true
}

impl Manifest {
    /// Loads a JSON manifest from disk.
    pub(crate) fn load(path: &Utf8Path) -> Result<Self, CliError> {
        let file = open_utf8_file(path).map_err(|source| CliError::OpenInput {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseManifest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn catalog(&self) -> ViewCatalog {
        self.modules
            .iter()
            .fold(ViewCatalog::new(), |catalog, entry| {
                catalog.with_module(
                    entry
                        .views
                        .iter()
                        .cloned()
                        .fold(ViewModule::new(&entry.name), ViewModule::with_view),
                )
            })
    }

    pub(crate) fn model(&self, name: &str) -> Result<&ModelEntry, CliError> {
        let wanted = ModelIdentity::new(name);
        self.models
            .iter()
            .find(|entry| ModelIdentity::new(&entry.name) == wanted)
            .ok_or_else(|| CliError::UnknownModel {
                model: name.to_owned(),
            })
    }

    /// Registers every declared model, failing on the first configuration
    /// error.
    pub(crate) fn registry(&self) -> Result<Registry, CliError> {
        let mut builder = RegistryBuilder::new(self.installed_apps.iter().cloned(), self.catalog());
        for entry in &self.models {
            let model = DatasetModel::empty(entry);
            builder.register(&model, entry.route_name_prefix.as_deref(), entry.menu)?;
        }
        Ok(builder.finish())
    }
}
