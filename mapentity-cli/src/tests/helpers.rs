//! Test helpers writing manifests and datasets to a scratch directory.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

pub(super) const MANIFEST: &str = r#"{
  "installed_apps": ["tourism"],
  "settings": { "languages": ["en", "fr"], "language_code": "en" },
  "models": [
    { "name": "poi", "app_label": "tourism", "verbose_name": "Point of interest" },
    { "name": "trail", "app_label": "tourism", "menu": false, "route_name_prefix": "paths" }
  ],
  "modules": [{
    "name": "tourism.views",
    "views": [
      { "name": "PoiLayer", "model": "poi", "capability": "layer", "properties": ["name"] },
      { "name": "PoiFormat", "model": "poi", "capability": "format_list",
        "columns": [{ "field": "id" }, { "field": "name" }] },
      { "name": "PoiDetail", "model": "poi", "capability": "detail" },
      { "name": "PoiDocument", "model": "poi", "capability": "document" },
      { "name": "TrailLayer", "model": "trail", "capability": "layer" }
    ]
  }]
}"#;

pub(super) const DATASET: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "id": 1,
      "geometry": { "type": "Point", "coordinates": [6.5, 45.25] },
      "properties": { "name": "Lac" } },
    { "type": "Feature",
      "geometry": { "type": "Point", "coordinates": [6.75, 45.5] },
      "properties": { "pk": 7, "name": "Col" } },
    { "type": "Feature", "geometry": null,
      "properties": { "name": "Refuge" } }
  ]
}"#;

/// Scratch directory holding one manifest and one dataset.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let workspace = Self { _dir: dir, root };
        workspace.write("manifest.json", MANIFEST);
        workspace.write("pois.geojson", DATASET);
        workspace
    }

    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn manifest(&self) -> Utf8PathBuf {
        self.root.join("manifest.json")
    }

    pub(super) fn dataset(&self) -> Utf8PathBuf {
        self.root.join("pois.geojson")
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("root", &self.root).finish()
    }
}
