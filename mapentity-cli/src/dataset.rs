//! GeoJSON datasets loaded as in-memory models.

use std::io::BufReader;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use geojson::{Feature, FeatureCollection, feature::Id};
use log::debug;
use mapentity_core::{
    EntityId, EntityModel, FieldValue, ModelIdentity, Queryset, Row, SpatialGeometry, Srid,
    Timestamp,
};
use mapentity_fs::open_utf8_file;

use crate::CliError;
use crate::manifest::ModelEntry;

/// Model backed by rows read once from a dataset file.
#[derive(Debug, Clone)]
pub(crate) struct DatasetModel {
    identity: ModelIdentity,
    app_label: String,
    verbose_name: Option<String>,
    verbose_name_plural: Option<String>,
    rows: Vec<Row>,
    latest: Option<Timestamp>,
}

impl DatasetModel {
    /// A model without rows, enough for registration.
    pub(crate) fn empty(entry: &ModelEntry) -> Self {
        Self {
            identity: ModelIdentity::new(&entry.name),
            app_label: entry.app_label.clone(),
            verbose_name: entry.verbose_name.clone(),
            verbose_name_plural: entry.verbose_name_plural.clone(),
            rows: Vec::new(),
            latest: None,
        }
    }

    /// Load the rows of a GeoJSON `FeatureCollection`.
    ///
    /// Geometries are taken to be in `srid`. The file's modification time
    /// stands in for the latest mutation, so a rewritten dataset invalidates
    /// cached layers.
    pub(crate) fn load(entry: &ModelEntry, path: &Utf8Path, srid: Srid) -> Result<Self, CliError> {
        let open_error = |source| CliError::OpenInput {
            path: path.to_path_buf(),
            source,
        };
        let file = open_utf8_file(path).map_err(open_error)?;
        let modified = file
            .metadata()
            .and_then(|meta| meta.modified())
            .map_err(open_error)?
            .into_std();
        let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| CliError::ParseDataset {
                path: path.to_path_buf(),
                source,
            })?;
        let rows = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| feature_row(feature, index, srid, path))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("loaded {} rows from {path}", rows.len());
        let latest = (!rows.is_empty()).then(|| DateTime::<Utc>::from(modified));
        Ok(Self {
            rows,
            latest,
            ..Self::empty(entry)
        })
    }
}

fn feature_pk(feature: &Feature, index: usize) -> Option<u64> {
    match &feature.id {
        Some(Id::Number(number)) => number.as_u64(),
        Some(Id::String(text)) => text.parse().ok(),
        None => feature
            .properties
            .as_ref()
            .and_then(|properties| properties.get("id").or_else(|| properties.get("pk")))
            .and_then(serde_json::Value::as_u64)
            .or_else(|| u64::try_from(index).ok().map(|position| position + 1)),
    }
}

fn feature_row(
    feature: Feature,
    index: usize,
    srid: Srid,
    path: &Utf8Path,
) -> Result<Row, CliError> {
    let invalid = |reason: String| CliError::InvalidFeature {
        path: path.to_path_buf(),
        index,
        reason,
    };
    let pk = feature_pk(&feature, index)
        .ok_or_else(|| invalid("identifier is not a non-negative integer".to_owned()))?;
    let mut row = Row::new(EntityId(pk));
    for (name, value) in feature.properties.iter().flatten() {
        row.set_field(name.as_str(), FieldValue::from_json(value));
    }
    let Some(geometry) = feature.geometry else {
        return Ok(row);
    };
    let shape =
        geo::Geometry::<f64>::try_from(geometry).map_err(|err| invalid(err.to_string()))?;
    Ok(row.with_geometry(SpatialGeometry::new(shape, srid)))
}

impl EntityModel for DatasetModel {
    fn identity(&self) -> ModelIdentity {
        self.identity.clone()
    }

    fn app_label(&self) -> &str {
        &self.app_label
    }

    fn verbose_name(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.identity.to_string())
    }

    fn verbose_name_plural(&self) -> String {
        self.verbose_name_plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.verbose_name()))
    }

    fn latest_mutation_timestamp(&self) -> Option<Timestamp> {
        self.latest
    }

    fn rows(&self) -> Queryset<'_> {
        Box::new(self.rows.iter().cloned())
    }
}
