//! Routes an [`ExportRequest`] to the encoder of its capability and format.

use std::io::Write;
use std::sync::Arc;

use chrono::Local;
use log::{debug, info};
use mapentity_core::{
    CacheEntry, CacheKey, CacheStore, Column, EntityId, EntityModel, Queryset, Reprojector, Row,
    Settings, SphericalMercator, ViewCapability, ViewSpec,
};
use serde_json::{Map, Value};
use tera::Context;

use crate::document::{DocumentSource, MAP_IMAGE_PATH, ODT_MIMETYPE, TemplateLocator, render_odt};
use crate::{
    CacheStatus, CsvOptions, ExportError, ExportOutcome, ExportRequest, Format, ShapefileLayer,
    list_filename, write_csv, write_detail, write_gpx, write_json_list, write_layer,
    write_shapefile,
};

const PNG_CONTENT_TYPE: &str = "image/png";

/// Serves exports for every registered model.
///
/// The dispatcher is shared across request threads; its only mutable
/// collaborator is the injected [`CacheStore`].
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use mapentity_core::{
///     EntityId, EntityModel, MemoryCacheStore, ModelIdentity, Queryset, Row, Settings,
///     Timestamp, ViewCapability, ViewSpec,
/// };
/// use mapentity_export::{CacheStatus, ExportDispatcher, ExportRequest};
///
/// struct Treks;
///
/// impl EntityModel for Treks {
///     fn identity(&self) -> ModelIdentity {
///         ModelIdentity::new("trek")
///     }
///     fn app_label(&self) -> &str {
///         "trekking"
///     }
///     fn latest_mutation_timestamp(&self) -> Option<Timestamp> {
///         None
///     }
///     fn rows(&self) -> Queryset<'_> {
///         Box::new(std::iter::once(Row::new(EntityId(1)).with_field("name", "Lac")))
///     }
/// }
///
/// let dispatcher = ExportDispatcher::new(Settings::default(), Arc::new(MemoryCacheStore::new()));
/// let view = ViewSpec::new("TrekLayer", ModelIdentity::new("trek"), ViewCapability::Layer);
/// let request = ExportRequest::new(ViewCapability::Layer, Default::default());
/// let mut out = Vec::new();
/// let outcome = dispatcher
///     .export(&Treks, &view, &request, Treks.rows(), &mut out)
///     .unwrap();
/// assert_eq!(outcome.cache, CacheStatus::Bypass);
/// assert!(out.starts_with(br#"{"type":"FeatureCollection""#));
/// ```
pub struct ExportDispatcher {
    settings: Settings,
    cache: Arc<dyn CacheStore>,
    reprojector: Box<dyn Reprojector>,
    templates: Option<TemplateLocator>,
    documents: Option<Arc<dyn DocumentSource>>,
}

impl std::fmt::Debug for ExportDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportDispatcher")
            .field("settings", &self.settings)
            .field("templates", &self.templates)
            .field("documents", &self.documents.is_some())
            .finish_non_exhaustive()
    }
}

impl ExportDispatcher {
    /// A dispatcher caching layers in `cache` and reprojecting with
    /// [`SphericalMercator`].
    #[must_use]
    pub fn new(settings: Settings, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            settings,
            cache,
            reprojector: Box::new(SphericalMercator),
            templates: None,
            documents: None,
        }
    }

    /// Replace the reprojector.
    #[must_use]
    pub fn with_reprojector(mut self, reprojector: impl Reprojector + 'static) -> Self {
        self.reprojector = Box::new(reprojector);
        self
    }

    /// Enable document exports from these templates.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateLocator) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Provider of map images and attribute blocks.
    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Encode `rows` for `view` into `out`.
    ///
    /// `rows` is only consumed when the payload has to be computed: a fresh
    /// cached layer is written without reading a single row.
    ///
    /// # Errors
    /// Client errors ([`ExportError::is_client_error`]) describe a request
    /// the view cannot serve; everything else is an internal failure. On
    /// error, `out` may have received a partial payload except for
    /// shapefile and document exports, which are assembled before being
    /// written.
    pub fn export(
        &self,
        model: &dyn EntityModel,
        view: &ViewSpec,
        request: &ExportRequest,
        rows: Queryset<'_>,
        out: &mut dyn Write,
    ) -> Result<ExportOutcome, ExportError> {
        let capability = request.capability;
        debug!(
            "export {} {capability} format={:?} language={}",
            model.identity(),
            request.format,
            request.language
        );
        match capability {
            ViewCapability::Layer => {
                expect_format(request, &[Format::Json])?;
                let cache = self.export_layer(model, view, request, rows, out)?;
                Ok(outcome(Format::Json.content_type(), None, cache))
            }
            ViewCapability::JsonList => {
                expect_format(request, &[Format::Json])?;
                write_json_list(rows, &columns(view), out)?;
                Ok(outcome(Format::Json.content_type(), None, CacheStatus::Uncached))
            }
            ViewCapability::FormatList => self.export_format_list(model, view, request, rows, out),
            ViewCapability::Detail => {
                expect_format(request, &[Format::Json])?;
                let row = find_row(model, request, rows)?;
                write_detail(&row, &*self.reprojector, self.settings.api_srid, out)?;
                Ok(outcome(Format::Json.content_type(), None, CacheStatus::Uncached))
            }
            ViewCapability::Document => {
                expect_format(request, &[])?;
                let row = find_row(model, request, rows)?;
                self.export_document(model, request, &row, out)?;
                Ok(outcome(
                    ODT_MIMETYPE,
                    Some(format!("{}-{}.odt", model.identity(), row.pk)),
                    CacheStatus::Uncached,
                ))
            }
            ViewCapability::MapImage => {
                expect_format(request, &[])?;
                let row = find_row(model, request, rows)?;
                let png = self.map_image(model, row.pk)?;
                out.write_all(&png)?;
                Ok(outcome(PNG_CONTENT_TYPE, None, CacheStatus::Uncached))
            }
            ViewCapability::List
            | ViewCapability::Create
            | ViewCapability::Update
            | ViewCapability::Delete => Err(ExportError::UnsupportedCapability { capability }),
        }
    }

    fn export_layer(
        &self,
        model: &dyn EntityModel,
        view: &ViewSpec,
        request: &ExportRequest,
        rows: Queryset<'_>,
        out: &mut dyn Write,
    ) -> Result<CacheStatus, ExportError> {
        let Some(freshness) = model.latest_mutation_timestamp() else {
            debug!("{} has no rows; layer cache bypassed", model.identity());
            write_layer(rows, &view.properties, &*self.reprojector, self.settings.api_srid, out)?;
            return Ok(CacheStatus::Bypass);
        };
        let key = CacheKey::new(model.identity(), request.language.clone());
        match self.cache.get(&key) {
            Some(entry) if entry.is_fresh(freshness) => {
                debug!("layer cache hit for {key}");
                out.write_all(&entry.payload)?;
                return Ok(CacheStatus::Hit);
            }
            Some(entry) => debug!(
                "layer cache for {key} is stale ({} < {freshness})",
                entry.freshness
            ),
            None => debug!("layer cache miss for {key}"),
        }
        let mut payload = Vec::new();
        write_layer(
            rows,
            &view.properties,
            &*self.reprojector,
            self.settings.api_srid,
            &mut payload,
        )?;
        out.write_all(&payload)?;
        self.cache.set(key, CacheEntry::new(freshness, payload));
        Ok(CacheStatus::Miss)
    }

    fn export_format_list(
        &self,
        model: &dyn EntityModel,
        view: &ViewSpec,
        request: &ExportRequest,
        rows: Queryset<'_>,
        out: &mut dyn Write,
    ) -> Result<ExportOutcome, ExportError> {
        let format = request.format.unwrap_or(Format::Csv);
        let columns = columns(view);
        match format {
            Format::Csv => write_csv(rows, &columns, CsvOptions::default(), &mut *out)?,
            Format::Shp => {
                let name = model.identity();
                let layer = ShapefileLayer {
                    name: name.as_str(),
                    columns: &columns,
                    srid: self.settings.srid,
                    scratch_dir: &self.settings.temp_dir,
                };
                write_shapefile(rows, layer, &*self.reprojector, out)?;
            }
            Format::Gpx => write_gpx(rows, &model.verbose_name(), &*self.reprojector, &mut *out)?,
            Format::Json => {
                return Err(ExportError::UnsupportedFormat {
                    format: format.to_string(),
                    capability: request.capability,
                });
            }
        }
        let filename = list_filename(&model.verbose_name(), format, &Local::now());
        info!("exported {} list as {filename}", model.identity());
        Ok(outcome(format.content_type(), Some(filename), CacheStatus::Uncached))
    }

    fn map_image(&self, model: &dyn EntityModel, pk: EntityId) -> Result<Vec<u8>, ExportError> {
        self.documents
            .as_ref()
            .and_then(|documents| documents.map_image(&model.identity(), pk))
            .ok_or_else(|| ExportError::DependencyNotReady {
                artefact: "map image",
                model: model.identity(),
                pk,
            })
    }

    fn export_document(
        &self,
        model: &dyn EntityModel,
        request: &ExportRequest,
        row: &Row,
        out: &mut dyn Write,
    ) -> Result<(), ExportError> {
        let identity = model.identity();
        let map_image = self.map_image(model, row.pk)?;
        let attributes = self
            .documents
            .as_ref()
            .and_then(|documents| documents.attributes_html(&identity, row.pk, &request.language))
            .ok_or_else(|| ExportError::DependencyNotReady {
                artefact: "attribute block",
                model: identity.clone(),
                pk: row.pk,
            })?;
        let languages = self.settings.language_priority(&request.language);
        let templates = self
            .templates
            .as_ref()
            .ok_or_else(|| ExportError::TemplateMissing {
                name: format!("{}/{identity}.odt", model.app_label()),
            })?;
        let template = templates.locate(model.app_label(), &identity, &languages)?;
        let bytes = templates.read(&template)?;

        let mut context = Context::new();
        context.insert("object", &document_object(row)?);
        context.insert("pk", &row.pk);
        context.insert("modelname", identity.as_str());
        context.insert("appname", model.app_label());
        context.insert("attributeshtml", &attributes);
        context.insert("datetime", &Local::now().format("%Y-%m-%d %H:%M").to_string());
        context.insert("map_image", MAP_IMAGE_PATH);
        context.insert("title", &self.settings.title);
        render_odt(&bytes, &context, &map_image, out)?;
        info!("rendered {identity} {} with {template}", row.pk);
        Ok(())
    }
}

fn outcome(content_type: &'static str, filename: Option<String>, cache: CacheStatus) -> ExportOutcome {
    ExportOutcome {
        content_type,
        filename,
        cache,
    }
}

fn expect_format(request: &ExportRequest, accepted: &[Format]) -> Result<(), ExportError> {
    match request.format {
        Some(format) if !accepted.contains(&format) => Err(ExportError::UnsupportedFormat {
            format: format.to_string(),
            capability: request.capability,
        }),
        _ => Ok(()),
    }
}

fn columns(view: &ViewSpec) -> Vec<Column> {
    if view.columns.is_empty() {
        vec![Column::new("id")]
    } else {
        view.columns.clone()
    }
}

fn find_row(
    model: &dyn EntityModel,
    request: &ExportRequest,
    mut rows: Queryset<'_>,
) -> Result<Row, ExportError> {
    let pk = request.pk.ok_or(ExportError::MissingPrimaryKey {
        capability: request.capability,
    })?;
    rows.find(|row| row.pk == pk).ok_or_else(|| ExportError::RowNotFound {
        model: model.identity(),
        pk,
    })
}

fn document_object(row: &Row) -> Result<Map<String, Value>, ExportError> {
    let mut object = row
        .fields()
        .map(|(name, value)| Ok((name.to_owned(), serde_json::to_value(value)?)))
        .collect::<Result<Map<_, _>, serde_json::Error>>()?;
    object.insert("pk".to_owned(), Value::from(row.pk.0));
    Ok(object)
}
