//! Export command: run one export of a GeoJSON dataset.

use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::{debug, info};
use mapentity_core::{
    CacheStore, DiskCacheStore, EntityModel, MemoryCacheStore, ModelIdentity, Settings,
    ViewCapability, ViewSpec,
};
use mapentity_export::{
    DirDocumentSource, ExportDispatcher, ExportError, ExportOutcome, ExportRequest,
    TemplateLocator,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetModel;
use crate::manifest::Manifest;
use crate::{
    ARG_DATASET, ARG_FORMAT, ARG_LANGUAGE, ARG_MANIFEST, ARG_MEDIA_DIR, ARG_MODEL, ARG_OUTPUT,
    ARG_PK, ARG_VIEW, CliError, ENV_EXPORT_DATASET, ENV_EXPORT_MANIFEST, ENV_EXPORT_MODEL,
    require_existing,
};

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load a GeoJSON FeatureCollection as the rows of a model \
                 declared in the manifest and export it through one of the \
                 model's views. Client errors are printed as a structured \
                 JSON response.",
    about = "Export a dataset through a view"
)]
#[ortho_config(prefix = "MAPENTITY")]
pub(crate) struct ExportArgs {
    /// Path to the JSON manifest.
    #[arg(long = ARG_MANIFEST, value_name = "path")]
    #[serde(default)]
    pub(crate) manifest: Option<Utf8PathBuf>,
    /// Model whose view serves the export.
    #[arg(long = ARG_MODEL, value_name = "name")]
    #[serde(default)]
    pub(crate) model: Option<String>,
    /// GeoJSON FeatureCollection holding the model's rows.
    #[arg(long = ARG_DATASET, value_name = "path")]
    #[serde(default)]
    pub(crate) dataset: Option<Utf8PathBuf>,
    /// View capability to export through (defaults to `layer`).
    #[arg(long = ARG_VIEW, value_name = "capability")]
    #[serde(default)]
    pub(crate) view: Option<String>,
    /// Output format (`json`, `csv`, `shp` or `gpx`).
    #[arg(long = ARG_FORMAT, value_name = "format")]
    #[serde(default)]
    pub(crate) format: Option<String>,
    /// Language of labels and cached payloads.
    #[arg(long = ARG_LANGUAGE, value_name = "code")]
    #[serde(default)]
    pub(crate) language: Option<String>,
    /// Primary key of the row for single-row views.
    #[arg(long = ARG_PK, value_name = "id")]
    #[serde(default)]
    pub(crate) pk: Option<u64>,
    /// Write the export to this file instead of stdout.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Directory holding captured map images and attribute blocks.
    #[arg(long = ARG_MEDIA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) media_dir: Option<Utf8PathBuf>,
}

impl ExportArgs {
    fn into_config(self) -> Result<ExportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExportConfig::try_from(merged)
    }
}

/// Resolved `export` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    pub(crate) manifest: Utf8PathBuf,
    pub(crate) model: String,
    pub(crate) dataset: Utf8PathBuf,
    pub(crate) capability: ViewCapability,
    pub(crate) format: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) pk: Option<u64>,
    pub(crate) output: Option<Utf8PathBuf>,
    pub(crate) media_dir: Option<Utf8PathBuf>,
}

impl ExportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.manifest, ARG_MANIFEST)?;
        require_existing(&self.dataset, ARG_DATASET)?;
        Ok(())
    }
}

impl TryFrom<ExportArgs> for ExportConfig {
    type Error = CliError;

    fn try_from(args: ExportArgs) -> Result<Self, Self::Error> {
        let manifest = args.manifest.ok_or(CliError::MissingArgument {
            field: ARG_MANIFEST,
            env: ENV_EXPORT_MANIFEST,
        })?;
        let model = args.model.ok_or(CliError::MissingArgument {
            field: ARG_MODEL,
            env: ENV_EXPORT_MODEL,
        })?;
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_DATASET,
            env: ENV_EXPORT_DATASET,
        })?;
        let capability = args
            .view
            .as_deref()
            .map_or(Ok(ViewCapability::Layer), str::parse)
            .map_err(CliError::UnknownCapability)?;
        Ok(Self {
            manifest,
            model,
            dataset,
            capability,
            format: args.format,
            language: args.language,
            pk: args.pk,
            output: args.output,
            media_dir: args.media_dir,
        })
    }
}

fn cache_store(settings: &Settings) -> Result<Arc<dyn CacheStore>, CliError> {
    let Some(dir) = &settings.cache_dir else {
        return Ok(Arc::new(MemoryCacheStore::new()));
    };
    let store = DiskCacheStore::open(dir).map_err(|source| CliError::OpenCache {
        path: dir.clone(),
        source,
    })?;
    Ok(Arc::new(store))
}

pub(crate) fn build_dispatcher(
    settings: &Settings,
    media_dir: Option<&Utf8Path>,
) -> Result<ExportDispatcher, CliError> {
    let located = TemplateLocator::open(&settings.template_dir)
        .inspect_err(|err| {
            debug!(
                "document templates unavailable at {}: {err}",
                settings.template_dir
            );
        })
        .ok();
    let mut dispatcher = ExportDispatcher::new(settings.clone(), cache_store(settings)?);
    if let Some(templates) = located {
        dispatcher = dispatcher.with_templates(templates);
    }
    if let Some(dir) = media_dir {
        dispatcher = dispatcher.with_documents(Arc::new(DirDocumentSource::open(dir)?));
    }
    Ok(dispatcher)
}

pub(crate) fn run_export(args: ExportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    run_export_with(&config, writer)
}

pub(crate) fn run_export_with(
    config: &ExportConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let manifest = Manifest::load(&config.manifest)?;
    let entry = manifest.model(&config.model)?;
    let registry = manifest.registry()?;
    let view = registry
        .view(&ModelIdentity::new(&config.model), config.capability)
        .ok_or_else(|| CliError::UnknownView {
            model: config.model.clone(),
            capability: config.capability,
        })?;
    let model = DatasetModel::load(entry, &config.dataset, manifest.settings.srid)?;
    let dispatcher = build_dispatcher(&manifest.settings, config.media_dir.as_deref())?;

    let result = ExportRequest::parse(
        config.capability,
        config.format.as_deref(),
        config.language.as_deref(),
        config.pk,
        dispatcher.settings(),
    )
    .and_then(|request| {
        config.output.as_deref().map_or_else(
            || dispatcher.export(&model, view, &request, model.rows(), &mut *writer),
            |path| export_to_file(&dispatcher, &model, view, &request, path),
        )
    });

    match result {
        Ok(outcome) => {
            info!(
                "exported {} as {} ({:?} cache)",
                config.model, outcome.content_type, outcome.cache
            );
            Ok(())
        }
        Err(err) if err.is_client_error() => {
            let payload = serde_json::to_string_pretty(&err.to_response())
                .map_err(CliError::SerialiseOutput)?;
            writer
                .write_all(payload.as_bytes())
                .and_then(|()| writer.write_all(b"\n"))
                .map_err(CliError::WriteOutput)?;
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn export_to_file(
    dispatcher: &ExportDispatcher,
    model: &DatasetModel,
    view: &ViewSpec,
    request: &ExportRequest,
    path: &Utf8Path,
) -> Result<ExportOutcome, ExportError> {
    let mut out = BufWriter::new(mapentity_fs::PendingFile::create(path)?);
    let outcome = dispatcher.export(model, view, request, model.rows(), &mut out)?;
    out.into_inner()
        .map_err(io::IntoInnerError::into_error)?
        .commit()?;
    Ok(outcome)
}
