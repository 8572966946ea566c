//! Error types emitted by the MapEntity CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mapentity_core::{CacheError, ConfigurationError, ViewCapability};
use mapentity_export::ExportError;
use thiserror::Error;

/// Errors emitted by the MapEntity CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Command-line flag name.
        field: &'static str,
        /// Environment variable name.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Command-line flag name.
        field: &'static str,
        /// Path given.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Command-line flag name.
        field: &'static str,
        /// Path given.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Command-line flag name.
        field: &'static str,
        /// Path given.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The `--view` value names no capability.
    #[error("{0}")]
    UnknownCapability(String),
    /// Opening an input file failed.
    #[error("failed to open {path:?}: {source}")]
    OpenInput {
        /// File being opened.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The manifest JSON could not be decoded.
    #[error("failed to parse manifest JSON at {path:?}: {source}")]
    ParseManifest {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The dataset is not a GeoJSON feature collection.
    #[error("failed to parse GeoJSON dataset at {path:?}: {source}")]
    ParseDataset {
        /// Dataset path.
        path: Utf8PathBuf,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A dataset feature cannot become a row.
    #[error("feature {index} of {path:?} is invalid: {reason}")]
    InvalidFeature {
        /// Dataset path.
        path: Utf8PathBuf,
        /// Position of the feature in the collection.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },
    /// Registering the manifest's models failed.
    #[error("invalid manifest: {0}")]
    Registry(#[from] ConfigurationError),
    /// The manifest does not declare the requested model.
    #[error("model `{model}` is not declared in the manifest")]
    UnknownModel {
        /// Requested model.
        model: String,
    },
    /// The model has no view for the requested capability.
    #[error("model `{model}` has no {capability} view")]
    UnknownView {
        /// Requested model.
        model: String,
        /// Requested capability.
        capability: ViewCapability,
    },
    /// Opening the disk layer cache failed.
    #[error("failed to open the layer cache at {path:?}: {source}")]
    OpenCache {
        /// Cache directory.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: CacheError,
    },
    /// The export itself failed.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    /// Creating the output file failed.
    #[error("failed to create output {path:?}: {source}")]
    CreateOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// Serialising a report failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
