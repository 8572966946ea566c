//! Command-line interface exercising MapEntity registration and exports.
//!
//! `mapentity routes` prints the routes a manifest mounts; `mapentity
//! export` runs one export of a GeoJSON dataset through the dispatcher.
#![forbid(unsafe_code)]

use camino::Utf8Path;
use clap::{Parser, Subcommand};

mod dataset;
mod error;
mod export;
mod manifest;
mod routes;

pub use error::CliError;

use export::ExportArgs;
use routes::RoutesArgs;

pub(crate) const ARG_MANIFEST: &str = "manifest";
pub(crate) const ARG_MODEL: &str = "model";
pub(crate) const ARG_DATASET: &str = "dataset";
pub(crate) const ARG_VIEW: &str = "view";
pub(crate) const ARG_FORMAT: &str = "format";
pub(crate) const ARG_LANGUAGE: &str = "language";
pub(crate) const ARG_PK: &str = "pk";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_MEDIA_DIR: &str = "media-dir";
pub(crate) const ENV_ROUTES_MANIFEST: &str = "MAPENTITY_CMDS_ROUTES_MANIFEST";
pub(crate) const ENV_EXPORT_MANIFEST: &str = "MAPENTITY_CMDS_EXPORT_MANIFEST";
pub(crate) const ENV_EXPORT_MODEL: &str = "MAPENTITY_CMDS_EXPORT_MODEL";
pub(crate) const ENV_EXPORT_DATASET: &str = "MAPENTITY_CMDS_EXPORT_DATASET";

/// Run the MapEntity CLI with the current process arguments and environment.
///
/// # Errors
/// Returns a [`CliError`] describing the first failure; client errors of
/// an export are also printed to stdout as a structured response.
pub fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            err.print().map_err(CliError::WriteOutput)?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Routes(args) => routes::run_routes(args, &mut stdout),
        Command::Export(args) => export::run_export(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mapentity",
    about = "Inspect entity routes and run exports from a manifest",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the routes every declared entity mounts.
    Routes(RoutesArgs),
    /// Export a GeoJSON dataset through one of its model's views.
    Export(ExportArgs),
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match mapentity_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
