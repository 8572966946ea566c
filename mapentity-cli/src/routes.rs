//! Routes command: list the routes a manifest mounts.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use mapentity_core::{EntityDescriptor, HttpMethod, Registry, ViewCapability};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;
use crate::{ARG_MANIFEST, CliError, ENV_ROUTES_MANIFEST, require_existing};

/// CLI arguments for the `routes` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Register every model declared in a JSON manifest and print \
                 the entity descriptors with their routes, in registration \
                 order.",
    about = "Print the routes of a manifest"
)]
#[ortho_config(prefix = "MAPENTITY")]
pub(crate) struct RoutesArgs {
    /// Path to the JSON manifest.
    #[arg(long = ARG_MANIFEST, value_name = "path")]
    #[serde(default)]
    pub(crate) manifest: Option<Utf8PathBuf>,
}

impl RoutesArgs {
    fn into_config(self) -> Result<RoutesConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RoutesConfig::try_from(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutesConfig {
    pub(crate) manifest: Utf8PathBuf,
}

impl TryFrom<RoutesArgs> for RoutesConfig {
    type Error = CliError;

    fn try_from(args: RoutesArgs) -> Result<Self, Self::Error> {
        let manifest = args.manifest.ok_or(CliError::MissingArgument {
            field: ARG_MANIFEST,
            env: ENV_ROUTES_MANIFEST,
        })?;
        Ok(Self { manifest })
    }
}

#[derive(Debug, Serialize)]
struct EntityReport<'a> {
    #[serde(flatten)]
    descriptor: &'a EntityDescriptor,
    routes: Vec<RouteReport<'a>>,
}

#[derive(Debug, Serialize)]
struct RouteReport<'a> {
    name: &'a str,
    pattern: &'a str,
    capability: ViewCapability,
    methods: &'static [HttpMethod],
    view: &'a str,
}

fn report(registry: &Registry) -> Vec<EntityReport<'_>> {
    registry
        .entities()
        .map(|descriptor| EntityReport {
            descriptor,
            routes: registry
                .routes(&descriptor.identity)
                .into_iter()
                .flatten()
                .map(|route| RouteReport {
                    name: &route.route_name,
                    pattern: &route.url_pattern,
                    capability: route.capability,
                    methods: route.methods,
                    view: &route.view.name,
                })
                .collect(),
        })
        .collect()
}

pub(crate) fn run_routes(args: RoutesArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_routes_with(&config, writer)
}

pub(crate) fn run_routes_with(config: &RoutesConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    require_existing(&config.manifest, ARG_MANIFEST)?;
    let registry = Manifest::load(&config.manifest)?.registry()?;
    let payload =
        serde_json::to_string_pretty(&report(&registry)).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
