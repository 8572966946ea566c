//! Behaviour-driven step definitions driving the CLI scenarios.

use super::helpers::Workspace;
use super::*;
use crate::export::{ExportConfig, run_export_with};
use crate::routes::{RoutesConfig, run_routes_with};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Scenario state: the scratch workspace, captured stdout and the outcome.
#[derive(Debug)]
struct CliWorld {
    workspace: Workspace,
    output: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl CliWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            output: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn source_flags(&self) -> Vec<String> {
        vec![
            format!("--{ARG_MANIFEST}"),
            self.workspace.manifest().into_string(),
            format!("--{ARG_DATASET}"),
            self.workspace.dataset().into_string(),
        ]
    }

    fn invoke(&self, flags: Vec<String>) {
        let mut invocation = vec!["mapentity".to_owned()];
        invocation.extend(flags);
        let mut output = self.output.borrow_mut();
        let outcome = Cli::try_parse_from(invocation)
            .map_err(CliError::ArgumentParsing)
            .and_then(|cli| match cli.command {
                Command::Export(args) => {
                    ExportConfig::try_from(args).and_then(|config| {
                        config.validate_sources()?;
                        run_export_with(&config, &mut *output)
                    })
                }
                Command::Routes(args) => RoutesConfig::try_from(args)
                    .and_then(|config| run_routes_with(&config, &mut *output)),
            });
        self.result.replace(Some(outcome));
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.output.borrow()).into_owned()
    }
}

#[fixture]
fn world() -> CliWorld {
    CliWorld::new()
}

#[given("a manifest and a dataset of points of interest")]
fn sources_exist(#[from(world)] world: &CliWorld) {
    assert!(world.workspace.manifest().is_file());
    assert!(world.workspace.dataset().is_file());
}

const OUTPUT_FILE: &str = "poi.odt";
const PREVIOUS_EXPORT: &str = "previous export";

#[given("an output file holding a previous export")]
fn previous_output(#[from(world)] world: &CliWorld) {
    world.workspace.write(OUTPUT_FILE, PREVIOUS_EXPORT);
}

#[when("I run the export command with view {view:word} and format {format:word}")]
fn export_with_format(#[from(world)] world: &CliWorld, view: String, format: String) {
    let mut flags = vec!["export".to_owned(), format!("--{ARG_MODEL}"), "poi".to_owned()];
    flags.extend(world.source_flags());
    flags.extend([
        format!("--{ARG_VIEW}"),
        view.trim_matches('"').to_owned(),
        format!("--{ARG_FORMAT}"),
        format.trim_matches('"').to_owned(),
    ]);
    world.invoke(flags);
}

#[when("I run the export command with view {view:word}")]
fn export_with_view(#[from(world)] world: &CliWorld, view: String) {
    let mut flags = vec!["export".to_owned(), format!("--{ARG_MODEL}"), "poi".to_owned()];
    flags.extend(world.source_flags());
    flags.extend([format!("--{ARG_VIEW}"), view.trim_matches('"').to_owned()]);
    world.invoke(flags);
}

#[when("I run the export command with the default view")]
fn export_default(#[from(world)] world: &CliWorld) {
    let mut flags = vec!["export".to_owned(), format!("--{ARG_MODEL}"), "poi".to_owned()];
    flags.extend(world.source_flags());
    world.invoke(flags);
}

#[when("I run the export command without a model")]
fn export_without_model(#[from(world)] world: &CliWorld) {
    let mut flags = vec!["export".to_owned()];
    flags.extend(world.source_flags());
    world.invoke(flags);
}

#[when("I export the document of poi {pk} into the output file")]
fn export_document_to_file(#[from(world)] world: &CliWorld, pk: u64) {
    let mut flags = vec!["export".to_owned(), format!("--{ARG_MODEL}"), "poi".to_owned()];
    flags.extend(world.source_flags());
    flags.extend([
        format!("--{ARG_VIEW}"),
        "document".to_owned(),
        format!("--{ARG_PK}"),
        pk.to_string(),
        format!("--{ARG_OUTPUT}"),
        world.workspace.root().join(OUTPUT_FILE).into_string(),
    ]);
    world.invoke(flags);
}

#[when("I run the routes command")]
fn routes_command(#[from(world)] world: &CliWorld) {
    world.invoke(vec![
        "routes".to_owned(),
        format!("--{ARG_MANIFEST}"),
        world.workspace.manifest().into_string(),
    ]);
}

#[then("the command succeeds")]
fn command_succeeds(#[from(world)] world: &CliWorld) {
    let result = world.result.borrow();
    let outcome = result.as_ref().expect("command ran");
    assert!(outcome.is_ok(), "unexpected failure {outcome:?}");
}

#[then("the output has {count} lines")]
fn output_lines(#[from(world)] world: &CliWorld, count: usize) {
    assert_eq!(world.text().lines().count(), count);
}

#[then("the output is a feature collection")]
fn feature_collection(#[from(world)] world: &CliWorld) {
    let layer: serde_json::Value = serde_json::from_str(&world.text()).expect("geojson output");
    assert_eq!(
        layer.get("type").and_then(serde_json::Value::as_str),
        Some("FeatureCollection")
    );
}

#[then("the CLI reports that the model flag is missing")]
fn reports_missing_model(#[from(world)] world: &CliWorld) {
    let result = world.result.borrow();
    let error = result
        .as_ref()
        .expect("command ran")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_MODEL),
        other => panic!("unexpected error {other:?}"),
    }
}

#[then("the command fails with {code:word}")]
fn fails_with(#[from(world)] world: &CliWorld, code: String) {
    let result = world.result.borrow();
    let error = result
        .as_ref()
        .expect("command ran")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::Export(err) => assert_eq!(err.code(), code.trim_matches('"')),
        other => panic!("unexpected error {other:?}"),
    }
    let response: serde_json::Value =
        serde_json::from_str(&world.text()).expect("structured response");
    assert_eq!(
        response.get("code").and_then(serde_json::Value::as_str),
        Some(code.trim_matches('"'))
    );
}

#[then("the output file still holds the previous export")]
fn output_file_unchanged(#[from(world)] world: &CliWorld) {
    let root = world.workspace.root();
    let kept = std::fs::read_to_string(root.join(OUTPUT_FILE)).expect("previous output");
    assert_eq!(kept, PREVIOUS_EXPORT);
    let leftovers: Vec<_> = std::fs::read_dir(root)
        .expect("workspace listing")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temporary files left behind: {leftovers:?}");
}

#[then("the routes describe {count} entities")]
fn routes_describe(#[from(world)] world: &CliWorld, count: usize) {
    let report: serde_json::Value = serde_json::from_str(&world.text()).expect("json output");
    assert_eq!(report.as_array().map(Vec::len), Some(count));
}

#[scenario(path = "tests/features/export_command.feature", index = 0)]
fn csv_through_flags(#[from(world)] world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/export_command.feature", index = 1)]
fn layer_by_default(#[from(world)] world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/export_command.feature", index = 2)]
fn missing_model(#[from(world)] world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/export_command.feature", index = 3)]
fn structured_client_errors(#[from(world)] world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/export_command.feature", index = 4)]
fn listing_routes(#[from(world)] world: CliWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/export_command.feature", index = 5)]
fn failed_export_keeps_output(#[from(world)] world: CliWorld) {
    let _ = world;
}
