#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural coverage for list and document exports.

use std::cell::RefCell;
use std::sync::Arc;

use geo::{Geometry, LineString, Point};
use mapentity_core::test_support::{CountingCache, MemoryModel};
use mapentity_core::{
    EntityId, EntityModel, ModelIdentity, Row, Settings, SpatialGeometry, Srid, ViewCapability,
    ViewSpec,
};
use mapentity_export::{ExportDispatcher, ExportError, ExportRequest};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Shared state of one export scenario.
#[derive(Default)]
struct ExportWorld {
    model: RefCell<Option<MemoryModel>>,
    output: RefCell<Vec<u8>>,
    error: RefCell<Option<ExportError>>,
}

#[fixture]
fn world() -> ExportWorld {
    ExportWorld::default()
}

fn point(pk: u64, name: &str, kind: &str) -> Row {
    Row::new(EntityId(pk))
        .with_field("name", name)
        .with_field("type", kind)
        .with_geometry(SpatialGeometry::new(
            Geometry::Point(Point::new(6.25, 45.5)),
            Srid::WGS84,
        ))
}

fn prepare(world: &ExportWorld, rows: Vec<Row>) {
    world.model.replace(Some(
        MemoryModel::new("poi", "trekking")
            .with_verbose_name("Point of interest")
            .with_rows(rows),
    ));
}

fn run(world: &ExportWorld, capability: ViewCapability, format: Option<&str>, pk: Option<u64>) {
    let borrowed = world.model.borrow();
    let model = borrowed.as_ref().expect("model should be prepared");
    let settings = Settings::default();
    let view = ViewSpec::new("PoiExport", ModelIdentity::new("poi"), capability)
        .with_columns(["id", "name", "type"]);
    let dispatcher = ExportDispatcher::new(settings.clone(), Arc::new(CountingCache::new()));
    let result = ExportRequest::parse(capability, format, None, pk, &settings).and_then(|request| {
        dispatcher.export(
            model,
            &view,
            &request,
            model.rows(),
            &mut *world.output.borrow_mut(),
        )
    });
    if let Err(err) = result {
        world.error.replace(Some(err));
    }
}

#[given("three points of interest")]
fn three_points(world: &ExportWorld) {
    prepare(
        world,
        vec![
            point(1, "Lac Blanc", "lake"),
            point(2, "Col du Lautaret", "pass"),
            point(3, "Refuge", "hut"),
        ],
    );
}

#[given("a point of interest and one without geometry")]
fn point_and_null(world: &ExportWorld) {
    prepare(
        world,
        vec![
            point(1, "Lac Blanc", "lake"),
            Row::new(EntityId(2)).with_field("name", "Unplaced"),
        ],
    );
}

#[given("a point of interest and a trail segment")]
fn point_and_line(world: &ExportWorld) {
    prepare(
        world,
        vec![
            point(1, "Lac Blanc", "lake"),
            Row::new(EntityId(2))
                .with_field("name", "Sentier")
                .with_geometry(SpatialGeometry::new(
                    Geometry::LineString(LineString::from(vec![(6.0, 45.0), (6.5, 45.5)])),
                    Srid::WGS84,
                )),
        ],
    );
}

#[when("the list is exported as {format:word}")]
fn list_exported(world: &ExportWorld, format: String) {
    run(
        world,
        ViewCapability::FormatList,
        Some(format.trim_matches('"')),
        None,
    );
}

#[when("the document of point {pk} is requested")]
fn document_requested(world: &ExportWorld, pk: u64) {
    run(world, ViewCapability::Document, None, Some(pk));
}

#[then("the export has {count} lines")]
fn line_count(world: &ExportWorld, count: usize) {
    assert!(world.error.borrow().is_none());
    let output = world.output.borrow();
    assert_eq!(String::from_utf8_lossy(&output).lines().count(), count);
}

#[then("the header lists id, name and type")]
fn header(world: &ExportWorld) {
    let output = world.output.borrow();
    let text = String::from_utf8_lossy(&output);
    assert_eq!(text.lines().next(), Some("id,name,type"));
}

#[then("the export holds {count} waypoint")]
fn waypoints(world: &ExportWorld, count: usize) {
    assert!(world.error.borrow().is_none());
    let output = world.output.borrow();
    let text = String::from_utf8_lossy(&output);
    assert_eq!(text.matches("<wpt ").count(), count);
    assert_eq!(text.matches("<trk>").count(), 0);
}

#[then("the export fails with {code:word}")]
fn fails_with(world: &ExportWorld, code: String) {
    let error = world.error.borrow();
    let err = error.as_ref().expect("the export should fail");
    assert_eq!(err.code(), code.trim_matches('"'));
    assert!(err.is_client_error());
}

#[then("nothing was written")]
fn nothing_written(world: &ExportWorld) {
    assert!(world.output.borrow().is_empty());
}

#[scenario(path = "tests/features/formats.feature", index = 0)]
fn csv_lines(world: ExportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/formats.feature", index = 1)]
fn gpx_skips_null_geometries(world: ExportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/formats.feature", index = 2)]
fn shapefile_mixed_types(world: ExportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/formats.feature", index = 3)]
fn unknown_format(world: ExportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/formats.feature", index = 4)]
fn document_before_map_image(world: ExportWorld) {
    let _ = world;
}
