#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural coverage for the freshness-checked layer cache.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use geo::{Geometry, Point};
use mapentity_core::test_support::{CountingCache, MemoryModel};
use mapentity_core::{
    EntityId, EntityModel, Language, ModelIdentity, Row, Settings, SpatialGeometry, Srid,
    Timestamp, ViewCapability, ViewSpec,
};
use mapentity_export::{CacheStatus, ExportDispatcher, ExportRequest};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Shared state of one caching scenario.
struct CacheWorld {
    cache: Arc<CountingCache>,
    dispatcher: ExportDispatcher,
    model: RefCell<Option<MemoryModel>>,
    exports: RefCell<Vec<(CacheStatus, Vec<u8>)>>,
}

impl Default for CacheWorld {
    fn default() -> Self {
        let cache = Arc::new(CountingCache::new());
        let dispatcher = ExportDispatcher::new(Settings::default(), cache.clone());
        Self {
            cache,
            dispatcher,
            model: RefCell::new(None),
            exports: RefCell::new(Vec::new()),
        }
    }
}

#[fixture]
fn world() -> CacheWorld {
    CacheWorld::default()
}

fn at_hour(hour: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn trek(pk: u64, name: &str) -> Row {
    Row::new(EntityId(pk))
        .with_field("name", name)
        .with_geometry(SpatialGeometry::new(
            Geometry::Point(Point::new(6.5, 45.25)),
            Srid::WGS84,
        ))
}

fn export(world: &CacheWorld, request: &ExportRequest) -> (CacheStatus, Vec<u8>) {
    let borrowed = world.model.borrow();
    let model = borrowed.as_ref().expect("model should be prepared");
    let view = ViewSpec::new("TrekLayer", ModelIdentity::new("trek"), ViewCapability::Layer)
        .with_properties(["name"]);
    let mut out = Vec::new();
    let outcome = world
        .dispatcher
        .export(model, &view, request, model.rows(), &mut out)
        .expect("layer export should succeed");
    (outcome.cache, out)
}

#[given("a trek model with {count} rows last changed at hour {hour}")]
fn treks_changed_at(world: &CacheWorld, count: u64, hour: u32) {
    let names = ["Blanc", "Vert", "Bleu", "Rouge"];
    let rows = (1..=count).zip(names.iter().cycle()).map(|(pk, name)| trek(pk, name));
    world.model.replace(Some(
        MemoryModel::new("trek", "trekking")
            .with_rows(rows)
            .with_latest(at_hour(hour)),
    ));
}

#[given("a trek model without rows")]
fn empty_treks(world: &CacheWorld) {
    world
        .model
        .replace(Some(MemoryModel::new("trek", "trekking")));
}

#[when("the layer is exported in {language:word}")]
fn layer_exported(world: &CacheWorld, language: String) {
    let request = ExportRequest::new(ViewCapability::Layer, Language::new(language.trim_matches('"')));
    let result = export(world, &request);
    world.exports.borrow_mut().push(result);
}

#[when("trek {pk} is renamed {name:word} at hour {hour}")]
fn trek_renamed(world: &CacheWorld, pk: u64, name: String, hour: u32) {
    let borrowed = world.model.borrow();
    let model = borrowed.as_ref().expect("model should be prepared");
    model.upsert(trek(pk, name.trim_matches('"')), at_hour(hour));
}

#[then("the exports are byte-identical")]
fn byte_identical(world: &CacheWorld) {
    let exports = world.exports.borrow();
    let (first, second) = (exports.first(), exports.get(1));
    assert_eq!(
        first.map(|(_, bytes)| bytes),
        second.map(|(_, bytes)| bytes)
    );
}

#[then("the rows were read {count} times")]
fn rows_read(world: &CacheWorld, count: usize) {
    let borrowed = world.model.borrow();
    let model = borrowed.as_ref().expect("model should be prepared");
    assert_eq!(model.rows_read(), count);
}

#[then("the second export was a {status:word}")]
fn second_status(world: &CacheWorld, status: String) {
    let exports = world.exports.borrow();
    let (cache, _) = exports.get(1).expect("two exports should have run");
    assert_eq!(format!("{cache:?}"), status.trim_matches('"'));
}

#[then("the latest export mentions {name:word}")]
fn latest_mentions(world: &CacheWorld, name: String) {
    let exports = world.exports.borrow();
    let (_, bytes) = exports.last().expect("an export should have run");
    let body = String::from_utf8_lossy(bytes);
    assert!(body.contains(name.trim_matches('"')), "{body}");
}

#[then("the cache received {count} entries")]
fn cache_entries(world: &CacheWorld, count: usize) {
    assert_eq!(world.cache.sets(), count);
}

#[scenario(path = "tests/features/layer_cache.feature", index = 0)]
fn unchanged_models_hit(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/layer_cache.feature", index = 1)]
fn newer_mutations_invalidate(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/layer_cache.feature", index = 2)]
fn empty_models_bypass(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/layer_cache.feature", index = 3)]
fn languages_are_isolated(world: CacheWorld) {
    let _ = world;
}
