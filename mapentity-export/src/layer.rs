//! GeoJSON encoders for map layers and single-row detail.

use std::io::Write;

use geojson::{Feature, JsonObject, JsonValue, feature::Id};
use mapentity_core::{Queryset, Reprojector, Row, Srid};
use serde_json::json;

use crate::ExportError;

/// Reproject the row's geometry to `srid` as a GeoJSON geometry.
pub(crate) fn geojson_geometry(
    row: &Row,
    reprojector: &dyn Reprojector,
    srid: Srid,
) -> Result<Option<geojson::Geometry>, ExportError> {
    row.geometry_field()
        .map(|geometry| {
            let projected = reprojector.reproject(geometry, srid)?;
            Ok(geojson::Geometry::new(geojson::Value::from(&projected)))
        })
        .transpose()
}

fn layer_feature(
    row: &Row,
    properties: &[String],
    reprojector: &dyn Reprojector,
    srid: Srid,
) -> Result<Feature, ExportError> {
    let mut object = JsonObject::new();
    for name in properties {
        let value = row.field(name).map_or(Ok(JsonValue::Null), serde_json::to_value)?;
        object.insert(name.clone(), value);
    }
    // `id` is always the primary key, even when a field of that name exists.
    object.insert("id".to_owned(), JsonValue::from(row.pk.0));
    Ok(Feature {
        bbox: None,
        geometry: geojson_geometry(row, reprojector, srid)?,
        id: Some(Id::Number(row.pk.0.into())),
        properties: Some(object),
        foreign_members: None,
    })
}

/// Encode rows as a GeoJSON `FeatureCollection`.
///
/// Each feature carries the declared `properties` plus `id`. Features are
/// written one by one so only a single row is held at a time.
///
/// # Errors
/// Fails when a geometry cannot be reprojected or the sink rejects a write.
pub fn write_layer<W: Write + ?Sized>(
    rows: Queryset<'_>,
    properties: &[String],
    reprojector: &dyn Reprojector,
    srid: Srid,
    out: &mut W,
) -> Result<(), ExportError> {
    out.write_all(br#"{"type":"FeatureCollection","features":["#)?;
    for (index, row) in rows.enumerate() {
        if index > 0 {
            out.write_all(b",")?;
        }
        let feature = layer_feature(&row, properties, reprojector, srid)?;
        serde_json::to_writer(&mut *out, &feature)?;
    }
    out.write_all(b"]}")?;
    Ok(())
}

/// Encode one row as `{"id", "properties", "geometry"}`.
///
/// # Errors
/// Fails when the geometry cannot be reprojected or the sink rejects a
/// write.
pub fn write_detail<W: Write + ?Sized>(
    row: &Row,
    reprojector: &dyn Reprojector,
    srid: Srid,
    out: &mut W,
) -> Result<(), ExportError> {
    let properties: JsonObject = row
        .fields()
        .map(|(name, value)| Ok((name.to_owned(), serde_json::to_value(value)?)))
        .collect::<Result<_, serde_json::Error>>()?;
    let body = json!({
        "id": row.pk.0,
        "properties": properties,
        "geometry": geojson_geometry(row, reprojector, srid)?,
    });
    serde_json::to_writer(out, &body)?;
    Ok(())
}
