//! GPX 1.1 encoder.
//!
//! Points become waypoints; lines and polygon outlines become tracks with
//! one segment per part. Rows without geometry are skipped.

use std::io::Write;

use geo::{Coord, Geometry, LineString};
use mapentity_core::{Queryset, Reprojector, Row, Srid};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::ExportError;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// Write every row with a geometry as GPX waypoints or tracks in WGS84.
///
/// Elements are written in row order as rows are pulled from the queryset.
///
/// # Errors
/// Fails when a geometry cannot be reprojected or the sink rejects a write.
pub fn write_gpx<W: Write>(
    rows: Queryset<'_>,
    label: &str,
    reprojector: &dyn Reprojector,
    out: W,
) -> Result<(), ExportError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("gpx").with_attributes([
        ("version", "1.1"),
        ("creator", "mapentity"),
        ("xmlns", GPX_NAMESPACE),
    ])))?;
    for row in rows {
        let Some(geometry) = row.geometry_field() else {
            continue;
        };
        let projected = reprojector.reproject(geometry, Srid::WGS84)?;
        write_geometry(&mut writer, &row_name(&row, label), &projected)?;
    }
    writer.write_event(Event::End(BytesEnd::new("gpx")))?;
    writer.into_inner().flush()?;
    Ok(())
}

fn row_name(row: &Row, label: &str) -> String {
    let name = row.display_value("name", "").to_string();
    if name.is_empty() {
        format!("{label} {}", row.pk)
    } else {
        name
    }
}

fn write_geometry<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    geometry: &Geometry<f64>,
) -> Result<(), ExportError> {
    match geometry {
        Geometry::Point(point) => write_waypoint(writer, name, point.0),
        Geometry::MultiPoint(points) => points
            .iter()
            .try_for_each(|point| write_waypoint(writer, name, point.0)),
        Geometry::Line(line) => write_track(
            writer,
            name,
            &[LineString::from(vec![line.start, line.end])],
        ),
        Geometry::LineString(line) => write_track(writer, name, std::slice::from_ref(line)),
        Geometry::MultiLineString(lines) => write_track(writer, name, &lines.0),
        Geometry::Polygon(polygon) => {
            write_track(writer, name, std::slice::from_ref(polygon.exterior()))
        }
        Geometry::MultiPolygon(polygons) => {
            let outlines: Vec<_> = polygons
                .iter()
                .map(|polygon| polygon.exterior().clone())
                .collect();
            write_track(writer, name, &outlines)
        }
        Geometry::Rect(rect) => write_track(writer, name, &[rect.to_polygon().exterior().clone()]),
        Geometry::Triangle(triangle) => {
            write_track(writer, name, &[triangle.to_polygon().exterior().clone()])
        }
        Geometry::GeometryCollection(collection) => collection
            .iter()
            .try_for_each(|part| write_geometry(writer, name, part)),
    }
}

fn position(tag: &str, coord: Coord<f64>) -> BytesStart<'_> {
    BytesStart::new(tag).with_attributes([
        ("lat", coord.y.to_string().as_str()),
        ("lon", coord.x.to_string().as_str()),
    ])
}

fn write_name<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<(), ExportError> {
    writer.write_event(Event::Start(BytesStart::new("name")))?;
    writer.write_event(Event::Text(BytesText::new(name)))?;
    writer.write_event(Event::End(BytesEnd::new("name")))?;
    Ok(())
}

fn write_waypoint<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    coord: Coord<f64>,
) -> Result<(), ExportError> {
    writer.write_event(Event::Start(position("wpt", coord)))?;
    write_name(writer, name)?;
    writer.write_event(Event::End(BytesEnd::new("wpt")))?;
    Ok(())
}

fn write_track<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    segments: &[LineString<f64>],
) -> Result<(), ExportError> {
    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    write_name(writer, name)?;
    for segment in segments {
        writer.write_event(Event::Start(BytesStart::new("trkseg")))?;
        for coord in segment.coords() {
            writer.write_event(Event::Empty(position("trkpt", *coord)))?;
        }
        writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    Ok(())
}
