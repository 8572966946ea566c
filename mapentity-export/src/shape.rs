//! Zipped ESRI shapefile encoder.
//!
//! A shapefile holds a single shape type, so every exported row must fall
//! into the same family. Points and multipoints share a family: a point
//! layer that meets its first multipoint is rewritten as a multipoint layer.
//! The `.shp`, `.shx`, `.dbf` and `.prj` members are written to a scratch
//! directory and zipped into a scratch file. Only then is the archive copied
//! to the sink, so a failed export never leaves a partial archive behind.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use geo::{Geometry, LineString, Polygon as GeoPolygon};
use log::{debug, warn};
use mapentity_core::{Column, GeometryKind, Queryset, Reprojector, Row, Srid};
use shapefile::dbase::{self, FieldName, Record, TableWriterBuilder};
use shapefile::{Multipoint, Point, Polygon, PolygonRing, Polyline};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::ExportError;
use crate::tabular::CSV_DISPLAY_SUFFIX;

const FIELD_NAME_LEN: usize = 10;
const CHARACTER_FIELD_LEN: u8 = 254;
const MEMBERS: [&str; 4] = ["shp", "shx", "dbf", "prj"];
const LAYER_STEM: &str = "layer";
const PROMOTED_STEM: &str = "promoted";

const WGS84_WKT: &str = concat!(
    r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],"#,
    r#"PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#
);
const WEB_MERCATOR_WKT: &str = concat!(
    r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984","#,
    r#"DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],"#,
    r#"PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],"#,
    r#"PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],"#,
    r#"PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],"#,
    r#"PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],"#,
    r#"UNIT["Meter",1.0]]"#
);

/// ESRI WKT written to the `.prj` member for `srid`.
#[must_use]
pub fn projection_wkt(srid: Srid) -> Option<&'static str> {
    match srid {
        Srid::WGS84 => Some(WGS84_WKT),
        Srid::WEB_MERCATOR => Some(WEB_MERCATOR_WKT),
        _ => None,
    }
}

/// Shape family of an output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeFamily {
    Points,
    Polylines,
    Polygons,
}

enum Shape {
    Point(Point),
    Multipoint(Multipoint),
    Polyline(Polyline),
    Polygon(Polygon),
}

impl Shape {
    const fn family(&self) -> ShapeFamily {
        match self {
            Self::Point(_) | Self::Multipoint(_) => ShapeFamily::Points,
            Self::Polyline(_) => ShapeFamily::Polylines,
            Self::Polygon(_) => ShapeFamily::Polygons,
        }
    }
}

type LayerWriter = shapefile::Writer<BufWriter<File>>;

fn create_writer(base: &Path, names: &[String]) -> Result<LayerWriter, ExportError> {
    Ok(shapefile::Writer::from_path(
        base.with_extension("shp"),
        table_builder(names)?,
    )?)
}

/// Scratch members of the layer being written.
struct OpenLayer {
    expected: GeometryKind,
    family: ShapeFamily,
    multipoint: bool,
    base: PathBuf,
    writer: LayerWriter,
}

impl OpenLayer {
    fn create(
        base: PathBuf,
        names: &[String],
        expected: GeometryKind,
        shape: &Shape,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            expected,
            family: shape.family(),
            multipoint: matches!(shape, Shape::Multipoint(_)),
            writer: create_writer(&base, names)?,
            base,
        })
    }

    /// Rewrite the points written so far as one-member multipoints.
    fn promote(self, names: &[String]) -> Result<Self, ExportError> {
        let Self {
            expected,
            family,
            base,
            writer,
            ..
        } = self;
        drop(writer);
        let promoted = base.with_file_name(PROMOTED_STEM);
        let mut rewritten = create_writer(&promoted, names)?;
        let mut reader = shapefile::Reader::from_path(base.with_extension("shp"))?;
        for pair in reader.iter_shapes_and_records_as::<Point, Record>() {
            let (point, attributes) = pair?;
            rewritten.write_shape_and_record(&Multipoint::new(vec![point]), &attributes)?;
        }
        Ok(Self {
            expected,
            family,
            multipoint: true,
            base: promoted,
            writer: rewritten,
        })
    }

    fn write(&mut self, shape: &Shape, attributes: &Record) -> Result<(), ExportError> {
        match shape {
            Shape::Point(point) if self.multipoint => self
                .writer
                .write_shape_and_record(&Multipoint::new(vec![*point]), attributes)?,
            Shape::Point(point) => self.writer.write_shape_and_record(point, attributes)?,
            Shape::Multipoint(many) => self.writer.write_shape_and_record(many, attributes)?,
            Shape::Polyline(line) => self.writer.write_shape_and_record(line, attributes)?,
            Shape::Polygon(area) => self.writer.write_shape_and_record(area, attributes)?,
        }
        Ok(())
    }

    /// Complete the member headers and return their base path.
    fn finish(self) -> PathBuf {
        drop(self.writer);
        self.base
    }
}

/// Members of a layer without shapes: headers only, null shape type.
fn empty_layer(base: &Path, names: &[String]) -> Result<PathBuf, ExportError> {
    drop(create_writer(base, names)?);
    Ok(base.to_path_buf())
}

fn points(line: &LineString<f64>) -> Vec<Point> {
    line.coords().map(|coord| Point::new(coord.x, coord.y)).collect()
}

fn polyline<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Option<Shape> {
    let parts: Vec<_> = lines
        .into_iter()
        .map(points)
        .filter(|part| part.len() >= 2)
        .collect();
    (!parts.is_empty()).then(|| Shape::Polyline(Polyline::with_parts(parts)))
}

fn polygon<'a>(polygons: impl IntoIterator<Item = &'a GeoPolygon<f64>>) -> Option<Shape> {
    let mut rings = Vec::new();
    for part in polygons {
        let exterior = points(part.exterior());
        if exterior.len() < 4 {
            continue;
        }
        rings.push(PolygonRing::Outer(exterior));
        rings.extend(
            part.interiors()
                .iter()
                .map(points)
                .filter(|ring| ring.len() >= 4)
                .map(PolygonRing::Inner),
        );
    }
    (!rings.is_empty()).then(|| Shape::Polygon(Polygon::with_rings(rings)))
}

/// Convert a geometry, or `None` when it has no usable coordinates.
fn to_shape(geometry: &Geometry<f64>) -> Option<Shape> {
    match geometry {
        Geometry::Point(point) => Some(Shape::Point(Point::new(point.x(), point.y()))),
        Geometry::MultiPoint(many) => {
            let collected: Vec<_> = many.iter().map(|p| Point::new(p.x(), p.y())).collect();
            (!collected.is_empty()).then(|| Shape::Multipoint(Multipoint::new(collected)))
        }
        Geometry::Line(line) => polyline([&LineString::from(vec![line.start, line.end])]),
        Geometry::LineString(line) => polyline([line]),
        Geometry::MultiLineString(lines) => polyline(lines),
        Geometry::Polygon(single) => polygon([single]),
        Geometry::MultiPolygon(many) => polygon(many),
        Geometry::Rect(rect) => polygon([&rect.to_polygon()]),
        Geometry::Triangle(triangle) => polygon([&triangle.to_polygon()]),
        Geometry::GeometryCollection(_) => None,
    }
}

/// dBase field names: ASCII, at most ten characters, unique.
fn field_names(columns: &[Column]) -> Vec<String> {
    let mut taken = HashSet::new();
    columns
        .iter()
        .map(|column| {
            let ascii: String = deunicode::deunicode(&column.field)
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .take(FIELD_NAME_LEN)
                .collect();
            let mut candidate = ascii.clone();
            let mut counter = 1_u32;
            while !taken.insert(candidate.clone()) {
                let suffix = counter.to_string();
                let keep = FIELD_NAME_LEN.saturating_sub(suffix.len());
                candidate = ascii.chars().take(keep).chain(suffix.chars()).collect();
                counter = counter.saturating_add(1);
            }
            candidate
        })
        .collect()
}

fn table_builder(names: &[String]) -> Result<TableWriterBuilder, ExportError> {
    names.iter().try_fold(TableWriterBuilder::new(), |builder, name| {
        let field = FieldName::try_from(name.as_str()).map_err(|err| {
            ExportError::ShapefileField {
                name: name.clone(),
                reason: format!("{err:?}"),
            }
        })?;
        Ok(builder.add_character_field(field, CHARACTER_FIELD_LEN))
    })
}

fn record(row: &Row, columns: &[Column], names: &[String]) -> Record {
    let mut record = Record::default();
    for (column, name) in columns.iter().zip(names) {
        let text = row
            .display_value(&column.field, CSV_DISPLAY_SUFFIX)
            .to_string();
        let ascii: String = deunicode::deunicode(&text)
            .chars()
            .take(usize::from(CHARACTER_FIELD_LEN))
            .collect();
        record.insert(name.clone(), dbase::FieldValue::Character(Some(ascii)));
    }
    record
}

/// Inputs of [`write_shapefile`] besides the rows and the sink.
#[derive(Debug, Clone, Copy)]
pub struct ShapefileLayer<'a> {
    /// Base name of the archive members.
    pub name: &'a str,
    /// Attribute columns.
    pub columns: &'a [Column],
    /// Output SRID.
    pub srid: Srid,
    /// Directory for scratch files.
    pub scratch_dir: &'a Utf8Path,
}

/// Write rows as a zipped shapefile bundle.
///
/// Rows without a geometry, or whose geometry has no usable coordinates,
/// are skipped with a warning. A layer without shapes still carries every
/// member, with header-only `.shp` and `.shx` files. Points join a
/// multipoint layer as one-member multipoints.
///
/// # Errors
/// Returns [`ExportError::FormatIncompatible`] when rows mix shape
/// families and [`ExportError::UnknownProjection`] when no `.prj`
/// definition exists for the output SRID. Nothing is written to `out` on
/// failure.
pub fn write_shapefile<W: Write + ?Sized>(
    rows: Queryset<'_>,
    layer: ShapefileLayer<'_>,
    reprojector: &dyn Reprojector,
    out: &mut W,
) -> Result<(), ExportError> {
    let wkt = projection_wkt(layer.srid).ok_or(ExportError::UnknownProjection { srid: layer.srid })?;
    let workdir = tempfile::Builder::new()
        .prefix("mapentity-shp-")
        .tempdir_in(layer.scratch_dir)?;
    let base = workdir.path().join(LAYER_STEM);
    let names = field_names(layer.columns);

    let mut open: Option<OpenLayer> = None;
    let mut written = 0_usize;
    for row in rows {
        let Some(geometry) = row.geometry_field() else {
            warn!("skipping row {} in shapefile export: no geometry", row.pk);
            continue;
        };
        let kind = geometry.kind();
        let projected = reprojector.reproject(geometry, layer.srid)?;
        let Some(shape) = to_shape(&projected) else {
            if kind == GeometryKind::GeometryCollection {
                return Err(ExportError::FormatIncompatible {
                    expected: open.as_ref().map_or(kind, |existing| existing.expected),
                    found: kind,
                    pk: row.pk,
                });
            }
            warn!("skipping row {} in shapefile export: empty geometry", row.pk);
            continue;
        };
        let mut current = match open.take() {
            None => {
                debug!("shapefile layer {} holds {kind} geometries", layer.name);
                OpenLayer::create(base.clone(), &names, kind, &shape)?
            }
            Some(existing) if existing.family != shape.family() => {
                return Err(ExportError::FormatIncompatible {
                    expected: existing.expected,
                    found: kind,
                    pk: row.pk,
                });
            }
            Some(existing) if !existing.multipoint && matches!(shape, Shape::Multipoint(_)) => {
                debug!("rewriting shapefile layer {} as multipoints", layer.name);
                existing.promote(&names)?
            }
            Some(existing) => existing,
        };
        current.write(&shape, &record(&row, layer.columns, &names))?;
        open = Some(current);
        written = written.saturating_add(1);
    }
    let members = open.map_or_else(
        || empty_layer(&base, &names),
        |pending| Ok(pending.finish()),
    )?;
    std::fs::write(members.with_extension("prj"), wkt)?;
    debug!("zipping {written} shapes for {}", layer.name);

    let mut archive = zip_members(&members, layer.name, tempfile::tempfile_in(layer.scratch_dir)?)?;
    archive.seek(SeekFrom::Start(0))?;
    io::copy(&mut archive, out)?;
    Ok(())
}

fn zip_members(base: &Path, name: &str, target: File) -> Result<File, ExportError> {
    let mut zip = ZipWriter::new(target);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for extension in MEMBERS {
        let path = base.with_extension(extension);
        if !path.is_file() {
            continue;
        }
        zip.start_file(format!("{name}.{extension}"), options)?;
        io::copy(&mut File::open(&path)?, &mut zip)?;
    }
    Ok(zip.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPoint, Point as GeoPoint, line_string};
    use mapentity_core::{EntityId, SpatialGeometry, SphericalMercator};
    use rstest::{fixture, rstest};
    use std::io::Cursor;
    use tempfile::TempDir;

    #[fixture]
    fn scratch() -> TempDir {
        TempDir::new().unwrap_or_else(|err| panic!("create temporary directory: {err}"))
    }

    fn point_row(pk: u64) -> Row {
        Row::new(EntityId(pk))
            .with_field("name", "Cascade")
            .with_geometry(SpatialGeometry::new(
                Geometry::Point(GeoPoint::new(6.1, 45.1)),
                Srid::WGS84,
            ))
    }

    fn line_row(pk: u64) -> Row {
        Row::new(EntityId(pk)).with_geometry(SpatialGeometry::new(
            Geometry::LineString(line_string![(x: 6.0, y: 45.0), (x: 6.2, y: 45.2)]),
            Srid::WGS84,
        ))
    }

    fn multipoint_row(pk: u64) -> Row {
        Row::new(EntityId(pk))
            .with_field("name", "Sources")
            .with_geometry(SpatialGeometry::new(
                Geometry::MultiPoint(MultiPoint::from(vec![(6.3, 45.3), (6.4, 45.4)])),
                Srid::WGS84,
            ))
    }

    /// Extract the archive under the scratch directory and list its members.
    fn unpack(out: Vec<u8>, scratch: &TempDir) -> (Vec<String>, PathBuf) {
        let mut archive = zip::ZipArchive::new(Cursor::new(out))
            .unwrap_or_else(|err| panic!("valid zip: {err}"));
        let target = scratch.path().join("unpacked");
        archive
            .extract(&target)
            .unwrap_or_else(|err| panic!("extract archive: {err}"));
        let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        names.sort_unstable();
        (names, target)
    }

    fn export(rows: Vec<Row>, scratch: &TempDir, out: &mut Vec<u8>) -> Result<(), ExportError> {
        let dir = Utf8Path::from_path(scratch.path()).unwrap_or_else(|| panic!("utf8 temp path"));
        let columns = [Column::new("name"), Column::new("description_long")];
        write_shapefile(
            Box::new(rows.into_iter()),
            ShapefileLayer {
                name: "poi",
                columns: &columns,
                srid: Srid::WGS84,
                scratch_dir: dir,
            },
            &SphericalMercator,
            out,
        )
    }

    #[rstest]
    fn archive_holds_every_member(scratch: TempDir) {
        let mut out = Vec::new();
        export(vec![point_row(1), point_row(2)], &scratch, &mut out)
            .unwrap_or_else(|err| panic!("shapefile export: {err}"));
        let mut archive = zip::ZipArchive::new(Cursor::new(out))
            .unwrap_or_else(|err| panic!("valid zip: {err}"));
        let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        names.sort_unstable();
        assert_eq!(names, ["poi.dbf", "poi.prj", "poi.shp", "poi.shx"]);
        let mut prj = String::new();
        io::Read::read_to_string(
            &mut archive
                .by_name("poi.prj")
                .unwrap_or_else(|err| panic!("prj member: {err}")),
            &mut prj,
        )
        .unwrap_or_else(|err| panic!("read prj: {err}"));
        assert!(prj.starts_with("GEOGCS[\"GCS_WGS_1984\""));
    }

    #[rstest]
    fn mixed_families_fail_without_output(scratch: TempDir) {
        let mut out = Vec::new();
        let err = export(vec![point_row(1), line_row(2)], &scratch, &mut out)
            .expect_err("points and lines cannot share a layer");
        assert!(matches!(
            err,
            ExportError::FormatIncompatible {
                expected: GeometryKind::Point,
                found: GeometryKind::LineString,
                pk: EntityId(2),
            }
        ));
        assert!(out.is_empty());
    }

    #[rstest]
    #[case(vec![point_row(1), multipoint_row(9)], [1, 2])]
    #[case(vec![multipoint_row(9), point_row(1)], [2, 1])]
    fn points_share_a_layer_with_multipoints(
        scratch: TempDir,
        #[case] rows: Vec<Row>,
        #[case] sizes: [usize; 2],
    ) {
        let mut out = Vec::new();
        export(rows, &scratch, &mut out).unwrap_or_else(|err| panic!("shapefile export: {err}"));
        let (_, target) = unpack(out, &scratch);
        let shapes = shapefile::Reader::from_path(target.join("poi.shp"))
            .and_then(|mut reader| reader.read_as::<Multipoint, Record>())
            .unwrap_or_else(|err| panic!("read multipoint layer: {err}"));
        let read_sizes: Vec<_> = shapes.iter().map(|(many, _)| many.points().len()).collect();
        assert_eq!(read_sizes, sizes);
        let labels: Vec<_> = shapes
            .iter()
            .filter_map(|(_, attributes)| match attributes.get("name") {
                Some(dbase::FieldValue::Character(Some(text))) => Some(text.trim().to_owned()),
                _ => None,
            })
            .collect();
        assert!(labels.iter().any(|label| label == "Cascade"), "{labels:?}");
        assert!(labels.iter().any(|label| label == "Sources"), "{labels:?}");
    }

    #[rstest]
    #[case(Vec::new())]
    #[case(vec![Row::new(EntityId(3)).with_field("name", "Unplaced")])]
    fn layers_without_shapes_still_hold_every_member(
        scratch: TempDir,
        #[case] rows: Vec<Row>,
    ) {
        let mut out = Vec::new();
        export(rows, &scratch, &mut out).unwrap_or_else(|err| panic!("shapefile export: {err}"));
        let (names, target) = unpack(out, &scratch);
        assert_eq!(names, ["poi.dbf", "poi.prj", "poi.shp", "poi.shx"]);
        for member in ["poi.shp", "poi.shx"] {
            let header = std::fs::metadata(target.join(member))
                .unwrap_or_else(|err| panic!("{member}: {err}"));
            assert_eq!(header.len(), 100, "{member} holds only its header");
        }
        let records = dbase::Reader::from_path(target.join("poi.dbf"))
            .and_then(|mut reader| reader.read())
            .unwrap_or_else(|err| panic!("read dbf: {err}"));
        assert!(records.is_empty());
    }

    #[rstest]
    fn unknown_projection_is_rejected(scratch: TempDir) {
        let dir = Utf8Path::from_path(scratch.path()).unwrap_or_else(|| panic!("utf8 temp path"));
        let mut out = Vec::new();
        let result = write_shapefile(
            Box::new(std::iter::empty()),
            ShapefileLayer {
                name: "poi",
                columns: &[],
                srid: Srid(2154),
                scratch_dir: dir,
            },
            &SphericalMercator,
            &mut out,
        );
        assert!(matches!(
            result,
            Err(ExportError::UnknownProjection { srid: Srid(2154) })
        ));
    }

    #[rstest]
    fn field_names_are_short_and_unique() {
        let columns = [
            Column::new("description_fr"),
            Column::new("description_en"),
            Column::new("durée"),
        ];
        assert_eq!(
            field_names(&columns),
            ["descriptio", "descripti1", "duree"]
        );
    }
}
