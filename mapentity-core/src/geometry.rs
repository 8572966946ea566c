//! Geometry contract required from rows, and reprojection between SRIDs.
//!
//! The export layer treats geometry as "a serialisable coordinate shape with
//! an SRID". It never edits topologies; it only needs to move coordinates
//! into the SRID an exporter targets.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;

use geo::{Coord, Geometry, MapCoords};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spatial reference system identifier (EPSG code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Srid(pub u32);

impl Srid {
    /// WGS84 longitude/latitude in degrees.
    pub const WGS84: Self = Self(4326);
    /// Spherical ("web") Mercator in metres.
    pub const WEB_MERCATOR: Self = Self(3857);
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Coarse geometry type, used to group rows per output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Single point.
    Point,
    /// Several points.
    MultiPoint,
    /// Single line.
    LineString,
    /// Several lines.
    MultiLineString,
    /// Single polygon.
    Polygon,
    /// Several polygons.
    MultiPolygon,
    /// Heterogeneous collection.
    GeometryCollection,
}

impl GeometryKind {
    /// Classify a geometry.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::Line(_) | Geometry::LineString(_) => Self::LineString,
            Geometry::MultiLineString(_) => Self::MultiLineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Self::Polygon,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            Geometry::GeometryCollection(_) => Self::GeometryCollection,
        }
    }

    /// Lowercase name, as used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::MultiPoint => "multipoint",
            Self::LineString => "linestring",
            Self::MultiLineString => "multilinestring",
            Self::Polygon => "polygon",
            Self::MultiPolygon => "multipolygon",
            Self::GeometryCollection => "geometrycollection",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geometry tagged with the SRID its coordinates are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGeometry {
    /// Coordinates.
    pub geometry: Geometry<f64>,
    /// Reference system of [`SpatialGeometry::geometry`].
    pub srid: Srid,
}

impl SpatialGeometry {
    /// Tag `geometry` with `srid`.
    #[must_use]
    pub const fn new(geometry: Geometry<f64>, srid: Srid) -> Self {
        Self { geometry, srid }
    }

    /// Coarse type of the geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }
}

/// Errors raised when coordinates cannot be moved between SRIDs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReprojectError {
    /// No transformation is known between the two reference systems.
    #[error("no transformation from {from} to {to}")]
    Unsupported {
        /// Source reference system.
        from: Srid,
        /// Requested reference system.
        to: Srid,
    },
}

/// Move geometries into a target SRID.
///
/// Deployments backed by a full projection library plug their own
/// implementation into the export dispatcher.
pub trait Reprojector: Send + Sync {
    /// Return `geometry` expressed in `target`.
    ///
    /// # Errors
    /// Returns [`ReprojectError::Unsupported`] when the pair of reference
    /// systems cannot be converted.
    fn reproject(
        &self,
        geometry: &SpatialGeometry,
        target: Srid,
    ) -> Result<Geometry<f64>, ReprojectError>;
}

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Built-in reprojector handling identity and WGS84 ⇄ spherical Mercator.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use mapentity_core::{Reprojector, SpatialGeometry, SphericalMercator, Srid};
///
/// let origin = SpatialGeometry::new(Geometry::Point(Point::new(0.0, 0.0)), Srid::WGS84);
/// let projected = SphericalMercator.reproject(&origin, Srid::WEB_MERCATOR).unwrap();
/// assert_eq!(projected, Geometry::Point(Point::new(0.0, 0.0)));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SphericalMercator;

impl Reprojector for SphericalMercator {
    fn reproject(
        &self,
        geometry: &SpatialGeometry,
        target: Srid,
    ) -> Result<Geometry<f64>, ReprojectError> {
        match (geometry.srid, target) {
            (from, to) if from == to => Ok(geometry.geometry.clone()),
            (Srid::WGS84, Srid::WEB_MERCATOR) => Ok(geometry.geometry.map_coords(to_mercator)),
            (Srid::WEB_MERCATOR, Srid::WGS84) => Ok(geometry.geometry.map_coords(to_wgs84)),
            (from, to) => Err(ReprojectError::Unsupported { from, to }),
        }
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "spherical Mercator is defined by floating-point trigonometry"
)]
fn to_mercator(coord: Coord<f64>) -> Coord<f64> {
    let latitude = coord.y.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    Coord {
        x: coord.x.to_radians() * EARTH_RADIUS_M,
        y: (FRAC_PI_4 + latitude.to_radians() / 2.0).tan().ln() * EARTH_RADIUS_M,
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "spherical Mercator is defined by floating-point trigonometry"
)]
fn to_wgs84(coord: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (coord.x / EARTH_RADIUS_M).to_degrees(),
        y: (2.0 * (coord.y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees(),
    }
}
