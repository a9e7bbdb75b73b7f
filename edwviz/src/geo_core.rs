use std::fmt;

use geo::{BoundingRect, Coord, Geometry, LineString, Polygon, Rect};
#[cfg(feature = "proj")]
use geo::MapCoords;
#[cfg(feature = "proj")]
use proj::Proj;
use serde::Serialize;

use crate::error::{EdwError, Result};

/// WGS 84, the CRS of GeoJSON and web maps.
pub const WGS84_EPSG: u32 = 4326;
/// NAD83 / Conus Albers, equal-area; used for area calculation.
pub const CONUS_ALBERS_EPSG: u32 = 5070;

/// Geographic (lon/lat) CRSs commonly found in EDW and GeoJSON data.
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4269, 4267, 4258, 4283, 4617, 4979];

/// Coordinate reference system of a feature collection.
///
/// Either an EPSG code, a WKT definition, or both. `geographic` is true for
/// lon/lat systems where planar area and distance are meaningless.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crs {
    pub epsg: Option<u32>,
    pub wkt: Option<String>,
    pub geographic: bool,
}

impl Crs {
    pub fn from_epsg(epsg: u32) -> Self {
        Crs {
            epsg: Some(epsg),
            wkt: None,
            geographic: GEOGRAPHIC_EPSG.contains(&epsg),
        }
    }

    /// Build from WKT; the CRS is geographic when the root node is `GEOGCS`/`GEOGCRS`.
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let root = wkt.trim_start().to_ascii_uppercase();
        let geographic = root.starts_with("GEOGCS") || root.starts_with("GEOGCRS");
        Crs {
            epsg: None,
            wkt: Some(wkt),
            geographic,
        }
    }

    pub fn wgs84() -> Self {
        Crs::from_epsg(WGS84_EPSG)
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(WGS84_EPSG)
    }

    /// Definition string understood by PROJ (`EPSG:n` or the raw WKT).
    pub fn definition(&self) -> Option<String> {
        match (&self.epsg, &self.wkt) {
            (Some(epsg), _) => Some(format!("EPSG:{epsg}")),
            (None, Some(wkt)) => Some(wkt.clone()),
            (None, None) => None,
        }
    }

    /// EPSG codes are compared when both sides have one, WKT otherwise.
    pub fn same_as(&self, other: &Crs) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => self.wkt.is_some() && self.wkt == other.wkt,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.epsg, &self.wkt) {
            (Some(epsg), _) => write!(f, "EPSG:{epsg}"),
            (None, Some(_)) => f.write_str("custom WKT"),
            (None, None) => f.write_str("undefined"),
        }
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Accepts the `(minx, miny, maxx, maxy)` tuple order used by GIS tools.
    pub fn from_tuple(bounds: (f64, f64, f64, f64)) -> Self {
        let (min_x, min_y, max_x, max_y) = bounds;
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    pub fn of_geometry(geometry: &Geometry<f64>) -> Option<Self> {
        geometry.bounding_rect().map(Self::from)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }

    /// Closed ring polygon, counter-clockwise from the lower-left corner.
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
                (self.min_x, self.min_y),
            ]),
            vec![],
        )
    }

    /// Transform bounding box to another CRS
    #[cfg(feature = "proj")]
    pub fn transform(&self, from_epsg: u32, to_epsg: u32) -> Result<Self> {
        let (min_x, min_y) = transform_coords(from_epsg, to_epsg, self.min_x, self.min_y)?;
        let (max_x, max_y) = transform_coords(from_epsg, to_epsg, self.max_x, self.max_y)?;

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.6}, {:.6})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

#[cfg(feature = "proj")]
fn transformer(from: &Crs, to: &Crs) -> Result<Proj> {
    let from_def = from
        .definition()
        .ok_or_else(|| EdwError::Projection("source CRS is undefined".to_string()))?;
    let to_def = to
        .definition()
        .ok_or_else(|| EdwError::Projection("target CRS is undefined".to_string()))?;

    Proj::new_known_crs(&from_def, &to_def, None)
        .map_err(|e| EdwError::Projection(format!("Failed to create Proj transformation: {e}")))
}

/// Transform coordinates from one CRS to another
#[cfg(feature = "proj")]
pub fn transform_coords(from_epsg: u32, to_epsg: u32, x: f64, y: f64) -> Result<(f64, f64)> {
    let proj = transformer(&Crs::from_epsg(from_epsg), &Crs::from_epsg(to_epsg))?;
    proj.convert((x, y))
        .map_err(|e| EdwError::Projection(format!("Failed to transform coordinates: {e}")))
}

/// Reproject every geometry from `from` to `to`. `None` entries are passed through.
#[cfg(feature = "proj")]
pub fn reproject_all<'a, I>(geometries: I, from: &Crs, to: &Crs) -> Result<Vec<Option<Geometry<f64>>>>
where
    I: IntoIterator<Item = Option<&'a Geometry<f64>>>,
{
    let proj = transformer(from, to)?;
    geometries
        .into_iter()
        .map(|geometry| {
            geometry
                .map(|g| {
                    g.try_map_coords(|c| {
                        proj.convert((c.x, c.y)).map(|(x, y)| Coord { x, y })
                    })
                    .map_err(|e| EdwError::Projection(format!("Failed to reproject geometry: {e}")))
                })
                .transpose()
        })
        .collect()
}

#[cfg(not(feature = "proj"))]
pub fn reproject_all<'a, I>(_geometries: I, from: &Crs, to: &Crs) -> Result<Vec<Option<Geometry<f64>>>>
where
    I: IntoIterator<Item = Option<&'a Geometry<f64>>>,
{
    Err(EdwError::Projection(format!(
        "cannot reproject from {from} to {to}: built without PROJ support"
    )))
}
