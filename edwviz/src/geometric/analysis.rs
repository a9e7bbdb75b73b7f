//! Analysis helpers over a [`FeatureCollection`]: area, attribute and
//! bounds filters, summary statistics, merge, spatial join and buffers.
//!
//! Every function returns a new collection; inputs are never modified.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use geo::{Area, Geometry, Intersects, Relate};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::error::{EdwError, Result};
use crate::geo_core::{reproject_all, BoundingBox, Crs, CONUS_ALBERS_EPSG};
use crate::geometric::feature_collection::{AttributeValue, FeatureCollection, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    Acres,
    Hectares,
    SquareMeters,
    SquareKilometers,
}

impl AreaUnit {
    /// Multiplier from square meters.
    pub fn factor(&self) -> f64 {
        match self {
            AreaUnit::Acres => 0.000_247_105,
            AreaUnit::Hectares => 1e-4,
            AreaUnit::SquareMeters => 1.0,
            AreaUnit::SquareKilometers => 1e-6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AreaUnit::Acres => "acres",
            AreaUnit::Hectares => "hectares",
            AreaUnit::SquareMeters => "square_meters",
            AreaUnit::SquareKilometers => "square_kilometers",
        }
    }

    /// Attribute written by [`calculate_area`], e.g. `area_acres`.
    pub fn column_name(&self) -> String {
        format!("area_{}", self.as_str())
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaUnit {
    type Err = EdwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acres" => Ok(AreaUnit::Acres),
            "hectares" => Ok(AreaUnit::Hectares),
            "square_meters" | "sqm" => Ok(AreaUnit::SquareMeters),
            "square_kilometers" | "sqkm" => Ok(AreaUnit::SquareKilometers),
            _ => Err(EdwError::UnsupportedUnit(s.to_string())),
        }
    }
}

/// Distance units accepted by [`create_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl LengthUnit {
    /// Multiplier to meters.
    pub fn factor(&self) -> f64 {
        match self {
            LengthUnit::Meters => 1.0,
            LengthUnit::Kilometers => 1000.0,
            LengthUnit::Miles => 1609.34,
            LengthUnit::Feet => 0.3048,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthUnit::Meters => "meters",
            LengthUnit::Kilometers => "kilometers",
            LengthUnit::Miles => "miles",
            LengthUnit::Feet => "feet",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LengthUnit {
    type Err = EdwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meters" | "m" => Ok(LengthUnit::Meters),
            "kilometers" | "km" => Ok(LengthUnit::Kilometers),
            "miles" | "mi" => Ok(LengthUnit::Miles),
            "feet" | "ft" => Ok(LengthUnit::Feet),
            _ => Err(EdwError::UnsupportedUnit(s.to_string())),
        }
    }
}

/// Add an `area_<unit>` attribute to every record.
///
/// Areas are planar, so a geographic CRS is first reprojected to CONUS
/// Albers (EPSG:5070); without PROJ support that is a
/// [`EdwError::Projection`]. A collection with no CRS is rejected the same
/// way. Running twice with the same unit overwrites the column.
pub fn calculate_area(collection: &FeatureCollection, unit: &str) -> Result<FeatureCollection> {
    calculate_area_in(collection, unit.parse()?)
}

pub fn calculate_area_in(collection: &FeatureCollection, unit: AreaUnit) -> Result<FeatureCollection> {
    let crs = collection.crs.as_ref().ok_or_else(|| {
        EdwError::Projection(format!(
            "'{}' has no CRS; cannot compute areas",
            collection.name
        ))
    })?;

    let projected;
    let geometries: Vec<Option<&Geometry<f64>>> = if crs.is_geographic() {
        debug!(from = %crs, to = CONUS_ALBERS_EPSG, "reprojecting for area calculation");
        projected = reproject_all(
            collection.iter().map(|r| r.geometry.as_ref()),
            crs,
            &Crs::from_epsg(CONUS_ALBERS_EPSG),
        )?;
        projected.iter().map(Option::as_ref).collect()
    } else {
        collection.iter().map(|r| r.geometry.as_ref()).collect()
    };

    let factor = unit.factor();
    let values = geometries
        .into_iter()
        .map(|g| match g {
            Some(g) => AttributeValue::Real(g.unsigned_area() * factor),
            None => AttributeValue::Null,
        })
        .collect();

    let mut out = collection.clone();
    out.set_column(&unit.column_name(), values)?;
    Ok(out)
}

/// Records whose `field` equals `value`. Integers and reals compare numerically.
pub fn filter_by_attribute(
    collection: &FeatureCollection,
    field: &str,
    value: impl Into<AttributeValue>,
) -> Result<FeatureCollection> {
    filter_by_attribute_in(collection, field, &[value.into()])
}

/// Records whose `field` equals any of `values`.
pub fn filter_by_attribute_in(
    collection: &FeatureCollection,
    field: &str,
    values: &[AttributeValue],
) -> Result<FeatureCollection> {
    let idx = collection.field_index(field)?;
    let filtered =
        collection.filter(|r| values.iter().any(|v| r.attributes[idx].loosely_equals(v)));
    info!(
        field,
        before = collection.len(),
        after = filtered.len(),
        "filtered by attribute"
    );
    Ok(filtered)
}

/// Records whose geometry intersects `bbox` (boundary contact counts).
///
/// Records without geometry never match, so filtering by the collection's
/// own [`total_bounds`](FeatureCollection::total_bounds) keeps every record
/// that has a geometry and drops the rest.
pub fn filter_by_bounds(collection: &FeatureCollection, bbox: BoundingBox) -> FeatureCollection {
    let rect = bbox.to_polygon();
    let filtered = collection.filter(|r| r.geometry.as_ref().is_some_and(|g| rect.intersects(g)));
    info!(
        %bbox,
        before = collection.len(),
        after = filtered.len(),
        "filtered by bounds"
    );
    filtered
}

pub fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaSummary {
    pub column: String,
    pub total: f64,
    pub mean: f64,
}

/// Same figures as a dataframe `describe()`: `std` is the sample deviation
/// and quartiles interpolate linearly between closest ranks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCounts {
    pub column: String,
    /// Most frequent first; ties ordered by value.
    pub counts: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub feature_count: usize,
    pub null_geometry_count: usize,
    pub geometry_types: BTreeMap<String, usize>,
    pub total_bounds: Option<BoundingBox>,
    pub areas: Vec<AreaSummary>,
    pub numeric: Vec<ColumnStats>,
    pub categorical: Vec<ValueCounts>,
}

impl SummaryReport {
    pub fn numeric_column(&self, column: &str) -> Option<&ColumnStats> {
        self.numeric.iter().find(|c| c.column == column)
    }

    pub fn value_counts(&self, column: &str) -> Option<&ValueCounts> {
        self.categorical.iter().find(|c| c.column == column)
    }
}

enum ColumnKind {
    Numeric(Vec<f64>),
    Text(Vec<String>),
    Other,
}

fn classify(collection: &FeatureCollection, idx: usize) -> ColumnKind {
    let mut numbers = Vec::new();
    let mut texts = Vec::new();
    for record in collection {
        match &record.attributes[idx] {
            AttributeValue::Null => {}
            AttributeValue::Integer(_) | AttributeValue::Real(_) => {
                if let Some(v) = record.attributes[idx].as_f64() {
                    numbers.push(v);
                }
            }
            AttributeValue::Text(s) => texts.push(s.clone()),
            _ => return ColumnKind::Other,
        }
    }
    match (numbers.is_empty(), texts.is_empty()) {
        (false, true) => ColumnKind::Numeric(numbers),
        (true, false) => ColumnKind::Text(texts),
        _ => ColumnKind::Other,
    }
}

/// `p`-quantile of sorted, non-empty `values`, at position `(n - 1) * p`.
fn linear_quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * p;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

fn describe(column: &str, mut values: Vec<f64>) -> ColumnStats {
    values.sort_by(|a, b| a.total_cmp(b));
    ColumnStats {
        column: column.to_string(),
        count: values.len(),
        mean: values.iter().mean(),
        std: values.iter().std_dev(),
        min: values[0],
        q25: linear_quantile(&values, 0.25),
        median: linear_quantile(&values, 0.5),
        q75: linear_quantile(&values, 0.75),
        max: values[values.len() - 1],
    }
}

fn value_counts(column: &str, values: Vec<String>) -> ValueCounts {
    let mut tally: HashMap<String, usize> = HashMap::new();
    for v in values {
        *tally.entry(v).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = tally.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ValueCounts {
        column: column.to_string(),
        counts,
    }
}

/// Counts, bounds, area totals, numeric describe and categorical frequencies.
pub fn get_summary_statistics(collection: &FeatureCollection) -> SummaryReport {
    let mut geometry_types = BTreeMap::new();
    let mut null_geometry_count = 0;
    for record in collection {
        match &record.geometry {
            Some(g) => *geometry_types.entry(geometry_type(g).to_string()).or_insert(0) += 1,
            None => null_geometry_count += 1,
        }
    }

    let mut areas = Vec::new();
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for (idx, column) in collection.schema().iter().enumerate() {
        match classify(collection, idx) {
            ColumnKind::Numeric(values) => {
                if column.starts_with("area_") {
                    let total: f64 = values.iter().sum();
                    areas.push(AreaSummary {
                        column: column.clone(),
                        total,
                        mean: total / values.len() as f64,
                    });
                }
                numeric.push(describe(column, values));
            }
            ColumnKind::Text(values) => categorical.push(value_counts(column, values)),
            ColumnKind::Other => {}
        }
    }

    SummaryReport {
        feature_count: collection.len(),
        null_geometry_count,
        geometry_types,
        total_bounds: collection.total_bounds(),
        areas,
        numeric,
        categorical,
    }
}

/// `collection` expressed in the CRS of `target`, reprojected if needed.
/// Without PROJ support a differing CRS is a [`EdwError::Projection`].
fn in_crs_of<'a>(
    collection: &'a FeatureCollection,
    target: &FeatureCollection,
) -> Result<Cow<'a, FeatureCollection>> {
    match (&collection.crs, &target.crs) {
        (None, None) => Ok(Cow::Borrowed(collection)),
        (Some(from), Some(to)) if from.same_as(to) => Ok(Cow::Borrowed(collection)),
        (Some(from), Some(to)) => {
            debug!(collection = %collection.name, %from, %to, "reprojecting to a common CRS");
            let geometries = reproject_all(collection.iter().map(|r| r.geometry.as_ref()), from, to)?;
            Ok(Cow::Owned(collection.with_geometries(geometries, Some(to.clone()))?))
        }
        _ => Err(EdwError::Projection(format!(
            "'{}' and '{}' cannot be combined: only one of them has a CRS",
            collection.name, target.name
        ))),
    }
}

/// Concatenate collections in the CRS of the first one; the others are
/// reprojected when their CRS differs. The schema is the union of all
/// schemas in first-seen order; missing attributes become null.
pub fn merge_datasets(collections: &[FeatureCollection]) -> Result<FeatureCollection> {
    let first = collections
        .first()
        .ok_or_else(|| EdwError::InvalidInput("No feature collections provided".to_string()))?;
    let aligned = collections
        .iter()
        .map(|fc| in_crs_of(fc, first))
        .collect::<Result<Vec<_>>>()?;

    let mut schema: Vec<String> = Vec::new();
    for fc in &aligned {
        for field in fc.schema() {
            if !schema.contains(field) {
                schema.push(field.clone());
            }
        }
    }

    let mut merged = FeatureCollection::new(first.name.clone(), first.crs.clone(), schema.clone());
    for fc in &aligned {
        let positions: Vec<Option<usize>> = schema
            .iter()
            .map(|field| fc.schema().iter().position(|f| f == field))
            .collect();
        for record in fc.iter() {
            let attributes = positions
                .iter()
                .map(|p| p.map_or(AttributeValue::Null, |i| record.attributes[i].clone()))
                .collect();
            merged.push(Record::new(record.geometry.clone(), attributes))?;
        }
    }

    info!(
        inputs = collections.len(),
        features = merged.len(),
        "merged datasets"
    );
    Ok(merged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialPredicate {
    Intersects,
    /// Left geometry contains the right one.
    Contains,
    /// Left geometry lies within the right one.
    Within,
}

impl FromStr for SpatialPredicate {
    type Err = EdwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersects" => Ok(SpatialPredicate::Intersects),
            "contains" => Ok(SpatialPredicate::Contains),
            "within" => Ok(SpatialPredicate::Within),
            other => Err(EdwError::InvalidInput(format!(
                "predicate must be intersects, contains or within (got '{other}')"
            ))),
        }
    }
}

impl SpatialPredicate {
    fn holds(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        let matrix = left.relate(right);
        match self {
            SpatialPredicate::Intersects => matrix.is_intersects(),
            SpatialPredicate::Contains => matrix.is_contains(),
            SpatialPredicate::Within => matrix.is_within(),
        }
    }
}

/// Which records survive a [`spatial_join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinHow {
    /// Only matching pairs.
    #[default]
    Inner,
    /// Every left record; unmatched ones get null right attributes.
    Left,
    /// Every right record; unmatched ones get null left attributes.
    Right,
}

impl FromStr for JoinHow {
    type Err = EdwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinHow::Inner),
            "left" => Ok(JoinHow::Left),
            "right" => Ok(JoinHow::Right),
            other => Err(EdwError::InvalidInput(format!(
                "join must be inner, left or right (got '{other}')"
            ))),
        }
    }
}

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Right-hand record indices matching each left record, in ascending order.
fn match_pairs(
    left: &FeatureCollection,
    right: &FeatureCollection,
    predicate: SpatialPredicate,
) -> Vec<Vec<usize>> {
    let envelopes: Vec<IndexedEnvelope> = right
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let b = BoundingBox::of_geometry(r.geometry.as_ref()?)?;
            Some(GeomWithData::new(
                Rectangle::from_corners([b.min_x, b.min_y], [b.max_x, b.max_y]),
                i,
            ))
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    left.iter()
        .map(|record| {
            let Some(geometry) = &record.geometry else {
                return Vec::new();
            };
            let Some(b) = BoundingBox::of_geometry(geometry) else {
                return Vec::new();
            };
            let query = AABB::from_corners([b.min_x, b.min_y], [b.max_x, b.max_y]);
            let mut candidates: Vec<usize> = tree
                .locate_in_envelope_intersecting(&query)
                .map(|env| env.data)
                .filter(|&i| {
                    right.records()[i]
                        .geometry
                        .as_ref()
                        .is_some_and(|other| predicate.holds(geometry, other))
                })
                .collect();
            candidates.sort_unstable();
            candidates
        })
        .collect()
}

/// Spatial join of `left` and `right`.
///
/// `right` is first reprojected to the CRS of `left` when they differ. Each
/// output row holds the left attributes, then the right attributes, then
/// `index_right` (the matching right record, null when there is none).
/// Right field names already used on the left are prefixed with `right_`.
/// Rows carry the left geometry, except for [`JoinHow::Right`] where they
/// carry the right one and follow right-hand order.
pub fn spatial_join(
    left: &FeatureCollection,
    right: &FeatureCollection,
    how: JoinHow,
    predicate: SpatialPredicate,
) -> Result<FeatureCollection> {
    let right = in_crs_of(right, left)?;
    let matches = match_pairs(left, &right, predicate);

    let mut schema = left.schema().to_vec();
    for field in right.schema() {
        if left.has_field(field) {
            schema.push(format!("right_{field}"));
        } else {
            schema.push(field.clone());
        }
    }
    schema.push("index_right".to_string());

    let row = |l: Option<usize>, r: Option<usize>| {
        let mut attributes = match l {
            Some(i) => left.records()[i].attributes.clone(),
            None => vec![AttributeValue::Null; left.schema().len()],
        };
        match r {
            Some(i) => attributes.extend(right.records()[i].attributes.iter().cloned()),
            None => attributes.extend(vec![AttributeValue::Null; right.schema().len()]),
        }
        attributes.push(r.map_or(AttributeValue::Null, |i| AttributeValue::Integer(i as i64)));
        attributes
    };

    let mut joined = FeatureCollection::new(left.name.clone(), left.crs.clone(), schema);
    match how {
        JoinHow::Inner | JoinHow::Left => {
            for (li, record) in left.iter().enumerate() {
                if matches[li].is_empty() && how == JoinHow::Left {
                    joined.push(Record::new(record.geometry.clone(), row(Some(li), None)))?;
                }
                for &ri in &matches[li] {
                    joined.push(Record::new(record.geometry.clone(), row(Some(li), Some(ri))))?;
                }
            }
        }
        JoinHow::Right => {
            let mut by_right: Vec<Vec<usize>> = vec![Vec::new(); right.len()];
            for (li, rights) in matches.iter().enumerate() {
                for &ri in rights {
                    by_right[ri].push(li);
                }
            }
            for (ri, record) in right.iter().enumerate() {
                if by_right[ri].is_empty() {
                    joined.push(Record::new(record.geometry.clone(), row(None, Some(ri))))?;
                }
                for &li in &by_right[ri] {
                    joined.push(Record::new(record.geometry.clone(), row(Some(li), Some(ri))))?;
                }
            }
        }
    }

    info!(
        left = left.len(),
        right = right.len(),
        rows = joined.len(),
        ?how,
        ?predicate,
        "spatial join"
    );
    Ok(joined)
}

/// Buffer every geometry by `distance` in `unit` (meters, kilometers, miles
/// or feet).
///
/// Buffers are built in CONUS Albers (EPSG:5070) and returned in the input
/// CRS, so any other CRS needs PROJ support. A collection with no CRS is a
/// [`EdwError::Projection`].
#[cfg(feature = "geos")]
pub fn create_buffer(
    collection: &FeatureCollection,
    distance: f64,
    unit: &str,
) -> Result<FeatureCollection> {
    let unit: LengthUnit = unit.parse()?;
    let meters = distance * unit.factor();
    let crs = collection.crs.as_ref().ok_or_else(|| {
        EdwError::Projection(format!(
            "'{}' has no CRS; cannot buffer in meters",
            collection.name
        ))
    })?;
    let albers = Crs::from_epsg(CONUS_ALBERS_EPSG);
    let in_albers = crs.same_as(&albers);

    let projected;
    let geometries: Vec<Option<&Geometry<f64>>> = if in_albers {
        collection.iter().map(|r| r.geometry.as_ref()).collect()
    } else {
        projected = reproject_all(collection.iter().map(|r| r.geometry.as_ref()), crs, &albers)?;
        projected.iter().map(Option::as_ref).collect()
    };

    let buffered = geometries
        .into_iter()
        .map(|g| g.map(|g| buffer_geometry(g, meters)).transpose())
        .collect::<Result<Vec<_>>>()?;
    let buffered = if in_albers {
        buffered
    } else {
        reproject_all(buffered.iter().map(Option::as_ref), &albers, crs)?
    };

    debug!(collection = %collection.name, meters, "buffered geometries");
    collection.with_geometries(buffered, collection.crs.clone())
}

#[cfg(feature = "geos")]
fn buffer_geometry(geometry: &Geometry<f64>, meters: f64) -> Result<Geometry<f64>> {
    use geos::Geom;

    let failed = |e: geos::Error| EdwError::InvalidInput(format!("Failed to buffer geometry: {e}"));
    let geos_geom: geos::Geometry = geometry.try_into().map_err(failed)?;
    let buffered = geos_geom.buffer(meters, 8).map_err(failed)?;
    buffered.try_into().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ])
    }

    /// Three 100 m and 200 m squares in CONUS Albers plus a record without geometry.
    fn treatments() -> FeatureCollection {
        let mut fc = FeatureCollection::new(
            "Actv_HazFuelTrt_PL",
            Some(Crs::from_epsg(CONUS_ALBERS_EPSG)),
            vec![
                "TREATMENT".to_string(),
                "FY".to_string(),
                "COST".to_string(),
            ],
        );
        let rows = [
            (Some(square(0.0, 0.0, 100.0)), "Burn", 2020, 10.0),
            (Some(square(1000.0, 0.0, 200.0)), "Thin", 2021, 20.0),
            (Some(square(5000.0, 5000.0, 100.0)), "Burn", 2021, 30.0),
            (None, "Mow", 2022, 40.0),
        ];
        for (geometry, treatment, fy, cost) in rows {
            fc.push(Record::new(
                geometry,
                vec![treatment.into(), fy.into(), cost.into()],
            ))
            .unwrap();
        }
        fc
    }

    #[test]
    fn test_area_unit_parse() {
        assert_eq!("sqkm".parse::<AreaUnit>().unwrap(), AreaUnit::SquareKilometers);
        assert_eq!("Acres".parse::<AreaUnit>().unwrap(), AreaUnit::Acres);
        assert!(matches!(
            "furlongs".parse::<AreaUnit>(),
            Err(EdwError::UnsupportedUnit(_))
        ));
    }

    #[test]
    fn test_calculate_area_projected() {
        let fc = calculate_area(&treatments(), "hectares").unwrap();
        let ha = |i| fc.value(i, "area_hectares").unwrap().as_f64().unwrap();
        assert!((ha(0) - 1.0).abs() < 1e-9);
        assert!((ha(1) - 4.0).abs() < 1e-9);
        assert!(fc.value(3, "area_hectares").unwrap().is_null());

        let acres = calculate_area(&fc, "acres").unwrap();
        let a = acres.value(0, "area_acres").unwrap().as_f64().unwrap();
        assert!((a - 2.47105).abs() < 1e-6);
    }

    #[test]
    fn test_calculate_area_is_idempotent() {
        let once = calculate_area(&treatments(), "square_meters").unwrap();
        let twice = calculate_area(&once, "square_meters").unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.schema().len(), 4);
    }

    #[test]
    fn test_calculate_area_non_areal_is_zero() {
        let mut fc = FeatureCollection::new("pts", Some(Crs::from_epsg(5070)), vec![]);
        fc.push(Record::new(Some(Geometry::Point(point!(x: 1.0, y: 1.0))), vec![]))
            .unwrap();
        let fc = calculate_area(&fc, "sqm").unwrap();
        assert_eq!(fc.value(0, "area_square_meters").unwrap(), &AttributeValue::Real(0.0));
    }

    #[test]
    fn test_calculate_area_errors() {
        assert!(matches!(
            calculate_area(&treatments(), "furlongs"),
            Err(EdwError::UnsupportedUnit(_))
        ));
        let mut no_crs = treatments();
        no_crs.crs = None;
        assert!(matches!(
            calculate_area(&no_crs, "acres"),
            Err(EdwError::Projection(_))
        ));
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn test_calculate_area_geographic_without_proj() {
        let mut fc = treatments();
        fc.crs = Some(Crs::wgs84());
        assert!(matches!(
            calculate_area(&fc, "acres"),
            Err(EdwError::Projection(_))
        ));
    }

    #[cfg(feature = "proj")]
    #[test]
    fn test_calculate_area_geographic_reprojects() {
        let mut fc = FeatureCollection::new("geo", Some(Crs::wgs84()), vec![]);
        fc.push(Record::new(Some(square(-100.0, 40.0, 0.01)), vec![])).unwrap();
        let fc = calculate_area(&fc, "hectares").unwrap();
        let ha = fc.value(0, "area_hectares").unwrap().as_f64().unwrap();
        // 0.01 degree square near 40N is roughly 95 ha
        assert!(ha > 80.0 && ha < 110.0, "{ha}");
    }

    #[test]
    fn test_filter_by_attribute() {
        let fc = treatments();
        let burns = filter_by_attribute(&fc, "TREATMENT", "Burn").unwrap();
        assert_eq!(burns.len(), 2);
        assert_eq!(burns.schema(), fc.schema());

        let fy = filter_by_attribute(&fc, "FY", 2021.0).unwrap();
        assert_eq!(fy.len(), 2);

        let several =
            filter_by_attribute_in(&fc, "TREATMENT", &["Thin".into(), "Mow".into()]).unwrap();
        assert_eq!(several.len(), 2);

        assert!(matches!(
            filter_by_attribute(&fc, "NOPE", 1),
            Err(EdwError::MissingField(ref f)) if f == "NOPE"
        ));
    }

    #[test]
    fn test_filter_by_bounds() {
        let fc = treatments();
        let near_origin = filter_by_bounds(&fc, BoundingBox::new(-10.0, -10.0, 1100.0, 50.0));
        assert_eq!(near_origin.len(), 2);
        let nothing = filter_by_bounds(&fc, BoundingBox::new(-100.0, -100.0, -50.0, -50.0));
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_filter_by_total_bounds_keeps_everything() {
        let with_geometry = treatments().filter(|r| r.geometry.is_some());
        let extent = with_geometry.total_bounds().unwrap();
        assert_eq!(filter_by_bounds(&with_geometry, extent).len(), with_geometry.len());

        // The record without geometry is the only one dropped
        let fc = treatments();
        assert_eq!(filter_by_bounds(&fc, fc.total_bounds().unwrap()).len(), fc.len() - 1);
    }

    #[test]
    fn test_linear_quantile() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(linear_quantile(&values, 0.0), 1.0);
        assert_eq!(linear_quantile(&values, 0.25), 2.0);
        assert!((linear_quantile(&values, 0.9) - 4.6).abs() < 1e-12);
        assert_eq!(linear_quantile(&values, 1.0), 5.0);
        assert_eq!(linear_quantile(&[7.0], 0.75), 7.0);
    }

    #[test]
    fn test_summary_statistics() {
        let fc = calculate_area(&treatments(), "hectares").unwrap();
        let report = get_summary_statistics(&fc);

        assert_eq!(report.feature_count, 4);
        assert_eq!(report.null_geometry_count, 1);
        assert_eq!(report.geometry_types.get("Polygon"), Some(&3));
        assert_eq!(report.total_bounds, Some(BoundingBox::new(0.0, 0.0, 5100.0, 5100.0)));

        let area = &report.areas[0];
        assert_eq!(area.column, "area_hectares");
        assert!((area.total - 6.0).abs() < 1e-9);
        assert!((area.mean - 2.0).abs() < 1e-9);

        let cost = report.numeric_column("COST").unwrap();
        assert_eq!(cost.count, 4);
        assert_eq!(cost.mean, 25.0);
        assert_eq!(cost.min, 10.0);
        assert_eq!(cost.max, 40.0);
        assert_eq!(cost.median, 25.0);
        assert_eq!(cost.q25, 17.5);
        assert_eq!(cost.q75, 32.5);
        assert!((cost.std - 12.909944487358056).abs() < 1e-9);

        let treatments = report.value_counts("TREATMENT").unwrap();
        assert_eq!(
            treatments.counts,
            vec![
                ("Burn".to_string(), 2),
                ("Mow".to_string(), 1),
                ("Thin".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_merge_datasets() {
        let a = treatments();
        let mut b = FeatureCollection::new(
            "other",
            Some(Crs::from_epsg(CONUS_ALBERS_EPSG)),
            vec!["TREATMENT".to_string(), "AGENCY".to_string()],
        );
        b.push(Record::new(None, vec!["Plant".into(), "USFS".into()]))
            .unwrap();

        let merged = merge_datasets(&[a.clone(), b]).unwrap();
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.schema(), ["TREATMENT", "FY", "COST", "AGENCY"]);
        assert!(merged.value(0, "AGENCY").unwrap().is_null());
        assert_eq!(merged.value(4, "TREATMENT").unwrap().as_str(), Some("Plant"));

        assert!(matches!(merge_datasets(&[]), Err(EdwError::InvalidInput(_))));

        let mut no_crs = a.clone();
        no_crs.crs = None;
        assert!(matches!(merge_datasets(&[a, no_crs]), Err(EdwError::Projection(_))));
    }

    fn wgs84_point(lon: f64, lat: f64) -> FeatureCollection {
        let mut fc = FeatureCollection::new("wgs", Some(Crs::wgs84()), vec!["TREATMENT".to_string()]);
        fc.push(Record::new(
            Some(Geometry::Point(point!(x: lon, y: lat))),
            vec!["Plant".into()],
        ))
        .unwrap();
        fc
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn test_merge_mixed_crs_without_proj() {
        assert!(matches!(
            merge_datasets(&[treatments(), wgs84_point(-105.0, 40.0)]),
            Err(EdwError::Projection(_))
        ));
    }

    #[cfg(feature = "proj")]
    #[test]
    fn test_merge_reprojects_to_first_crs() {
        let merged = merge_datasets(&[treatments(), wgs84_point(-105.0, 40.0)]).unwrap();
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.crs.as_ref().unwrap().epsg, Some(CONUS_ALBERS_EPSG));
        let Some(Geometry::Point(p)) = &merged.records()[4].geometry else {
            panic!("expected a point");
        };
        // Colorado sits roughly 800 km west of the Albers central meridian
        assert!(p.x() < -500_000.0 && p.x() > -1_200_000.0, "{p:?}");
        assert!(p.y() > 1_500_000.0 && p.y() < 2_300_000.0, "{p:?}");
    }

    #[test]
    fn test_spatial_join() {
        let left = treatments();
        let mut zones = FeatureCollection::new(
            "zones",
            Some(Crs::from_epsg(CONUS_ALBERS_EPSG)),
            vec!["ZONE".to_string(), "FY".to_string()],
        );
        zones
            .push(Record::new(Some(square(-50.0, -50.0, 2000.0)), vec!["West".into(), 1999.into()]))
            .unwrap();
        zones
            .push(Record::new(Some(square(4000.0, 4000.0, 50.0)), vec!["Far".into(), 1998.into()]))
            .unwrap();

        let within = spatial_join(&left, &zones, JoinHow::Inner, SpatialPredicate::Within).unwrap();
        assert_eq!(within.len(), 2);
        assert_eq!(
            within.schema(),
            ["TREATMENT", "FY", "COST", "ZONE", "right_FY", "index_right"]
        );
        assert_eq!(within.value(0, "ZONE").unwrap().as_str(), Some("West"));
        assert_eq!(within.value(1, "index_right").unwrap(), &AttributeValue::Integer(0));

        let contains = spatial_join(&zones, &left, JoinHow::Inner, SpatialPredicate::Contains).unwrap();
        assert_eq!(contains.len(), 2);

        let intersects = spatial_join(
            &left,
            &zones,
            "inner".parse().unwrap(),
            "intersects".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(intersects.len(), 2);
    }

    fn zones() -> FeatureCollection {
        let mut zones = FeatureCollection::new(
            "zones",
            Some(Crs::from_epsg(CONUS_ALBERS_EPSG)),
            vec!["ZONE".to_string()],
        );
        zones
            .push(Record::new(Some(square(-50.0, -50.0, 2000.0)), vec!["West".into()]))
            .unwrap();
        zones
            .push(Record::new(Some(square(9000.0, 9000.0, 50.0)), vec!["Empty".into()]))
            .unwrap();
        zones
    }

    #[test]
    fn test_spatial_join_left_keeps_unmatched() {
        let joined = spatial_join(&treatments(), &zones(), JoinHow::Left, SpatialPredicate::Intersects)
            .unwrap();
        // Two squares fall in West; the far square and the geometry-less record do not match
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.value(0, "ZONE").unwrap().as_str(), Some("West"));
        assert_eq!(joined.value(2, "TREATMENT").unwrap().as_str(), Some("Burn"));
        assert!(joined.value(2, "ZONE").unwrap().is_null());
        assert!(joined.value(2, "index_right").unwrap().is_null());
        assert!(joined.records()[3].geometry.is_none());
    }

    #[test]
    fn test_spatial_join_right_keeps_unmatched() {
        let joined = spatial_join(&treatments(), &zones(), JoinHow::Right, SpatialPredicate::Intersects)
            .unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.value(0, "TREATMENT").unwrap().as_str(), Some("Burn"));
        assert_eq!(joined.value(1, "TREATMENT").unwrap().as_str(), Some("Thin"));
        assert_eq!(joined.records()[0].geometry, Some(square(-50.0, -50.0, 2000.0)));

        assert!(joined.value(2, "TREATMENT").unwrap().is_null());
        assert_eq!(joined.value(2, "ZONE").unwrap().as_str(), Some("Empty"));
        assert_eq!(joined.value(2, "index_right").unwrap(), &AttributeValue::Integer(1));

        assert!("outer".parse::<JoinHow>().is_err());
    }

    #[cfg(feature = "proj")]
    #[test]
    fn test_spatial_join_reprojects_right() {
        let mut zone = FeatureCollection::new("zone", Some(Crs::wgs84()), vec!["ZONE".to_string()]);
        zone.push(Record::new(Some(square(-106.0, 39.0, 2.0)), vec!["Front Range".into()]))
            .unwrap();
        let plant = merge_datasets(&[treatments(), wgs84_point(-105.0, 40.0)])
            .unwrap()
            .filter(|r| r.attributes[0].as_str() == Some("Plant"));

        let joined = spatial_join(&plant, &zone, JoinHow::Inner, SpatialPredicate::Within).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.crs.as_ref().unwrap().epsg, Some(CONUS_ALBERS_EPSG));
        assert_eq!(joined.value(0, "ZONE").unwrap().as_str(), Some("Front Range"));
    }

    #[test]
    fn test_length_unit_parse() {
        assert_eq!("km".parse::<LengthUnit>().unwrap(), LengthUnit::Kilometers);
        assert_eq!("Feet".parse::<LengthUnit>().unwrap().factor(), 0.3048);
        assert!(matches!(
            "furlongs".parse::<LengthUnit>(),
            Err(EdwError::UnsupportedUnit(_))
        ));
    }

    #[cfg(feature = "geos")]
    #[test]
    fn test_create_buffer_in_albers() {
        let mut fc = FeatureCollection::new(
            "pts",
            Some(Crs::from_epsg(CONUS_ALBERS_EPSG)),
            vec!["ID".to_string()],
        );
        fc.push(Record::new(Some(Geometry::Point(point!(x: 0.0, y: 0.0))), vec![1.into()]))
            .unwrap();
        fc.push(Record::new(None, vec![2.into()])).unwrap();

        let circle_area = std::f64::consts::PI * 100.0 * 100.0;
        for (distance, unit) in [(100.0, "meters"), (0.1, "kilometers"), (328.084, "feet")] {
            let buffered = create_buffer(&fc, distance, unit).unwrap();
            let area = buffered.records()[0].geometry.as_ref().unwrap().unsigned_area();
            assert!((area - circle_area).abs() / circle_area < 0.02, "{unit}: {area}");
            assert!(buffered.records()[1].geometry.is_none());
            assert_eq!(buffered.schema(), fc.schema());
        }

        assert!(matches!(
            create_buffer(&fc, 1.0, "furlongs"),
            Err(EdwError::UnsupportedUnit(_))
        ));
        let mut no_crs = fc.clone();
        no_crs.crs = None;
        assert!(matches!(
            create_buffer(&no_crs, 1.0, "meters"),
            Err(EdwError::Projection(_))
        ));
    }

    #[cfg(all(feature = "geos", feature = "proj"))]
    #[test]
    fn test_create_buffer_geographic_round_trip() {
        let buffered = create_buffer(&wgs84_point(-105.0, 40.0), 1.0, "miles").unwrap();
        assert!(buffered.crs.as_ref().unwrap().is_wgs84());
        let geometry = buffered.records()[0].geometry.as_ref().unwrap();
        assert_eq!(geometry_type(geometry), "Polygon");
        let bounds = BoundingBox::of_geometry(geometry).unwrap();
        // A 1 mile radius spans about 0.03 degrees of latitude
        assert!(bounds.height() > 0.025 && bounds.height() < 0.035, "{bounds}");
        assert!(bounds.min_x < -105.0 && bounds.max_x > -105.0);
    }
}
