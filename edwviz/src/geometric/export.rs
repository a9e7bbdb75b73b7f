use std::borrow::Cow;
use std::fs;
use std::path::Path;

use geojson::{Feature, GeoJson, JsonObject};
#[cfg(feature = "polars")]
use polars::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
#[cfg(feature = "polars")]
use crate::error::EdwError;
use crate::geo_core::{reproject_all, Crs};
#[cfg(feature = "polars")]
use crate::geometric::feature_collection::AttributeValue;
use crate::geometric::feature_collection::FeatureCollection;

/// Convert to a GeoJSON FeatureCollection with coordinates written as they
/// are. Only WGS 84 input gives RFC 7946 output; any other CRS with an EPSG
/// code is recorded in the legacy `crs` member. A CRS known only by WKT
/// cannot be recorded and is dropped with a warning.
pub fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|record| {
            let properties: JsonObject = collection
                .schema()
                .iter()
                .zip(&record.attributes)
                .map(|(field, value)| (field.clone(), value.to_json()))
                .collect();
            Feature {
                bbox: None,
                geometry: record
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let crs = collection.crs.as_ref().filter(|crs| !crs.is_wgs84());
    if let Some(crs) = crs.filter(|crs| crs.epsg.is_none()) {
        warn!(
            collection = %collection.name,
            %crs,
            "CRS has no EPSG code and is not written; readers will assume WGS 84"
        );
    }

    let foreign_members = crs.and_then(|crs| crs.epsg).map(|epsg| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": format!("urn:ogc:def:crs:EPSG::{epsg}")}}),
        );
        members.insert("name".to_string(), Value::String(collection.name.clone()));
        members
    });

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Collection in WGS 84 when PROJ is available; unchanged otherwise.
fn for_export(collection: &FeatureCollection) -> Result<Cow<'_, FeatureCollection>> {
    match &collection.crs {
        Some(crs) if cfg!(feature = "proj") && !crs.is_wgs84() => {
            debug!(from = %crs, "reprojecting to WGS 84 for export");
            let wgs84 = Crs::wgs84();
            let geometries =
                reproject_all(collection.iter().map(|r| r.geometry.as_ref()), crs, &wgs84)?;
            Ok(Cow::Owned(collection.with_geometries(geometries, Some(wgs84))?))
        }
        _ => Ok(Cow::Borrowed(collection)),
    }
}

/// Write `collection` as GeoJSON, creating parent directories.
///
/// With the `proj` feature the output is reprojected to WGS 84 and so is
/// RFC 7946 GeoJSON. Without it, coordinates keep their CRS as described
/// for [`to_geojson`].
pub fn export_to_geojson(collection: &FeatureCollection, output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let geojson = GeoJson::from(to_geojson(&*for_export(collection)?));
    fs::write(output_path, geojson.to_string())?;

    info!(path = %output_path.display(), features = collection.len(), "exported GeoJSON");
    Ok(())
}

#[cfg(feature = "polars")]
fn attribute_column(name: &str, values: Vec<&AttributeValue>) -> Column {
    let non_null = || values.iter().filter(|v| !v.is_null());
    let name: PlSmallStr = name.into();

    if non_null().all(|v| matches!(v, AttributeValue::Integer(_))) {
        let data: Vec<Option<i64>> = values
            .iter()
            .map(|v| match v {
                AttributeValue::Integer(i) => Some(*i),
                _ => None,
            })
            .collect();
        Column::new(name, data)
    } else if non_null().all(|v| v.as_f64().is_some()) {
        let data: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
        Column::new(name, data)
    } else if non_null().all(|v| matches!(v, AttributeValue::Bool(_))) {
        let data: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                AttributeValue::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        Column::new(name, data)
    } else {
        let data: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        Column::new(name, data)
    }
}

/// Attribute table as a polars DataFrame, plus a `geometry_type` column.
#[cfg(feature = "polars")]
pub fn to_polars_df(collection: &FeatureCollection) -> Result<DataFrame> {
    use crate::geometric::analysis::geometry_type;

    let mut columns: Vec<Column> = collection
        .schema()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let values = collection.iter().map(|r| &r.attributes[idx]).collect();
            attribute_column(field, values)
        })
        .collect();

    let geometry_types: Vec<Option<&str>> = collection
        .iter()
        .map(|r| r.geometry.as_ref().map(geometry_type))
        .collect();
    columns.push(Column::new("geometry_type".into(), geometry_types));

    DataFrame::new(columns)
        .map_err(|e| EdwError::InvalidInput(format!("Failed to create DataFrame: {e}")))
}
