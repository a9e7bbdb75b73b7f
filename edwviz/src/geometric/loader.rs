//! Open extracted shapefiles, file geodatabases and GeoJSON files as a
//! [`FeatureCollection`].
//!
//! Shapefile and geodatabase access goes through GDAL and needs the `gdal`
//! feature. GeoJSON is read with the `geojson` crate and always available.
//! A layer with zero features is an [`EdwError::EmptyDataset`].

use std::fs;
use std::path::{Path, PathBuf};

use geo::Geometry;
use geojson::GeoJson;
use tracing::info;

use crate::collect::edw::LocalDatasetHandle;
use crate::collect::global_variables::MANIFEST_NAME;
use crate::commons::basic_functions::{find_dirs_with_extension, find_files_with_extension};
use crate::error::{EdwError, Result};
use crate::geo_core::Crs;
use crate::geometric::feature_collection::{AttributeValue, FeatureCollection, Record};

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Load whatever `path` points at: a `.shp`, a `.gdb` directory, a
/// `.geojson`/`.json` file, or a directory holding one of those (searched
/// recursively in that order).
pub fn load(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EdwError::Load(format!("{} does not exist", path.display())));
    }

    if path.is_dir() && has_extension(path, "gdb") {
        return read_geodatabase(path, None);
    }
    if path.is_file() {
        if has_extension(path, "shp") {
            return read_shapefile(path);
        }
        if has_extension(path, "geojson") || has_extension(path, "json") {
            return load_geojson(path);
        }
        return Err(EdwError::Load(format!(
            "{} is not a shapefile, geodatabase or GeoJSON file",
            path.display()
        )));
    }

    if let Some(shp) = find_files_with_extension(path, "shp")?.into_iter().next() {
        return read_shapefile(&shp);
    }
    if let Some(gdb) = find_dirs_with_extension(path, "gdb")?.into_iter().next() {
        return read_geodatabase(&gdb, None);
    }
    let mut geojson = find_files_with_extension(path, "geojson")?;
    if geojson.is_empty() {
        geojson = find_files_with_extension(path, "json")?;
        geojson.retain(|p| !p.ends_with(MANIFEST_NAME));
    }
    if let Some(file) = geojson.into_iter().next() {
        return load_geojson(&file);
    }

    Err(EdwError::Load(format!(
        "no shapefile, geodatabase or GeoJSON layer found in {}",
        path.display()
    )))
}

/// Load the dataset a download produced.
pub fn load_dataset(handle: &LocalDatasetHandle) -> Result<FeatureCollection> {
    load(handle.layer_path()?)
}

/// Load `<dir>/<name>.shp`, or the first shapefile directly inside `dir`.
pub fn load_shapefile(dir: impl AsRef<Path>, name: Option<&str>) -> Result<FeatureCollection> {
    let dir = dir.as_ref();
    let shp_path = match name {
        Some(name) => dir.join(format!("{name}.shp")),
        None => first_direct_child(dir, "shp", false)?
            .ok_or_else(|| EdwError::Load(format!("No shapefile found in {}", dir.display())))?,
    };
    if !shp_path.is_file() {
        return Err(EdwError::Load(format!(
            "Shapefile not found: {}",
            shp_path.display()
        )));
    }
    read_shapefile(&shp_path)
}

/// Load `layer` (or the first layer) from the first `.gdb` directly inside `dir`.
/// `dir` may also be the `.gdb` itself.
pub fn load_geodatabase(dir: impl AsRef<Path>, layer: Option<&str>) -> Result<FeatureCollection> {
    let dir = dir.as_ref();
    let gdb_path = if has_extension(dir, "gdb") && dir.is_dir() {
        dir.to_path_buf()
    } else {
        first_direct_child(dir, "gdb", true)?
            .ok_or_else(|| EdwError::Load(format!("No geodatabase found in {}", dir.display())))?
    };
    read_geodatabase(&gdb_path, layer)
}

fn first_direct_child(dir: &Path, ext: &str, want_dir: bool) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| has_extension(p, ext) && p.is_dir() == want_dir)
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

/// Read a GeoJSON FeatureCollection. The CRS is WGS 84 unless a legacy
/// `crs` member names an EPSG code.
pub fn load_geojson(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading GeoJSON");
    let raw = fs::read_to_string(path)?;
    let geojson: GeoJson = raw
        .parse()
        .map_err(|e| EdwError::Load(format!("{}: {e}", path.display())))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => geojson::FeatureCollection {
            bbox: None,
            features: vec![f],
            foreign_members: None,
        },
        GeoJson::Geometry(g) => geojson::FeatureCollection {
            bbox: None,
            features: vec![geojson::Feature::from(g)],
            foreign_members: None,
        },
    };

    let crs = collection
        .foreign_members
        .as_ref()
        .and_then(legacy_crs)
        .unwrap_or_else(Crs::wgs84);

    let mut schema: Vec<String> = Vec::new();
    for feature in &collection.features {
        for key in feature.properties.iter().flat_map(|p| p.keys()) {
            if !schema.contains(key) {
                schema.push(key.clone());
            }
        }
    }

    let name = file_stem(path);
    if collection.features.is_empty() {
        return Err(EdwError::EmptyDataset(name));
    }

    let mut out = FeatureCollection::new(name, Some(crs), schema.clone());
    for feature in collection.features {
        let geometry = feature
            .geometry
            .map(Geometry::<f64>::try_from)
            .transpose()
            .map_err(|e| EdwError::Load(format!("{}: {e}", path.display())))?;
        let attributes = schema
            .iter()
            .map(|key| {
                feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(key))
                    .map(AttributeValue::from_json)
                    .unwrap_or(AttributeValue::Null)
            })
            .collect();
        out.push(Record::new(geometry, attributes))?;
    }

    info!(features = out.len(), "GeoJSON loaded");
    Ok(out)
}

/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::5070"}}`
fn legacy_crs(members: &geojson::JsonObject) -> Option<Crs> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(Crs::wgs84());
    }
    let code = name.rsplit(':').next()?.parse::<u32>().ok()?;
    Some(Crs::from_epsg(code))
}

#[cfg(feature = "gdal")]
mod gdal_reader {
    use gdal::vector::{FieldValue, LayerAccess};
    use gdal::Dataset;
    use tracing::debug;

    use super::*;

    pub fn open(path: &Path) -> Result<Dataset> {
        Dataset::open(path).map_err(|e| EdwError::Load(format!("{}: {e}", path.display())))
    }

    pub fn list_layers(path: &Path) -> Result<Vec<String>> {
        let dataset = open(path)?;
        Ok(dataset.layers().map(|layer| layer.name()).collect())
    }

    fn crs_of(srs: &gdal::spatial_ref::SpatialRef) -> Crs {
        let wkt = srs.to_wkt().ok();
        let epsg = srs.auth_code().ok().and_then(|code| u32::try_from(code).ok());
        Crs {
            epsg,
            wkt,
            geographic: srs.is_geographic(),
        }
    }

    fn attribute(value: Option<FieldValue>) -> AttributeValue {
        match value {
            None => AttributeValue::Null,
            Some(FieldValue::IntegerValue(v)) => AttributeValue::Integer(v.into()),
            Some(FieldValue::Integer64Value(v)) => AttributeValue::Integer(v),
            Some(FieldValue::RealValue(v)) => AttributeValue::Real(v),
            Some(FieldValue::StringValue(v)) => AttributeValue::Text(v),
            Some(FieldValue::DateValue(v)) => AttributeValue::Date(v),
            Some(FieldValue::DateTimeValue(v)) => AttributeValue::DateTime(v),
            Some(other) => AttributeValue::Text(format!("{other:?}")),
        }
    }

    pub fn read_layer(path: &Path, layer_name: Option<&str>) -> Result<FeatureCollection> {
        let dataset = open(path)?;
        let mut layer = match layer_name {
            Some(name) => dataset.layer_by_name(name).map_err(|_| {
                let available: Vec<String> = dataset.layers().map(|l| l.name()).collect();
                EdwError::Load(format!(
                    "Layer '{name}' not found. Available layers: {}",
                    available.join(", ")
                ))
            })?,
            None => dataset
                .layer(0)
                .map_err(|e| EdwError::Load(format!("No layers found in {}: {e}", path.display())))?,
        };

        let name = layer.name();
        let crs = layer.spatial_ref().map(|srs| crs_of(&srs));
        let schema: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();
        debug!(layer = %name, fields = schema.len(), crs = ?crs.as_ref().map(|c| c.to_string()), "opened layer");

        let mut out = FeatureCollection::new(name.clone(), crs, schema.clone());
        for feature in layer.features() {
            let attributes = schema
                .iter()
                .map(|field| attribute(feature.field(field.as_str()).ok().flatten()))
                .collect();
            let geometry = feature
                .geometry()
                .map(|g| g.to_geo())
                .transpose()
                .map_err(|e| EdwError::Load(format!("layer '{name}': {e}")))?;
            out.push(Record::new(geometry, attributes))?;
        }

        if out.is_empty() {
            return Err(EdwError::EmptyDataset(name));
        }
        info!(layer = %out.name, features = out.len(), "layer loaded");
        Ok(out)
    }
}

/// Layer names inside a geodatabase (or any multi-layer GDAL source).
#[cfg(feature = "gdal")]
pub fn list_layers(gdb_path: impl AsRef<Path>) -> Result<Vec<String>> {
    gdal_reader::list_layers(gdb_path.as_ref())
}

#[cfg(not(feature = "gdal"))]
pub fn list_layers(gdb_path: impl AsRef<Path>) -> Result<Vec<String>> {
    Err(no_gdal(gdb_path.as_ref()))
}

#[cfg(not(feature = "gdal"))]
fn no_gdal(path: &Path) -> EdwError {
    EdwError::Load(format!(
        "{}: built without GDAL support (enable the `gdal` feature)",
        path.display()
    ))
}

fn read_shapefile(shp_path: &Path) -> Result<FeatureCollection> {
    info!(path = %shp_path.display(), "loading shapefile");
    #[cfg(feature = "gdal")]
    {
        gdal_reader::read_layer(shp_path, None)
    }
    #[cfg(not(feature = "gdal"))]
    {
        Err(no_gdal(shp_path))
    }
}

fn read_geodatabase(gdb_path: &Path, layer: Option<&str>) -> Result<FeatureCollection> {
    info!(path = %gdb_path.display(), layer, "loading geodatabase");
    #[cfg(feature = "gdal")]
    {
        gdal_reader::read_layer(gdb_path, layer)
    }
    #[cfg(not(feature = "gdal"))]
    {
        Err(no_gdal(gdb_path))
    }
}
