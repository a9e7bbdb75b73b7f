use std::fs;

use edwviz::geometric::{analysis, export, loader};
use edwviz::visualize::{ColorMap, InteractiveMap, MapConfig};
use edwviz::EdwError;
use tempfile::TempDir;

// Two 1 km squares in CONUS Albers.
const ALBERS_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::5070"}},
  "features": [
    {"type": "Feature", "properties": {"ACTIVITY": "Thin", "UNITS": 3},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1000,0],[1000,1000],[0,1000],[0,0]]]}},
    {"type": "Feature", "properties": {"ACTIVITY": "Burn", "UNITS": 5},
     "geometry": {"type": "Polygon", "coordinates": [[[5000,0],[6000,0],[6000,1000],[5000,1000],[5000,0]]]}}
  ]
}"#;

const LONLAT_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"ACTIVITY": "Thin <stand 4>"},
     "geometry": {"type": "Point", "coordinates": [-105.5, 40.0]}},
    {"type": "Feature", "properties": {"ACTIVITY": "Burn"},
     "geometry": {"type": "Point", "coordinates": [-104.5, 41.0]}}
  ]
}"#;

#[test]
fn test_load_measure_filter_export() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("harvest.geojson");
    fs::write(&input, ALBERS_GEOJSON).unwrap();

    let harvest = loader::load(&input).unwrap();
    assert_eq!(harvest.len(), 2);
    assert_eq!(harvest.crs.as_ref().and_then(|c| c.epsg), Some(5070));

    let with_area = analysis::calculate_area(&harvest, "hectares").unwrap();
    let report = analysis::get_summary_statistics(&with_area);
    let area = report.numeric_column("area_hectares").unwrap();
    assert!((area.mean - 100.0).abs() < 1e-6);
    assert_eq!(report.feature_count, 2);

    let thinned = analysis::filter_by_attribute(&with_area, "ACTIVITY", "Thin").unwrap();
    assert_eq!(thinned.len(), 1);

    let output = tmp.path().join("out").join("thinned.geojson");
    export::export_to_geojson(&thinned, &output).unwrap();
    let reloaded = loader::load(&output).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.has_field("area_hectares"));
}

#[test]
fn test_unknown_unit_and_missing_field() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("harvest.geojson");
    fs::write(&input, ALBERS_GEOJSON).unwrap();
    let harvest = loader::load(&input).unwrap();

    assert!(matches!(
        analysis::calculate_area(&harvest, "furlongs"),
        Err(EdwError::UnsupportedUnit(_))
    ));
    assert!(analysis::filter_by_attribute(&harvest, "NOPE", "x").is_err());
}

#[test]
fn test_interactive_map_from_geojson() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("points.geojson");
    fs::write(&input, LONLAT_GEOJSON).unwrap();
    let points = loader::load(&input).unwrap();

    let output = tmp.path().join("maps").join("points.html");
    let config = MapConfig::new("Treatments", &output)
        .with_color_column("ACTIVITY", ColorMap::Categorical)
        .with_popup_fields(["ACTIVITY"]);
    let saved = InteractiveMap::new(config).save(&points).unwrap();

    assert_eq!(saved, output);
    let html = fs::read_to_string(&saved).unwrap();
    assert!(html.contains("Treatments"));
    assert!(html.contains("Thin &lt;stand 4&gt;"));
}
