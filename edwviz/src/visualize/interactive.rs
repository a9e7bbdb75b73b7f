use std::fs;
use std::path::{Path, PathBuf};

use geo::Centroid;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{EdwError, Result};
use crate::geo_core::{reproject_all, BoundingBox, Crs};
use crate::geometric::export::to_geojson;
use crate::geometric::feature_collection::FeatureCollection;
use crate::visualize::style::{BaseTiles, ColorMap, ColorScale};

const LEAFLET_VERSION: &str = "1.9.4";

/// Styling and output options for [`InteractiveMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub title: String,
    /// Attribute driving the fill colour; `None` paints everything `default_color`.
    pub color_column: Option<String>,
    pub color_map: ColorMap,
    pub default_color: String,
    pub fill_opacity: f64,
    pub popup_fields: Vec<String>,
    pub tooltip_fields: Vec<String>,
    /// Initial zoom; `None` fits the data bounds.
    pub zoom_start: Option<u8>,
    pub tiles: BaseTiles,
    /// Map size in pixels (width, height); `None` fills the window.
    pub figure_size: Option<(u32, u32)>,
    pub output_path: PathBuf,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            title: "USDA Forest Service Data".to_string(),
            color_column: None,
            color_map: ColorMap::default(),
            default_color: "#3388ff".to_string(),
            fill_opacity: 0.6,
            popup_fields: Vec::new(),
            tooltip_fields: Vec::new(),
            zoom_start: Some(6),
            tiles: BaseTiles::default(),
            figure_size: None,
            output_path: PathBuf::from("map.html"),
        }
    }
}

impl MapConfig {
    pub fn new(title: impl Into<String>, output_path: impl AsRef<Path>) -> Self {
        MapConfig {
            title: title.into(),
            output_path: output_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_color_column(mut self, column: impl Into<String>, color_map: ColorMap) -> Self {
        self.color_column = Some(column.into());
        self.color_map = color_map;
        self
    }

    pub fn with_popup_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.popup_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tooltip_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.tooltip_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tiles(mut self, tiles: BaseTiles) -> Self {
        self.tiles = tiles;
        self
    }

    pub fn with_fill_opacity(mut self, fill_opacity: f64) -> Self {
        self.fill_opacity = fill_opacity;
        self
    }

    pub fn with_zoom_start(mut self, zoom_start: Option<u8>) -> Self {
        self.zoom_start = zoom_start;
        self
    }

    pub fn with_figure_size(mut self, width: u32, height: u32) -> Self {
        self.figure_size = Some((width, height));
        self
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON embedded in a `<script>` block must not close it early.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// Leaflet map written as a single self-contained HTML page.
///
/// Every feature carries its fill colour and its popup/tooltip markup as
/// `_color`, `_popup` and `_tooltip` properties in the embedded GeoJSON.
pub struct InteractiveMap {
    config: MapConfig,
}

impl InteractiveMap {
    pub fn new(config: MapConfig) -> Self {
        InteractiveMap { config }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Reproject to WGS 84 unless the collection is already in a lon/lat CRS.
    fn to_web_crs(collection: &FeatureCollection) -> Result<FeatureCollection> {
        let crs = collection.crs.as_ref().ok_or_else(|| {
            EdwError::Projection(format!(
                "'{}' has no CRS; cannot place it on a web map",
                collection.name
            ))
        })?;
        if crs.is_geographic() {
            return Ok(collection.clone());
        }
        let wgs84 = Crs::wgs84();
        let geometries = reproject_all(collection.iter().map(|r| r.geometry.as_ref()), crs, &wgs84)?;
        collection.with_geometries(geometries, Some(wgs84))
    }

    fn center(collection: &FeatureCollection) -> Option<(f64, f64)> {
        let centroids: Vec<_> = collection
            .iter()
            .filter_map(|r| r.geometry.as_ref().and_then(|g| g.centroid()))
            .collect();
        if centroids.is_empty() {
            return None;
        }
        let n = centroids.len() as f64;
        let lat = centroids.iter().map(|p| p.y()).sum::<f64>() / n;
        let lon = centroids.iter().map(|p| p.x()).sum::<f64>() / n;
        Some((lat, lon))
    }

    fn field_rows(collection: &FeatureCollection, record: usize, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .filter_map(|field| {
                let value = collection.value(record, field).ok()?;
                Some(format!(
                    "<b>{}:</b> {}",
                    escape_html(field),
                    escape_html(&value.to_string())
                ))
            })
            .collect()
    }

    fn feature_layer(&self, collection: &FeatureCollection) -> Result<(Value, Vec<(String, String)>)> {
        let config = &self.config;
        let scale = match &config.color_column {
            Some(column) => Some(ColorScale::build(
                &config.color_map,
                collection.column(column)?,
                &config.default_color,
            )),
            None => None,
        };

        let mut geojson = to_geojson(collection);
        for (idx, feature) in geojson.features.iter_mut().enumerate() {
            let color = match (&scale, &config.color_column) {
                (Some(scale), Some(column)) => scale.color_for(collection.value(idx, column)?),
                _ => config.default_color.clone(),
            };
            let popup = Self::field_rows(collection, idx, &config.popup_fields);
            let tooltip = Self::field_rows(collection, idx, &config.tooltip_fields);

            let properties = feature.properties.get_or_insert_with(Default::default);
            properties.insert("_color".to_string(), Value::String(color));
            properties.insert(
                "_popup".to_string(),
                if popup.is_empty() {
                    Value::Null
                } else {
                    Value::String(format!(
                        "<div style='width: 200px'>{}</div>",
                        popup.join("<br>")
                    ))
                },
            );
            properties.insert(
                "_tooltip".to_string(),
                if tooltip.is_empty() {
                    Value::Null
                } else {
                    Value::String(tooltip.join("<br>"))
                },
            );
        }
        geojson.foreign_members = None;

        let legend = scale
            .map(|s| {
                s.legend()
                    .into_iter()
                    .map(|(label, color)| (escape_html(&label), color))
                    .collect()
            })
            .unwrap_or_default();
        Ok((serde_json::to_value(&geojson)?, legend))
    }

    /// Build the HTML document.
    pub fn render(&self, collection: &FeatureCollection) -> Result<String> {
        let config = &self.config;
        let web = Self::to_web_crs(collection)?;
        let (data, legend) = self.feature_layer(&web)?;

        let bounds = web.total_bounds().unwrap_or(BoundingBox::new(-125.0, 24.0, -66.0, 50.0));
        let (lat, lon) = Self::center(&web).unwrap_or((bounds.center().y, bounds.center().x));

        let options = json!({
            "center": [lat, lon],
            "zoom": config.zoom_start,
            "bounds": [[bounds.min_y, bounds.min_x], [bounds.max_y, bounds.max_x]],
            "fillOpacity": config.fill_opacity,
            "tiles": config.tiles.url(),
            "attribution": config.tiles.attribution(),
            "legend": legend,
            "legendTitle": config.color_column.as_deref().map(escape_html),
        });

        let (width, height) = match config.figure_size {
            Some((w, h)) => (format!("{w}px"), format!("{h}px")),
            None => ("100%".to_string(), "100vh".to_string()),
        };

        let title = escape_html(&config.title);
        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js"></script>
<style>
html, body {{ margin: 0; padding: 0; }}
#map {{ width: {width}; height: {height}; }}
.map-title {{ position: absolute; top: 10px; left: 50px; z-index: 1000; background: white; padding: 4px 10px; border-radius: 4px; font: bold 16px sans-serif; }}
.legend {{ background: white; padding: 6px 8px; font: 12px sans-serif; line-height: 18px; }}
.legend i {{ width: 14px; height: 14px; float: left; margin-right: 6px; opacity: 0.8; }}
</style>
</head>
<body>
<div class="map-title">{title}</div>
<div id="map"></div>
<script>
const data = {data};
const options = {options};
const map = L.map('map');
L.tileLayer(options.tiles, {{ attribution: options.attribution, maxZoom: 19 }}).addTo(map);

function bindInfo(feature, layer) {{
  if (feature.properties._popup) {{ layer.bindPopup(feature.properties._popup, {{ maxWidth: 300 }}); }}
  if (feature.properties._tooltip) {{ layer.bindTooltip(feature.properties._tooltip); }}
}}

const features = L.geoJSON(data, {{
  style: f => ({{ fillColor: f.properties._color, color: 'black', weight: 1, fillOpacity: options.fillOpacity }}),
  pointToLayer: (f, latlng) => L.circleMarker(latlng, {{ radius: 5, color: f.properties._color, fill: true, fillOpacity: options.fillOpacity }}),
  onEachFeature: bindInfo
}}).addTo(map);

L.control.layers(null, {{ 'USDA Forest Service Data': features }}).addTo(map);

if (options.zoom === null) {{
  map.fitBounds(options.bounds);
}} else {{
  map.setView(options.center, options.zoom);
}}

if (options.legend.length > 0) {{
  const legend = L.control({{ position: 'bottomright' }});
  legend.onAdd = function () {{
    const div = L.DomUtil.create('div', 'legend');
    const rows = options.legend.map(([label, color]) => '<i style="background:' + color + '"></i>' + label);
    div.innerHTML = (options.legendTitle ? '<b>' + options.legendTitle + '</b><br>' : '') + rows.join('<br>');
    return div;
  }};
  legend.addTo(map);
}}
</script>
</body>
</html>
"#,
            data = script_safe(&data.to_string()),
            options = script_safe(&options.to_string()),
        ))
    }

    /// Render and write to `config.output_path`, creating parent directories.
    pub fn save(&self, collection: &FeatureCollection) -> Result<PathBuf> {
        let html = self.render(collection)?;
        let path = &self.config.output_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, html)?;
        info!(path = %path.display(), features = collection.len(), "interactive map saved");
        Ok(path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric::feature_collection::{AttributeValue, Record};
    use crate::visualize::style::SET1;
    use geo::{point, polygon, Geometry};
    use tempfile::TempDir;

    fn units() -> FeatureCollection {
        let mut fc = FeatureCollection::new(
            "Actv_SilvReforest",
            Some(Crs::wgs84()),
            vec!["METHOD".to_string(), "ACRES".to_string()],
        );
        fc.push(Record::new(
            Some(Geometry::Polygon(polygon![
                (x: -105.0, y: 40.0),
                (x: -104.9, y: 40.0),
                (x: -104.9, y: 40.1),
            ])),
            vec!["Plant <trees>".into(), 12.0.into()],
        ))
        .unwrap();
        fc.push(Record::new(
            Some(Geometry::Point(point!(x: -104.5, y: 40.5))),
            vec!["Seed".into(), AttributeValue::Null],
        ))
        .unwrap();
        fc
    }

    #[test]
    fn test_render_embeds_title_and_geojson() {
        let config = MapConfig::new("Reforestation </script>", "map.html")
            .with_color_column("METHOD", ColorMap::Categorical)
            .with_popup_fields(["METHOD", "ACRES"])
            .with_tooltip_fields(["METHOD"]);
        let html = InteractiveMap::new(config).render(&units()).unwrap();

        assert!(html.contains("<title>Reforestation &lt;/script&gt;</title>"));
        assert!(html.contains("\"FeatureCollection\""));
        assert!(html.contains("leaflet@1.9.4"));
        assert!(html.contains(SET1[0]));
        assert!(html.contains("&lt;trees&gt;"));
    }

    #[test]
    fn test_script_safe() {
        assert_eq!(script_safe(r#"{"a":"</script>"}"#), r#"{"a":"<\/script>"}"#);
    }

    #[test]
    fn test_feature_layer_properties() {
        let config = MapConfig::default()
            .with_color_column("METHOD", ColorMap::Categorical)
            .with_popup_fields(["ACRES", "MISSING"]);
        let map = InteractiveMap::new(config);
        let (data, legend) = map.feature_layer(&units()).unwrap();

        let first = &data["features"][0]["properties"];
        assert_eq!(first["_color"], json!(SET1[0]));
        assert_eq!(first["_popup"], json!("<div style='width: 200px'><b>ACRES:</b> 12</div>"));
        assert_eq!(first["_tooltip"], Value::Null);
        assert_eq!(data["features"][1]["properties"]["_color"], json!(SET1[1]));
        assert_eq!(legend.len(), 2);
    }

    #[test]
    fn test_missing_color_column() {
        let config = MapConfig::default().with_color_column("NOPE", ColorMap::Categorical);
        let err = InteractiveMap::new(config).render(&units()).unwrap_err();
        assert!(matches!(err, EdwError::MissingField(_)));
    }

    #[test]
    fn test_requires_crs() {
        let mut fc = units();
        fc.crs = None;
        let err = InteractiveMap::new(MapConfig::default()).render(&fc).unwrap_err();
        assert!(matches!(err, EdwError::Projection(_)));
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn test_projected_data_needs_proj() {
        let mut fc = units();
        fc.crs = Some(Crs::from_epsg(5070));
        let err = InteractiveMap::new(MapConfig::default()).render(&fc).unwrap_err();
        assert!(matches!(err, EdwError::Projection(_)));
    }

    #[test]
    fn test_save_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("maps").join("reforest.html");
        let config = MapConfig::new("Reforestation", &out).with_figure_size(800, 600);
        let path = InteractiveMap::new(config).save(&units()).unwrap();
        assert_eq!(path, out);
        let html = fs::read_to_string(out).unwrap();
        assert!(html.contains("width: 800px"));
    }
}
