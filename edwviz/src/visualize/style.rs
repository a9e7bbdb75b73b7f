//! Colour maps and base tile layers for the interactive map.

use std::collections::BTreeMap;

use crate::geometric::feature_collection::AttributeValue;

/// Eight-colour qualitative palette (ColorBrewer Set1).
pub const SET1: [&str; 8] = [
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf",
];

const VIRIDIS: &[&str] = &["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"];
const YL_OR_RD: &[&str] = &["#ffffb2", "#fecc5c", "#fd8d3c", "#f03b20", "#bd0026"];
const GREENS: &[&str] = &["#edf8e9", "#bae4b3", "#74c476", "#31a354", "#006d2c"];

/// Continuous ramps for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Viridis,
    YlOrRd,
    Greens,
}

impl Ramp {
    fn stops(&self) -> &'static [&'static str] {
        match self {
            Ramp::Viridis => VIRIDIS,
            Ramp::YlOrRd => YL_OR_RD,
            Ramp::Greens => GREENS,
        }
    }

    /// Colour at `t` in `[0, 1]`, linearly interpolated between stops.
    pub fn at(&self, t: f64) -> String {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (stops.len() - 1) as f64;
        let lower = scaled.floor() as usize;
        let upper = (lower + 1).min(stops.len() - 1);
        let frac = scaled - lower as f64;

        let (Some(a), Some(b)) = (parse_hex(stops[lower]), parse_hex(stops[upper])) else {
            return stops[lower].to_string();
        };
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        format!("#{:02x}{:02x}{:02x}", mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
    }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// How values of the colour column become fill colours.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColorMap {
    /// Distinct values, in sorted order, cycle through [`SET1`].
    #[default]
    Categorical,
    /// Like `Categorical` with a caller-supplied palette.
    Palette(Vec<String>),
    /// Numeric values scaled between the column minimum and maximum.
    Sequential(Ramp),
}

/// Colours resolved for one column; built once per render.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    kind: ScaleKind,
    default_color: String,
}

#[derive(Debug, Clone, PartialEq)]
enum ScaleKind {
    Categories(BTreeMap<String, String>),
    Range { ramp: Ramp, min: f64, max: f64 },
}

impl ColorScale {
    pub fn build<'a, I>(color_map: &ColorMap, values: I, default_color: &str) -> Self
    where
        I: IntoIterator<Item = &'a AttributeValue>,
    {
        let values: Vec<&AttributeValue> = values.into_iter().filter(|v| !v.is_null()).collect();

        let kind = match color_map {
            ColorMap::Sequential(ramp) => {
                let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
                let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                ScaleKind::Range {
                    ramp: *ramp,
                    min,
                    max,
                }
            }
            ColorMap::Categorical | ColorMap::Palette(_) => {
                let palette: Vec<String> = match color_map {
                    ColorMap::Palette(p) if !p.is_empty() => p.clone(),
                    _ => SET1.iter().map(|c| c.to_string()).collect(),
                };
                let mut distinct: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                distinct.sort();
                distinct.dedup();
                let categories = distinct
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (v, palette[i % palette.len()].clone()))
                    .collect();
                ScaleKind::Categories(categories)
            }
        };

        ColorScale {
            kind,
            default_color: default_color.to_string(),
        }
    }

    pub fn color_for(&self, value: &AttributeValue) -> String {
        match &self.kind {
            ScaleKind::Categories(categories) => categories
                .get(&value.to_string())
                .filter(|_| !value.is_null())
                .cloned()
                .unwrap_or_else(|| self.default_color.clone()),
            ScaleKind::Range { ramp, min, max } => match value.as_f64() {
                Some(v) if max > min => ramp.at((v - min) / (max - min)),
                Some(_) => ramp.at(0.5),
                None => self.default_color.clone(),
            },
        }
    }

    /// `(label, colour)` pairs for the map legend.
    pub fn legend(&self) -> Vec<(String, String)> {
        match &self.kind {
            ScaleKind::Categories(categories) => categories
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ScaleKind::Range { ramp, min, max } if min.is_finite() && max.is_finite() => {
                (0..=4)
                    .map(|i| {
                        let t = i as f64 / 4.0;
                        (format!("{:.2}", min + (max - min) * t), ramp.at(t))
                    })
                    .collect()
            }
            ScaleKind::Range { .. } => Vec::new(),
        }
    }
}

/// Base map layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BaseTiles {
    #[default]
    OpenStreetMap,
    CartoDbPositron,
    CartoDbDarkMatter,
    EsriWorldImagery,
    Custom { url: String, attribution: String },
}

impl BaseTiles {
    pub fn url(&self) -> &str {
        match self {
            BaseTiles::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            BaseTiles::CartoDbPositron => {
                "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png"
            }
            BaseTiles::CartoDbDarkMatter => {
                "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png"
            }
            BaseTiles::EsriWorldImagery => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            }
            BaseTiles::Custom { url, .. } => url,
        }
    }

    pub fn attribution(&self) -> &str {
        match self {
            BaseTiles::OpenStreetMap => {
                "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
            }
            BaseTiles::CartoDbPositron | BaseTiles::CartoDbDarkMatter => {
                "&copy; OpenStreetMap contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>"
            }
            BaseTiles::EsriWorldImagery => "Tiles &copy; Esri",
            BaseTiles::Custom { attribution, .. } => attribution,
        }
    }
}
