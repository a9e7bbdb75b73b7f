use std::path::Path;

use anyhow::{bail, Result};
use edwviz::collect::config::DownloaderConfig;
use edwviz::geometric::{analysis, loader};
use edwviz::visualize::{BaseTiles, ColorMap, InteractiveMap, MapConfig, Ramp};
use tracing_subscriber::EnvFilter;

/// Example: interactive Leaflet maps of timber harvest activities.
/// Run `download_data` first.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let data_dir = DownloaderConfig::from_env().data_dir;
    let dataset = data_dir.join("shapefiles").join("Actv_TimberHarvest");
    if !dataset.exists() {
        bail!(
            "no data at {}; run the download_data example first",
            dataset.display()
        );
    }

    let harvest = loader::load_shapefile(&dataset, None)?;
    // Keep the HTML a reasonable size
    let subset = harvest.head(500);
    println!("Using {} of {} features", subset.len(), harvest.len());

    let popup_fields: Vec<String> = subset.schema().iter().take(5).cloned().collect();
    println!("Popup fields: {}", popup_fields.join(", "));

    let output = Path::new("outputs");

    println!("\n=== Basic map ===");
    let basic = MapConfig::new("Timber Harvest", output.join("01_interactive_basic.html"))
        .with_popup_fields(popup_fields.clone())
        .with_tooltip_fields(popup_fields.iter().take(2).cloned());
    let path = InteractiveMap::new(basic).save(&subset)?;
    println!("Saved to {}", path.display());

    if let Some(column) = subset.schema().first().cloned() {
        println!("\n=== Styled by {column} ===");
        let styled = MapConfig::new(
            format!("Timber Harvest by {column}"),
            output.join("02_interactive_styled.html"),
        )
        .with_color_column(column, ColorMap::Categorical)
        .with_popup_fields(popup_fields.clone())
        .with_tiles(BaseTiles::CartoDbPositron);
        let path = InteractiveMap::new(styled).save(&subset)?;
        println!("Saved to {}", path.display());
    }

    println!("\n=== Coloured by area ===");
    match analysis::calculate_area(&subset, "acres") {
        Ok(with_area) => {
            let by_area = MapConfig::new("Harvest area (acres)", output.join("03_interactive_area.html"))
                .with_color_column("area_acres", ColorMap::Sequential(Ramp::YlOrRd))
                .with_popup_fields(["area_acres"])
                .with_zoom_start(None);
            let path = InteractiveMap::new(by_area).save(&with_area)?;
            println!("Saved to {}", path.display());
        }
        Err(e) => println!("Skipped: {e}"),
    }

    Ok(())
}
