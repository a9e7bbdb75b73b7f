use anyhow::{bail, Result};
use edwviz::collect::config::DownloaderConfig;
use edwviz::geo_core::BoundingBox;
use edwviz::geometric::{analysis, export, loader};
use tracing_subscriber::EnvFilter;

/// Example: area, filters, summary statistics and GeoJSON export.
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
    println!("Loaded {} features", harvest.len());
    if let Some(crs) = &harvest.crs {
        println!("CRS: {crs}");
    }
    println!("Columns: {}", harvest.schema().join(", "));

    println!("\n=== Area ===");
    let harvest = analysis::calculate_area(&harvest, "acres")?;
    let report = analysis::get_summary_statistics(&harvest);
    for area in &report.areas {
        println!("{}: total {:.1}, mean {:.2}", area.column, area.total, area.mean);
    }

    println!("\n=== Summary statistics ===");
    println!("Features: {}", report.feature_count);
    println!("Without geometry: {}", report.null_geometry_count);
    for (kind, count) in &report.geometry_types {
        println!("  {kind}: {count}");
    }
    if let Some(bounds) = report.total_bounds {
        println!("Total bounds: {bounds}");
    }
    for stats in &report.numeric {
        println!(
            "  {:<20} count {:>7} mean {:>12.2} std {:>12.2} min {:>12.2} max {:>12.2}",
            stats.column, stats.count, stats.mean, stats.std, stats.min, stats.max
        );
    }
    for counts in report.categorical.iter().take(3) {
        println!("\nTop values of {}:", counts.column);
        for (value, count) in counts.counts.iter().take(10) {
            println!("  {value}: {count}");
        }
    }

    println!("\n=== Filters ===");
    if let Some(counts) = report.categorical.first() {
        if let Some((value, _)) = counts.counts.first() {
            let filtered = analysis::filter_by_attribute(&harvest, &counts.column, value.as_str())?;
            println!("{} = {value}: {} features", counts.column, filtered.len());
        }
    }
    if let Some(bounds) = report.total_bounds {
        let center = bounds.center();
        let quarter = BoundingBox::new(bounds.min_x, bounds.min_y, center.x, center.y);
        let filtered = analysis::filter_by_bounds(&harvest, quarter);
        println!("South-west quarter {quarter}: {} features", filtered.len());
    }

    println!("\n=== Export ===");
    export::export_to_geojson(&harvest.head(1000), "outputs/timber_harvest_sample.geojson")?;
    std::fs::write(
        "outputs/timber_harvest_summary.json",
        serde_json::to_string_pretty(&report)?,
    )?;
    println!("Wrote outputs/timber_harvest_sample.geojson and outputs/timber_harvest_summary.json");

    Ok(())
}
