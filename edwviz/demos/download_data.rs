use anyhow::Result;
use edwviz::collect::config::DownloaderConfig;
use edwviz::collect::edw::{DatasetFormat, EdwCollect};
use tracing_subscriber::EnvFilter;

/// Example: listing and downloading EDW datasets.
///
/// Honours `EDWVIZ_DATA_DIR`, `EDWVIZ_BASE_URL`, `EDWVIZ_TIMEOUT_SECS` and
/// `EDWVIZ_FORCE`, also from a `.env` file.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let edw = EdwCollect::new(DownloaderConfig::from_env())?;

    println!("=== Available datasets ===\n");
    for (i, name) in edw.list_available_datasets().iter().enumerate() {
        println!("{}. {}", i + 1, name);
    }

    println!("\n=== Timber harvest (shapefile) ===");
    match edw.download_dataset("Actv_TimberHarvest", DatasetFormat::Shapefile) {
        Ok(handle) => println!("Downloaded to: {}", handle.local_path.display()),
        Err(e) => println!("Error: {e}"),
    }

    println!("\n=== Hazardous fuel treatments (geodatabase) ===");
    match edw.download_dataset("Actv_HazFuelTrt_PL", DatasetFormat::Geodatabase) {
        Ok(handle) => println!("Downloaded to: {}", handle.local_path.display()),
        Err(e) => println!("Error: {e}"),
    }

    println!("\n=== Dataset information ===");
    let info = edw.get_dataset_info("Actv_SilvReforest")?;
    let formats: Vec<String> = info.available_formats.iter().map(|f| f.to_string()).collect();
    println!("Dataset: {}", info.name);
    println!("Available formats: {}", formats.join(", "));
    println!("Metadata URL: {}", info.metadata_url);

    println!("\n=== Several datasets ===");
    for (name, format) in [
        ("Actv_SilvReforest", "shapefile"),
        ("Actv_RngVegImprove", "shp"),
    ] {
        let format: DatasetFormat = format.parse()?;
        match edw.download_dataset(name, format) {
            Ok(handle) => println!("  {name}: {}", handle.local_path.display()),
            Err(e) => println!("  {name}: error: {e}"),
        }
    }

    Ok(())
}
