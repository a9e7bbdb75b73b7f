//! ZIP extraction for downloaded EDW archives.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::commons::basic_functions::is_geospatial_file;
use crate::error::{EdwError, Result};

/// Extract every entry of `reader` under `dest`; returns extracted file paths
/// relative to `dest`, in archive order.
///
/// Entries whose names escape `dest` (absolute paths, `..`) are skipped.
pub fn extract_zip<R: Read + Seek>(reader: R, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(reader)?;
    fs::create_dir_all(dest)?;

    let mut files = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = file.name(), "skipping archive entry outside the target directory");
            continue;
        };
        let outpath = dest.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)
                .map_err(|e| EdwError::Extraction(format!("{}: {e}", file.name())))?;
            files.push(relative);
        }
    }

    debug!(count = files.len(), dest = %dest.display(), "archive extracted");
    Ok(files)
}

/// Fail unless at least one extracted path looks like geospatial data.
pub fn ensure_geospatial(files: &[PathBuf]) -> Result<()> {
    let found = files
        .iter()
        .any(|f| is_geospatial_file(f) || f.ancestors().any(is_geospatial_file));
    if found {
        Ok(())
    } else {
        Err(EdwError::Extraction(format!(
            "archive holds no recognised geospatial files ({} entries)",
            files.len()
        )))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Build an in-memory ZIP from `(name, contents)` pairs.
    pub fn zip_bytes<N: AsRef<str>, C: AsRef<[u8]>>(entries: &[(N, C)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer
                .start_file(name.as_ref(), FileOptions::default())
                .unwrap();
            writer.write_all(contents.as_ref()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub fn shapefile_zip(name: &str) -> Vec<u8> {
        zip_bytes(&[
            (format!("{name}.shp"), &b"shp"[..]),
            (format!("{name}.shx"), &b"shx"[..]),
            (format!("{name}.dbf"), &b"dbf"[..]),
            (format!("{name}.prj"), &b"GEOGCS[\"GCS_North_American_1983\"]"[..]),
        ])
    }

    pub fn geodatabase_zip(name: &str) -> Vec<u8> {
        zip_bytes(&[
            (format!("{name}.gdb/a00000001.gdbtable"), &b"t"[..]),
            (format!("{name}.gdb/a00000001.gdbtablx"), &b"x"[..]),
            (format!("{name}.gdb/gdb"), &b"g"[..]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_extract_shapefile_archive() {
        let tmp = TempDir::new().unwrap();
        let files = extract_zip(Cursor::new(shapefile_zip("Roads")), tmp.path()).unwrap();
        assert_eq!(files.len(), 4);
        assert!(tmp.path().join("Roads.shp").exists());
        ensure_geospatial(&files).unwrap();
    }

    #[test]
    fn test_extract_nested_gdb() {
        let tmp = TempDir::new().unwrap();
        let files = extract_zip(Cursor::new(geodatabase_zip("Harvest")), tmp.path()).unwrap();
        assert!(tmp.path().join("Harvest.gdb").is_dir());
        ensure_geospatial(&files).unwrap();
    }

    #[test]
    fn test_corrupt_archive() {
        let tmp = TempDir::new().unwrap();
        let err = extract_zip(Cursor::new(b"not a zip".to_vec()), tmp.path()).unwrap_err();
        assert!(matches!(err, EdwError::Extraction(_)));
    }

    #[test]
    fn test_archive_without_geodata() {
        let tmp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("README.txt", b"hello")]);
        let files = extract_zip(Cursor::new(bytes), tmp.path()).unwrap();
        assert!(matches!(ensure_geospatial(&files), Err(EdwError::Extraction(_))));
    }

    #[test]
    fn test_path_traversal_entry_skipped() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out");
        let bytes = zip_bytes(&[("../escape.shp", b"x"), ("ok.shp", b"y")]);
        let files = extract_zip(Cursor::new(bytes), &dest).unwrap();
        assert_eq!(files, vec![PathBuf::from("ok.shp")]);
        assert!(!tmp.path().join("escape.shp").exists());
    }
}
