use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Extensions that mark a file (or directory, for `.gdb`) as geospatial data.
pub const GEOSPATIAL_EXTENSIONS: &[&str] = &[
    "shp", "shx", "dbf", "prj", "gdb", "gdbtable", "gdbtablx", "geojson", "gpkg",
];

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

pub fn is_geospatial_file(path: &Path) -> bool {
    GEOSPATIAL_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// Recursively collect files with the given extension, sorted by path.
pub fn find_files_with_extension(dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, &mut |path, is_dir| {
        if !is_dir && has_extension(path, ext) {
            found.push(path.to_path_buf());
        }
        // keep descending
        true
    })?;
    found.sort();
    Ok(found)
}

/// Recursively collect directories with the given extension (e.g. `gdb`).
/// Matching directories are not descended into.
pub fn find_dirs_with_extension(dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, &mut |path, is_dir| {
        if is_dir && has_extension(path, ext) {
            found.push(path.to_path_buf());
            return false;
        }
        true
    })?;
    found.sort();
    Ok(found)
}

/// Depth-first walk; `visit` returns whether to descend into a directory.
fn walk(dir: &Path, visit: &mut dyn FnMut(&Path, bool) -> bool) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        let is_dir = entry.file_type()?.is_dir();
        if visit(&path, is_dir) && is_dir {
            walk(&path, visit)?;
        }
    }
    Ok(())
}

/// A single, non-empty path segment: no separators, no `.`/`..`.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_plain_file_name() {
        assert!(is_plain_file_name("Actv_TimberHarvest"));
        assert!(is_plain_file_name("my.data"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name("../evil"));
        assert!(!is_plain_file_name("a\\b"));
    }

    #[test]
    fn test_is_geospatial_file() {
        assert!(is_geospatial_file(Path::new("x/roads.SHP")));
        assert!(is_geospatial_file(Path::new("a0000000a.gdbtable")));
        assert!(!is_geospatial_file(Path::new("readme.txt")));
    }

    #[test]
    fn test_find_recursive() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("inner").join("Layer.gdb");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a00000001.gdbtable"), b"").unwrap();
        fs::write(tmp.path().join("inner").join("b.shp"), b"").unwrap();
        fs::write(tmp.path().join("a.shp"), b"").unwrap();

        let shps = find_files_with_extension(tmp.path(), "shp").unwrap();
        assert_eq!(shps.len(), 2);
        assert!(shps[0].ends_with("a.shp"));

        let gdbs = find_dirs_with_extension(tmp.path(), "gdb").unwrap();
        assert_eq!(gdbs, vec![nested]);
    }
}
