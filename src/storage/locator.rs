//! Screenshot lookup by String ID

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension of the screenshots produced by the capture tooling
pub const IMAGE_EXTENSION: &str = "png";

/// Screenshots under one directory, indexed by file name.
///
/// The directory is walked once, recursively and in file-name order.
/// Lookups return the first screenshot in walk order whose file name starts
/// with the String ID, so results are stable across runs.
#[derive(Debug, Clone)]
pub struct ImageIndex {
    root: PathBuf,
    /// (file name, walk position, path), sorted by file name
    files: Vec<(String, usize, PathBuf)>,
}

impl ImageIndex {
    /// Walk `dir`; unreadable entries are skipped
    pub fn build(dir: &Path) -> Self {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {:?}: {}", dir, e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
                continue;
            }
            let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            files.push((name.to_string(), files.len(), entry.into_path()));
        }

        files.sort();
        debug!("Indexed {} screenshots under {:?}", files.len(), dir);
        Self {
            root: dir.to_path_buf(),
            files,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// First screenshot whose file name starts with `string_id`
    pub fn locate(&self, string_id: &str) -> Option<&Path> {
        if string_id.is_empty() {
            return None;
        }

        // Names sharing a prefix are contiguous once sorted
        let start = self.files.partition_point(|(name, _, _)| name.as_str() < string_id);
        self.files[start..]
            .iter()
            .take_while(|(name, _, _)| name.starts_with(string_id))
            .min_by_key(|(_, position, _)| *position)
            .map(|(_, _, path)| path.as_path())
    }

    /// Like [`ImageIndex::locate`], logging a miss
    pub fn locate_or_warn(&self, string_id: &str) -> Option<PathBuf> {
        let found = self.locate(string_id).map(Path::to_path_buf);
        if found.is_none() {
            warn!("No screenshot for String ID [{}] under {:?}", string_id, self.root);
        }
        found
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(IMAGE_EXTENSION))
        .unwrap_or(false)
}

/// Image identifier used to key results: the file stem
pub fn image_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_locate_prefix_match() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("MM_00_06_04_screen.png"));
        touch(&dir.path().join("MM_00_06_05.png"));

        let index = ImageIndex::build(dir.path());
        let found = index.locate("MM_00_06_04").unwrap();
        assert_eq!(found.file_name().unwrap(), "MM_00_06_04_screen.png");
        assert_eq!(index.locate("MM_00_06").unwrap().file_name().unwrap(), "MM_00_06_04_screen.png");
    }

    #[test]
    fn test_locate_recursive() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("nested/deeper/AB_01.png"));

        let found = ImageIndex::build(dir.path()).locate("AB_01").unwrap().to_path_buf();
        assert!(found.ends_with("nested/deeper/AB_01.png"));
    }

    #[test]
    fn test_locate_requires_extension() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("AB_01.jpg"));
        touch(&dir.path().join("AB_01.png.txt"));
        touch(&dir.path().join("AB_02.PNG"));

        let index = ImageIndex::build(dir.path());
        assert_eq!(index.len(), 1);
        assert!(index.locate("AB_01").is_none());
        assert!(index.locate("AB_02").is_some());
    }

    #[test]
    fn test_locate_stable_order() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("AB_01_b.png"));
        touch(&dir.path().join("AB_01_a.png"));

        let index = ImageIndex::build(dir.path());
        let first = index.locate("AB_01").unwrap();
        assert_eq!(first.file_name().unwrap(), "AB_01_a.png");
        assert_eq!(ImageIndex::build(dir.path()).locate("AB_01").unwrap(), first);
    }

    #[test]
    fn test_locate_follows_walk_order_across_directories() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a/AB_01_z.png"));
        touch(&dir.path().join("AB_01_a.png"));
        touch(&dir.path().join("b/AB_01_0.png"));

        // "AB_01_a.png" sorts before "a" and "b", so the walk visits it first
        let index = ImageIndex::build(dir.path());
        assert_eq!(index.len(), 3);
        assert_eq!(index.locate("AB_01").unwrap().file_name().unwrap(), "AB_01_a.png");
    }

    #[test]
    fn test_locate_many_ids_from_one_walk() {
        let dir = tempdir().unwrap();
        for i in 0..200 {
            touch(&dir.path().join(format!("shots/ID_{i:04}_screen.png")));
        }

        let index = ImageIndex::build(dir.path());
        assert_eq!(index.len(), 200);
        for i in (0..200).step_by(17) {
            let found = index.locate(&format!("ID_{i:04}")).unwrap();
            assert_eq!(found.file_name().unwrap().to_string_lossy(), format!("ID_{i:04}_screen.png"));
        }
        assert!(index.locate("ID_0200").is_none());
    }

    #[test]
    fn test_locate_misses() {
        let dir = tempdir().unwrap();
        assert!(ImageIndex::build(dir.path()).locate("AB_01").is_none());
        assert!(ImageIndex::build(dir.path()).locate("").is_none());

        let missing = ImageIndex::build(Path::new("/nonexistent/dir"));
        assert!(missing.is_empty());
        assert!(missing.locate_or_warn("AB_01").is_none());
    }

    #[test]
    fn test_image_id_is_file_stem() {
        assert_eq!(image_id(Path::new("/shots/MM_02_01_01_04.png")), "MM_02_01_01_04");
    }
}
