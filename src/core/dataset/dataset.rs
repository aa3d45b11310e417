use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::report::ClassMap;

use super::ClassList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetSplit {
    Train,
    Val,
    Test,
}

impl DatasetSplit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Val => "val",
            DatasetSplit::Test => "test",
        }
    }

    /// Splits produced by the partitioner, in output order
    pub fn all() -> [DatasetSplit; 3] {
        [DatasetSplit::Train, DatasetSplit::Val, DatasetSplit::Test]
    }
}

/// Take a one-shot listing of the regular files directly inside `dir`.
///
/// Entries are sorted by file name so that reports and logs come out in the
/// same order on every platform. Subdirectories and other non-file entries are
/// left alone.
pub fn snapshot_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => files.push(path),
            Ok(_) => debug!("Ignoring non-file entry: {:?}", path),
            Err(e) => warn!("Failed to stat {:?}: {}", path, e),
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Names of the subdirectories of `root`, sorted
pub fn list_class_dirs(root: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    names.sort();
    Ok(names)
}

/// Number of regular files in `dir`, or 0 when the directory cannot be read
pub fn count_files(dir: &Path) -> usize {
    snapshot_files(dir).map(|files| files.len()).unwrap_or(0)
}

/// Live per-class file counts under `root`, in class-list order.
///
/// A class whose folder is missing counts as 0.
pub fn class_population(root: &Path, classes: &ClassList) -> ClassMap<usize> {
    let mut population = ClassMap::new();
    for class in classes.iter() {
        population.insert(class, count_files(&root.join(class)));
    }
    population
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_names() {
        let names: Vec<&str> = DatasetSplit::all().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["train", "val", "test"]);
    }

    #[test]
    fn test_snapshot_is_sorted_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("c.txt"), b"c").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let names: Vec<String> = snapshot_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.txt"]);
    }

    #[test]
    fn test_class_population_follows_class_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sad")).unwrap();
        fs::create_dir(dir.path().join("happy")).unwrap();
        for i in 0..3 {
            fs::write(dir.path().join("happy").join(format!("{}.jpg", i)), b"x").unwrap();
        }
        fs::write(dir.path().join("sad").join("0.jpg"), b"x").unwrap();

        let classes = ClassList::new(["sad", "happy", "fear"]);
        let population = class_population(dir.path(), &classes);

        let entries: Vec<(&str, usize)> =
            population.iter().map(|(class, count)| (class, *count)).collect();
        assert_eq!(entries, vec![("sad", 1), ("happy", 3), ("fear", 0)]);
    }

    #[test]
    fn test_list_class_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("neutral")).unwrap();
        fs::create_dir(dir.path().join("angry")).unwrap();
        fs::write(dir.path().join("stray.jpg"), b"x").unwrap();

        assert_eq!(list_class_dirs(dir.path()).unwrap(), vec!["angry", "neutral"]);
        assert_eq!(count_files(&dir.path().join("missing")), 0);
    }
}
