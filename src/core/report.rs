//! Per-stage reports and the writers that persist them.
//!
//! Reports are keyed by class label and keep the class-list order when
//! serialized, so the JSON on disk lists classes the way `classes.txt` does.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Insertion-ordered mapping from class label to a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> ClassMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace the value for `class`. A new class goes to the end.
    pub fn insert(&mut self, class: impl Into<String>, value: T) {
        let class = class.into();
        match self.entries.iter_mut().find(|(name, _)| *name == class) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((class, value)),
        }
    }

    pub fn get(&self, class: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == class)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub fn contains(&self, class: &str) -> bool {
        self.get(class).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ClassMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Serialize for ClassMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (class, value) in &self.entries {
            map.serialize_entry(class, value)?;
        }
        map.end()
    }
}

/// Image counts per class after cleaning
pub type ClassPopulation = ClassMap<usize>;

/// Outcome of cleaning one class folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanCounts {
    #[serde(rename = "valid_images")]
    pub valid: usize,
    #[serde(rename = "removed_corrupted_or_invalid")]
    pub removed: usize,
}

/// Class populations either side of the balancer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AugmentationReport {
    pub before_augmentation: ClassPopulation,
    pub after_augmentation: ClassPopulation,
}

/// Serialize `report` as JSON indented with four spaces
pub fn to_json_string<T: Serialize>(report: &T) -> Result<String, ReportError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    report.serialize(&mut serializer)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<(), ReportError> {
    let json = to_json_string(report)?;
    fs::write(path, json).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `lines` newline-joined, without a trailing newline
pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), ReportError> {
    fs::write(path, lines.join("\n")).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_map_keeps_insertion_order() {
        let mut map = ClassMap::new();
        map.insert("surprise", 3);
        map.insert("angry", 1);
        map.insert("surprise", 5);

        let entries: Vec<(&str, i32)> = map.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(entries, vec![("surprise", 5), ("angry", 1)]);
        assert_eq!(map.get("angry"), Some(&1));
        assert!(!map.contains("fear"));
    }

    #[test]
    fn test_clean_report_json_layout() {
        let mut report = ClassMap::new();
        report.insert("sad", CleanCounts { valid: 2, removed: 1 });
        report.insert("angry", CleanCounts { valid: 0, removed: 0 });

        let json = to_json_string(&report).unwrap();
        let expected = "{\n    \"sad\": {\n        \"valid_images\": 2,\n        \"removed_corrupted_or_invalid\": 1\n    },\n    \"angry\": {\n        \"valid_images\": 0,\n        \"removed_corrupted_or_invalid\": 0\n    }\n}";
        assert_eq!(json, expected);
    }

    #[test]
    fn test_augmentation_report_keys() {
        let mut report = AugmentationReport::default();
        report.before_augmentation.insert("fear", 120);
        report.after_augmentation.insert("fear", 512);

        let json = to_json_string(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["before_augmentation"]["fear"], 120);
        assert_eq!(value["after_augmentation"]["fear"], 512);
    }

    #[test]
    fn test_write_lines_has_no_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("removed.txt");
        write_lines(&path, &["a.gif".to_string(), "b.jpg".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a.gif\nb.jpg");

        write_lines(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
