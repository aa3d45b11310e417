use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassListError {
    #[error("failed to read classes file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write classes file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("classes file {0:?} does not name any class")]
    Empty(PathBuf),
}

/// The fixed, ordered universe of class labels shared by every stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList {
    labels: Vec<String>,
}

impl ClassList {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a classes file: one label per line, surrounding whitespace
    /// trimmed, blank lines ignored.
    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    pub fn load(path: &Path) -> Result<Self, ClassListError> {
        let content = fs::read_to_string(path).map_err(|source| ClassListError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let classes = Self::parse(&content);
        if classes.is_empty() {
            return Err(ClassListError::Empty(path.to_path_buf()));
        }
        Ok(classes)
    }

    /// Write the labels newline-separated, without a trailing newline
    pub fn write(&self, path: &Path) -> Result<(), ClassListError> {
        fs::write(path, self.labels.join("\n")).map_err(|source| ClassListError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
