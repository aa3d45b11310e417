use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Result type for file operations
pub type FileOpResult<T> = Result<T, FileOpError>;

/// Error types for file operations
#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("failed to copy {src:?} to {dest:?}: {source}")]
    CopyFailed {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {path:?}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path:?}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copy a file byte-for-byte.
///
/// # Arguments
/// * `src` - Source file path
/// * `dest` - Destination file path, overwritten if present
pub fn copy_file(src: &Path, dest: &Path) -> FileOpResult<()> {
    debug!("Copying file from {:?} to {:?}", src, dest);

    fs::copy(src, dest).map_err(|source| FileOpError::CopyFailed {
        src: src.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    })?;

    Ok(())
}

pub fn remove_file(path: &Path) -> FileOpResult<()> {
    debug!("Removing file {:?}", path);

    fs::remove_file(path).map_err(|source| FileOpError::RemoveFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Create `path` and any missing parents
pub fn ensure_dir(path: &Path) -> FileOpResult<()> {
    fs::create_dir_all(path).map_err(|source| FileOpError::CreateDirFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove `path` with everything under it, then create it empty.
pub fn recreate_dir(path: &Path) -> FileOpResult<()> {
    if path.exists() {
        info!("Clearing existing directory {:?}", path);
        fs::remove_dir_all(path).map_err(|source| FileOpError::RemoveFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }
    ensure_dir(path)
}

/// Final path component as an owned string, lossily converted
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dest = dir.path().join("b.jpg");
        fs::write(&src, b"pixels").unwrap();

        copy_file(&src, &dest).unwrap();
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_file(&dir.path().join("nope.jpg"), &dir.path().join("out.jpg")).unwrap_err();
        assert!(matches!(err, FileOpError::CopyFailed { .. }));
    }

    #[test]
    fn test_recreate_dir_empties_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("augmented").join("fear");
        ensure_dir(&target).unwrap();
        fs::write(target.join("stale.jpg"), b"old").unwrap();

        recreate_dir(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of(Path::new("/data/train/sad/img_01.png")), "img_01.png");
        assert_eq!(file_name_of(Path::new("/")), "");
    }
}
