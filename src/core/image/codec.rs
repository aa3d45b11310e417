use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::core::operations::FileOpError;

#[derive(Debug, Error)]
pub enum ImageOpError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    File(#[from] FileOpError),
}

/// Lowercased extension of `path`, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Fully decode the image at `path`.
///
/// The format is sniffed from the file header rather than trusted from the
/// extension, so a truncated or mislabelled file fails here.
pub fn decode_checked(path: &Path) -> Result<DynamicImage, ImageOpError> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| ImageOpError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    reader.decode().map_err(|source| ImageOpError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode `img` as three-channel JPEG and write it to `path`.
///
/// The image is encoded in memory first; if writing fails midway the partial
/// file is removed so no truncated image is left under `path`.
pub fn encode_canonical(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), ImageOpError> {
    let rgb = img.to_rgb8();

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|source| ImageOpError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    if let Err(source) = fs::write(path, buf.into_inner()) {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove partial output {:?}: {}", path, e);
            }
        }
        return Err(ImageOpError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_extension_helpers() {
        assert_eq!(extension_of(Path::new("a/B.PNG")), Some("png".to_string()));
        assert_eq!(extension_of(Path::new("noext")), None);
        assert!(has_extension(Path::new("x.JPG"), "jpg"));
        assert!(!has_extension(Path::new("x.jpeg"), "jpg"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(decode_checked(&path).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.png");
        RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255])).save(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        let truncated = dir.path().join("cut.png");
        fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

        assert!(decode_checked(&path).is_ok());
        assert!(decode_checked(&truncated).is_err());
    }

    #[test]
    fn test_encode_canonical_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([200, 100, 50, 128])));

        encode_canonical(&img, &path, 75).unwrap();

        let decoded = decode_checked(&path).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_file_op_errors_keep_their_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.png");

        let err: ImageOpError = crate::core::operations::remove_file(&missing)
            .unwrap_err()
            .into();

        assert!(matches!(err, ImageOpError::File(FileOpError::RemoveFailed { .. })));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_encode_into_missing_dir_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.jpg");
        let img = DynamicImage::new_rgb8(4, 4);

        assert!(matches!(
            encode_canonical(&img, &path, 75),
            Err(ImageOpError::Io { .. })
        ));
        assert!(!path.exists());
    }
}
