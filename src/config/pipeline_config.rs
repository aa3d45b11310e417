use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::core::dataset::DatasetSplit;

const RATIO_TOLERANCE: f64 = 1e-6;

/// Errors raised while loading or validating a [`PipelineConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fractions of each class assigned to the train/val/test splits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64, // e.g., 0.70 for 70%
    pub val: f64,   // e.g., 0.15 for 15%
    pub test: f64,  // e.g., 0.15 for 15%
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.70,
            val: 0.15,
            test: 0.15,
        }
    }
}

impl SplitRatios {
    /// Get the ratio for a specific split
    pub fn get(&self, split: DatasetSplit) -> f64 {
        match split {
            DatasetSplit::Train => self.train,
            DatasetSplit::Val => self.val,
            DatasetSplit::Test => self.test,
        }
    }

    pub fn sum(&self) -> f64 {
        self.train + self.val + self.test
    }
}

/// Output dimensions of the partitioned images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl Default for TargetSize {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
        }
    }
}

/// Parameter ranges for the random augmentation chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Rotation is drawn from `-max_rotation_degrees..=max_rotation_degrees`
    pub max_rotation_degrees: i32,
    pub flip_probability: f64,
    pub brightness_range: (f32, f32),
    pub contrast_range: (f32, f32),
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            max_rotation_degrees: 20,
            flip_probability: 0.5,
            brightness_range: (0.8, 1.2),
            contrast_range: (0.8, 1.2),
        }
    }
}

/// Every tunable of the pipeline, threaded explicitly into each stage.
///
/// Can be loaded from a JSON file; any field left out keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset root holding `train/`, `test/` and the classes file
    pub input_root: PathBuf,

    /// Root for `augmented_dataset/` and `final_dataset/`; the input root when unset
    pub output_root: Option<PathBuf>,

    /// Classes file, relative to `input_root` unless absolute
    pub classes_file: PathBuf,

    pub split_ratios: SplitRatios,
    pub target_size: TargetSize,

    /// Lowercase extensions accepted as images, without the dot
    pub recognized_extensions: Vec<String>,

    /// Extension every surviving image is normalized to
    pub canonical_extension: String,

    pub jpeg_quality: u8,

    /// Share of each class's population added by the diversity pass
    pub diversity_fraction: f64,

    pub augmentation: AugmentationConfig,

    /// Seed for every random draw; `None` uses fresh entropy on each run
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("dataset"),
            output_root: None,
            classes_file: PathBuf::from("classes.txt"),
            split_ratios: SplitRatios::default(),
            target_size: TargetSize::default(),
            recognized_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            canonical_extension: "jpg".to_string(),
            jpeg_quality: 75,
            diversity_fraction: 0.1,
            augmentation: AugmentationConfig::default(),
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Default configuration rooted at `input_root`
    pub fn with_root(input_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading pipeline config from: {:?}", path);

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the invariants every stage relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = &self.split_ratios;
        if ratios.train < 0.0 || ratios.val < 0.0 || ratios.test < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "split ratios must be non-negative, got {:?}",
                ratios
            )));
        }
        if (ratios.sum() - 1.0).abs() > RATIO_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "split ratios must sum to 1.0, got {}",
                ratios.sum()
            )));
        }

        if self.target_size.width == 0 || self.target_size.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "target size must be non-zero, got {}x{}",
                self.target_size.width, self.target_size.height
            )));
        }

        if self.recognized_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one recognized extension is required".to_string(),
            ));
        }
        let canonical = &self.canonical_extension;
        if !canonical.eq_ignore_ascii_case("jpg") && !canonical.eq_ignore_ascii_case("jpeg") {
            return Err(ConfigError::Invalid(format!(
                "canonical extension must be a JPEG extension (jpg or jpeg), got {:?}",
                canonical
            )));
        }
        if !self.is_recognized_extension(canonical) {
            return Err(ConfigError::Invalid(format!(
                "canonical extension {:?} is not a recognized extension",
                self.canonical_extension
            )));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }

        if self.diversity_fraction < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "diversity fraction must be non-negative, got {}",
                self.diversity_fraction
            )));
        }

        let aug = &self.augmentation;
        if aug.max_rotation_degrees < 0 {
            return Err(ConfigError::Invalid(format!(
                "max rotation must be non-negative, got {}",
                aug.max_rotation_degrees
            )));
        }
        if !(0.0..=1.0).contains(&aug.flip_probability) {
            return Err(ConfigError::Invalid(format!(
                "flip probability must be within 0..=1, got {}",
                aug.flip_probability
            )));
        }
        for (name, (low, high)) in [
            ("brightness", aug.brightness_range),
            ("contrast", aug.contrast_range),
        ] {
            if low < 0.0 || low > high {
                return Err(ConfigError::Invalid(format!(
                    "{} range must satisfy 0 <= low <= high, got ({}, {})",
                    name, low, high
                )));
            }
        }

        Ok(())
    }

    /// Case-insensitive membership test against `recognized_extensions`
    pub fn is_recognized_extension(&self, ext: &str) -> bool {
        self.recognized_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }

    pub fn output_root(&self) -> &Path {
        self.output_root.as_deref().unwrap_or(&self.input_root)
    }

    pub fn classes_path(&self) -> PathBuf {
        self.input_root.join(&self.classes_file)
    }

    /// Raw split directory, e.g. `<input_root>/train`
    pub fn split_dir(&self, split: DatasetSplit) -> PathBuf {
        self.input_root.join(split.as_str())
    }

    pub fn augmented_root(&self) -> PathBuf {
        self.output_root().join("augmented_dataset")
    }

    pub fn final_root(&self) -> PathBuf {
        self.output_root().join("final_dataset")
    }

    pub fn clean_report_path(&self, split: DatasetSplit) -> PathBuf {
        self.input_root
            .join(format!("{}_clean_report.json", split.as_str()))
    }

    pub fn converted_log_path(&self, split: DatasetSplit) -> PathBuf {
        self.input_root.join(format!("{}_converted.txt", split.as_str()))
    }

    pub fn removed_log_path(&self, split: DatasetSplit) -> PathBuf {
        self.input_root.join(format!("{}_removed.txt", split.as_str()))
    }

    pub fn augmentation_report_path(&self) -> PathBuf {
        self.output_root().join("augmentation_report.json")
    }
}
