//! Stratified train/val/test split with resize.

use image::imageops::FilterType;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

use crate::config::{PipelineConfig, SplitRatios, TargetSize};
use crate::core::dataset::{list_class_dirs, snapshot_files, DatasetSplit};
use crate::core::image::{decode_checked, encode_canonical, ImageOpError};
use crate::core::operations::{file_name_of, recreate_dir};
use crate::core::report::ClassMap;

use super::PipelineError;

/// Sizes of the train and val segments for `len` items; test takes the rest.
///
/// Both sizes are floored, so the test segment absorbs the rounding slack.
pub fn split_counts(len: usize, ratios: &SplitRatios) -> (usize, usize, usize) {
    let share = |split: DatasetSplit| (len as f64 * ratios.get(split)).floor() as usize;
    let train = share(DatasetSplit::Train).min(len);
    let val = share(DatasetSplit::Val).min(len - train);
    (train, val, len - train - val)
}

/// One class's items cut into three contiguous, disjoint segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitAssignment<T> {
    /// Cut `items` in their current order
    pub fn from_ordered(mut items: Vec<T>, ratios: &SplitRatios) -> Self {
        let (train_n, val_n, _) = split_counts(items.len(), ratios);
        let mut val = items.split_off(train_n);
        let test = val.split_off(val_n);
        Self {
            train: items,
            val,
            test,
        }
    }

    pub fn segment(&self, split: DatasetSplit) -> &[T] {
        match split {
            DatasetSplit::Train => &self.train,
            DatasetSplit::Val => &self.val,
            DatasetSplit::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Images written and dropped for one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassSplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub failed: usize,
}

impl ClassSplitCounts {
    fn record(&mut self, split: DatasetSplit) {
        match split {
            DatasetSplit::Train => self.train += 1,
            DatasetSplit::Val => self.val += 1,
            DatasetSplit::Test => self.test += 1,
        }
    }

    pub fn written(&self) -> usize {
        self.train + self.val + self.test
    }
}

pub type SplitSummary = ClassMap<ClassSplitCounts>;

/// Partition the augmented tree into `final_dataset/{train,val,test}`
pub fn split_augmented<R: Rng + ?Sized>(
    config: &PipelineConfig,
    rng: &mut R,
) -> Result<SplitSummary, PipelineError> {
    let summary = partition_dataset(&config.augmented_root(), &config.final_root(), config, rng)?;
    if summary.is_empty() {
        warn!("No class folders found under {:?}", config.augmented_root());
    }

    let written: usize = summary.values().map(|c| c.written()).sum();
    let failed: usize = summary.values().map(|c| c.failed).sum();
    info!(
        "Dataset splitting and preprocessing completed: {} classes, {} written, {} failed",
        summary.len(),
        written,
        failed
    );

    Ok(summary)
}

/// Shuffle each class folder under `source_root`, cut it by the configured
/// ratios and write resized copies under `output_root/{split}/{class}`.
///
/// Classes are discovered from the folders present on disk. Each
/// `{split}/{class}` output folder starts empty, so a rerun replaces the
/// previous assignment. A file that cannot be processed is logged and left
/// out of the output.
pub fn partition_dataset<R: Rng + ?Sized>(
    source_root: &Path,
    output_root: &Path,
    config: &PipelineConfig,
    rng: &mut R,
) -> Result<SplitSummary, PipelineError> {
    let _span = info_span!("partition").entered();

    let classes = list_class_dirs(source_root).map_err(|source| PipelineError::Scan {
        path: source_root.to_path_buf(),
        source,
    })?;

    for split in DatasetSplit::all() {
        for class in &classes {
            recreate_dir(&output_root.join(split.as_str()).join(class))?;
        }
    }

    let mut summary = SplitSummary::new();

    for class in &classes {
        let class_dir = source_root.join(class);
        let mut images = match snapshot_files(&class_dir) {
            Ok(images) => images,
            Err(e) => {
                warn!("Skipping {} - failed to list {:?}: {}", class, class_dir, e);
                continue;
            }
        };
        images.shuffle(rng);

        let assignment = SplitAssignment::from_ordered(images, &config.split_ratios);
        if assignment.is_empty() {
            warn!("No images found in {}", class);
        } else {
            debug!("{}: {} images assigned", class, assignment.len());
        }
        let mut counts = ClassSplitCounts::default();

        for split in DatasetSplit::all() {
            let segment = assignment.segment(split);
            info!("Processing {} -> {} ({} images)", class, split.as_str(), segment.len());

            for src in segment {
                let dest = output_path(output_root, split, class, &file_name_of(src));
                match resize_file(src, &dest, config.target_size, config.jpeg_quality) {
                    Ok(()) => counts.record(split),
                    Err(e) => {
                        warn!("Error processing {:?}: {}", src, e);
                        counts.failed += 1;
                    }
                }
            }
        }

        debug!("{}: {:?}", class, counts);
        summary.insert(class.as_str(), counts);
    }

    Ok(summary)
}

fn resize_file(src: &Path, dest: &Path, size: TargetSize, quality: u8) -> Result<(), ImageOpError> {
    let img = decode_checked(src)?;
    let resized = img.resize_exact(size.width, size.height, FilterType::CatmullRom);
    encode_canonical(&resized, dest, quality)
}

/// Output path of `file_name` for `class` in `split`
pub fn output_path(
    output_root: &Path,
    split: DatasetSplit,
    class: &str,
    file_name: &str,
) -> PathBuf {
    output_root.join(split.as_str()).join(class).join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;
    use std::fs;

    fn populate(root: &Path, class: &str, count: usize) {
        let folder = root.join(class);
        fs::create_dir_all(&folder).unwrap();
        for i in 0..count {
            RgbImage::from_pixel(30 + i as u32, 20, Rgb([10, 20, 30]))
                .save_with_format(
                    folder.join(format!("img_{:02}.jpg", i)),
                    image::ImageFormat::Jpeg,
                )
                .unwrap();
        }
    }

    fn names(dir: &Path) -> HashSet<String> {
        snapshot_files(dir).unwrap().iter().map(|p| file_name_of(p)).collect()
    }

    #[test]
    fn test_split_counts_ten() {
        assert_eq!(split_counts(10, &SplitRatios::default()), (7, 1, 2));
    }

    #[test]
    fn test_split_counts_small_and_empty() {
        let ratios = SplitRatios::default();
        assert_eq!(split_counts(0, &ratios), (0, 0, 0));
        assert_eq!(split_counts(1, &ratios), (0, 0, 1));
        assert_eq!(split_counts(100, &ratios), (70, 15, 15));
    }

    #[test]
    fn test_split_counts_never_exceed_len() {
        let ratios = SplitRatios {
            train: 0.9,
            val: 0.9,
            test: 0.0,
        };
        let (train, val, test) = split_counts(10, &ratios);
        assert_eq!(train + val + test, 10);
        assert_eq!((train, val, test), (9, 1, 0));
    }

    #[test]
    fn test_assignment_is_an_exact_partition() {
        let ratios = SplitRatios::default();
        for n in 0..60 {
            let items: Vec<usize> = (0..n).collect();
            let assignment = SplitAssignment::from_ordered(items, &ratios);
            assert_eq!(assignment.len(), n);

            let mut all: Vec<usize> = Vec::new();
            for split in DatasetSplit::all() {
                all.extend_from_slice(assignment.segment(split));
            }
            // Contiguous and in order, hence disjoint and complete
            assert_eq!(all, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_partition_resizes_and_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("augmented_dataset");
        let output = dir.path().join("final_dataset");
        populate(&source, "happy", 10);
        populate(&source, "sad", 3);
        let config = PipelineConfig::with_root(dir.path());
        let mut rng = ChaCha8Rng::seed_from_u64(21);

        let summary = partition_dataset(&source, &output, &config, &mut rng).unwrap();

        assert_eq!(
            summary.get("happy"),
            Some(&ClassSplitCounts { train: 7, val: 1, test: 2, failed: 0 })
        );
        assert_eq!(
            summary.get("sad"),
            Some(&ClassSplitCounts { train: 2, val: 0, test: 1, failed: 0 })
        );

        let train = names(&output.join("train").join("happy"));
        let val = names(&output.join("val").join("happy"));
        let test = names(&output.join("test").join("happy"));
        assert!(train.is_disjoint(&val) && train.is_disjoint(&test) && val.is_disjoint(&test));
        let union: HashSet<String> = train.union(&val).chain(test.iter()).cloned().collect();
        assert_eq!(union, names(&source.join("happy")));

        // Empty segments still get their folder
        assert!(output.join("val").join("sad").is_dir());

        for split in DatasetSplit::all() {
            for class in ["happy", "sad"] {
                for path in snapshot_files(&output.join(split.as_str()).join(class)).unwrap() {
                    let img = decode_checked(&path).unwrap();
                    assert_eq!((img.width(), img.height()), (224, 224));
                }
            }
        }
    }

    #[test]
    fn test_unreadable_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("augmented_dataset");
        let output = dir.path().join("final_dataset");
        populate(&source, "fear", 4);
        fs::write(source.join("fear").join("zz_bad.jpg"), b"junk").unwrap();
        let config = PipelineConfig::with_root(dir.path());
        let mut rng = ChaCha8Rng::seed_from_u64(13);

        let summary = partition_dataset(&source, &output, &config, &mut rng).unwrap();
        let counts = summary.get("fear").unwrap();

        assert_eq!(counts.failed, 1);
        assert_eq!(counts.written(), 4);
        for split in DatasetSplit::all() {
            assert!(!output_path(&output, split, "fear", "zz_bad.jpg").exists());
        }
    }

    #[test]
    fn test_rerun_replaces_previous_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("augmented_dataset");
        let output = dir.path().join("final_dataset");
        populate(&source, "angry", 20);
        let config = PipelineConfig {
            target_size: TargetSize { width: 8, height: 8 },
            ..PipelineConfig::with_root(dir.path())
        };

        partition_dataset(&source, &output, &config, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        partition_dataset(&source, &output, &config, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();

        let train = names(&output.join("train").join("angry"));
        let val = names(&output.join("val").join("angry"));
        let test = names(&output.join("test").join("angry"));
        assert_eq!(train.len() + val.len() + test.len(), 20);
        assert_eq!((train.len(), val.len(), test.len()), (14, 3, 3));
        assert!(train.is_disjoint(&val) && train.is_disjoint(&test) && val.is_disjoint(&test));
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("augmented_dataset");
        populate(&source, "neutral", 12);
        let config = PipelineConfig {
            target_size: TargetSize { width: 16, height: 16 },
            ..PipelineConfig::with_root(dir.path())
        };

        let out_a = dir.path().join("a");
        let out_b = dir.path().join("b");
        partition_dataset(&source, &out_a, &config, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
        partition_dataset(&source, &out_b, &config, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();

        for split in DatasetSplit::all() {
            assert_eq!(
                names(&out_a.join(split.as_str()).join("neutral")),
                names(&out_b.join(split.as_str()).join("neutral"))
            );
        }
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::with_root(dir.path());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = partition_dataset(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            &config,
            &mut rng,
        );
        assert!(matches!(result, Err(PipelineError::Scan { .. })));
    }
}
