//! Class balancing by augmentation.
//!
//! Every class is topped up to the largest class population with randomly
//! augmented copies of its own images, then receives a proportional
//! "diversity" surplus. The surplus is added to every class, balanced or not,
//! so classes that needed topping up end above the target.

use image::DynamicImage;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::core::dataset::{class_population, count_files, snapshot_files, ClassList, DatasetSplit};
use crate::core::image::{decode_checked, encode_canonical, AugmentParams, ImageOpError};
use crate::core::operations::{copy_file, ensure_dir, file_name_of, recreate_dir};
use crate::core::report::{write_json_report, AugmentationReport};

use super::PipelineError;

/// Why an augmented image was generated; determines its file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmentPurpose {
    /// Topping a class up to the target population
    Balance,
    /// Extra variety added to every class
    Diversity,
}

impl AugmentPurpose {
    pub fn tag(&self) -> &str {
        match self {
            AugmentPurpose::Balance => "aug",
            AugmentPurpose::Diversity => "extra",
        }
    }

    /// `{class}_{tag}_{index:04}.{ext}`, with `index` starting at 1
    pub fn file_name(&self, class: &str, index: usize, ext: &str) -> String {
        format!("{}_{}_{:04}.{}", class, self.tag(), index, ext)
    }
}

/// Number of balancing and diversity rounds planned for one class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentPlan {
    pub needed: usize,
    pub extra: usize,
}

impl AugmentPlan {
    pub fn new(current: usize, target: usize, diversity_fraction: f64) -> Self {
        Self {
            needed: target.saturating_sub(current),
            extra: (current as f64 * diversity_fraction).floor() as usize,
        }
    }

    /// Population reached when every round succeeds
    pub fn expected_total(&self, current: usize) -> usize {
        current + self.needed + self.extra
    }
}

/// Balance the classes of the cleaned train split into the augmented root and
/// persist the before/after report.
pub fn augment_split<R: Rng + ?Sized>(
    config: &PipelineConfig,
    classes: &ClassList,
    rng: &mut R,
) -> Result<AugmentationReport, PipelineError> {
    let source_root = config.split_dir(DatasetSplit::Train);
    let dest_root = config.augmented_root();

    let report = balance_dataset(&source_root, &dest_root, classes, config, rng)?;

    let report_path = config.augmentation_report_path();
    write_json_report(&report_path, &report)?;
    info!("Augmentation completed. Summary report saved to: {:?}", report_path);

    Ok(report)
}

/// Copy every class from `source_root` into a fresh folder under `dest_root`
/// and synthesize augmented images until each reaches the largest class
/// population, plus the diversity surplus.
///
/// Per-image failures are logged and skipped; only an uncreatable
/// `dest_root` fails the call.
pub fn balance_dataset<R: Rng + ?Sized>(
    source_root: &Path,
    dest_root: &Path,
    classes: &ClassList,
    config: &PipelineConfig,
    rng: &mut R,
) -> Result<AugmentationReport, PipelineError> {
    let _span = info_span!("balance").entered();
    ensure_dir(dest_root)?;

    let before = class_population(source_root, classes);
    let target = before.values().copied().max().unwrap_or(0);
    info!("Target population per class: {}", target);

    let mut report = AugmentationReport {
        before_augmentation: before,
        ..AugmentationReport::default()
    };

    for class in classes.iter() {
        info!("Processing class: {}", class);
        let src_folder = source_root.join(class);
        if !src_folder.is_dir() {
            warn!("Skipping {} - folder not found", class);
            continue;
        }

        let images = match snapshot_files(&src_folder) {
            Ok(images) => images,
            Err(e) => {
                warn!("Skipping {} - failed to list {:?}: {}", class, src_folder, e);
                continue;
            }
        };
        if images.is_empty() {
            warn!("No images found in {}", class);
            continue;
        }

        let dest_folder = dest_root.join(class);
        if let Err(e) = recreate_dir(&dest_folder) {
            error!("Skipping {}: {}", class, e);
            continue;
        }

        copy_originals(&images, &dest_folder, class);

        let plan = AugmentPlan::new(images.len(), target, config.diversity_fraction);
        debug!(
            "{}: {} balancing rounds, {} diversity rounds, expecting {} images",
            class,
            plan.needed,
            plan.extra,
            plan.expected_total(images.len())
        );

        for (purpose, rounds) in [
            (AugmentPurpose::Balance, plan.needed),
            (AugmentPurpose::Diversity, plan.extra),
        ] {
            run_rounds(purpose, rounds, &images, &dest_folder, class, config, rng);
        }

        let total = count_files(&dest_folder);
        info!("Finished {}: total {} images", class, total);
        report.after_augmentation.insert(class, total);
    }

    Ok(report)
}

fn copy_originals(images: &[PathBuf], dest_folder: &Path, class: &str) {
    let mut failed = 0;
    for img_path in images {
        let dest_path = dest_folder.join(file_name_of(img_path));
        if let Err(e) = copy_file(img_path, &dest_path) {
            warn!("Skipped {} in {}: {}", file_name_of(img_path), class, e);
            failed += 1;
        }
    }
    info!(
        "Copied originals for {}: {} succeeded, {} failed",
        class,
        images.len() - failed,
        failed
    );
}

/// Perform `rounds` augmentations, each from an image drawn uniformly with
/// replacement from `images`.
fn run_rounds<R: Rng + ?Sized>(
    purpose: AugmentPurpose,
    rounds: usize,
    images: &[PathBuf],
    dest_folder: &Path,
    class: &str,
    config: &PipelineConfig,
    rng: &mut R,
) {
    if rounds == 0 || images.is_empty() {
        return;
    }

    let mut failed = 0;
    for i in 1..=rounds {
        let source = &images[rng.gen_range(0..images.len())];
        let params = AugmentParams::sample(rng, &config.augmentation);
        let dest_path = dest_folder.join(purpose.file_name(class, i, &config.canonical_extension));

        if let Err(e) = augment_file(source, &dest_path, &params, config.jpeg_quality) {
            warn!("{:?} augmentation failed for {}: {}", purpose, class, e);
            failed += 1;
        }
    }

    info!(
        "{:?} pass for {} complete: {} succeeded, {} failed",
        purpose,
        class,
        rounds - failed,
        failed
    );
}

fn augment_file(
    source: &Path,
    dest: &Path,
    params: &AugmentParams,
    quality: u8,
) -> Result<(), ImageOpError> {
    let img = decode_checked(source)?.to_rgb8();
    let augmented = params.apply(&img);
    encode_canonical(&DynamicImage::ImageRgb8(augmented), dest, quality)
}
