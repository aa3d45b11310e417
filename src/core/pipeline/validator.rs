//! Integrity cleaning: drop unreadable files and normalize the rest to the
//! canonical encoding, in place.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::core::dataset::{snapshot_files, ClassList, DatasetSplit};
use crate::core::image::{
    decode_checked, encode_canonical, extension_of, has_extension, ImageOpError,
};
use crate::core::operations::{file_name_of, remove_file};
use crate::core::report::{write_json_report, write_lines, ClassMap, CleanCounts};

use super::PipelineError;

/// Everything the validator learned about one dataset tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanOutcome {
    pub report: ClassMap<CleanCounts>,
    /// Original names of files re-encoded to the canonical format
    pub converted: Vec<String>,
    /// Names of files deleted as unreadable or not an image
    pub removed: Vec<String>,
}

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileFate {
    Kept,
    Converted(PathBuf),
    Removed,
}

/// Clean one split of the raw dataset and persist its report and logs.
pub fn clean_split(
    config: &PipelineConfig,
    classes: &ClassList,
    split: DatasetSplit,
) -> Result<CleanOutcome, PipelineError> {
    let dataset_path = config.split_dir(split);
    let outcome = clean_dataset(&dataset_path, classes, config);

    let report_path = config.clean_report_path(split);
    let converted_path = config.converted_log_path(split);
    let removed_path = config.removed_log_path(split);

    write_json_report(&report_path, &outcome.report)?;
    write_lines(&converted_path, &outcome.converted)?;
    write_lines(&removed_path, &outcome.removed)?;

    info!("Cleaning completed for {:?}", dataset_path);
    info!("Report saved to: {:?}", report_path);
    info!(
        "Converted files logged in: {:?} ({})",
        converted_path,
        outcome.converted.len()
    );
    info!(
        "Removed files logged in: {:?} ({})",
        removed_path,
        outcome.removed.len()
    );

    Ok(outcome)
}

/// Validate and normalize every class folder under `dataset_path`.
///
/// Classes are visited in class-list order. Each folder is listed once up
/// front and the deletions and rewrites are applied against that snapshot.
///
/// Known looseness: converting `x.png` when `x.jpg` is already present
/// overwrites `x.jpg`, which was counted valid on its own. Both files stay
/// counted as valid, so `valid` can exceed the number of files left on disk.
pub fn clean_dataset(
    dataset_path: &Path,
    classes: &ClassList,
    config: &PipelineConfig,
) -> CleanOutcome {
    let _span = info_span!("validate").entered();
    let mut outcome = CleanOutcome::default();

    for class in classes.iter() {
        let class_folder = dataset_path.join(class);
        if !class_folder.is_dir() {
            warn!("Missing folder for class: {}", class);
            continue;
        }

        let files = match snapshot_files(&class_folder) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list {:?}: {}. Skipping class {}", class_folder, e, class);
                continue;
            }
        };

        info!("Checking {} ({} files)", class, files.len());
        let mut counts = CleanCounts::default();

        for path in &files {
            let name = file_name_of(path);
            match clean_file(path, config) {
                FileFate::Kept => counts.valid += 1,
                FileFate::Converted(new_path) => {
                    debug!("Converted {:?} -> {:?}", path, new_path);
                    outcome.converted.push(name);
                    counts.valid += 1;
                }
                FileFate::Removed => {
                    outcome.removed.push(name);
                    counts.removed += 1;
                }
            }
        }

        info!(
            "Finished {}: {} valid, {} removed",
            class, counts.valid, counts.removed
        );
        outcome.report.insert(class, counts);
    }

    outcome
}

fn clean_file(path: &Path, config: &PipelineConfig) -> FileFate {
    let recognized = extension_of(path)
        .map(|ext| config.is_recognized_extension(&ext))
        .unwrap_or(false);

    if !recognized {
        debug!("Removing non-image file {:?}", path);
        discard(path);
        return FileFate::Removed;
    }

    let img = match decode_checked(path) {
        Ok(img) => img,
        Err(e) => {
            warn!("Removing unreadable image: {}", e);
            discard(path);
            return FileFate::Removed;
        }
    };

    if has_extension(path, &config.canonical_extension) {
        return FileFate::Kept;
    }

    match convert_to_canonical(path, &img, config) {
        Ok(new_path) => FileFate::Converted(new_path),
        Err(e) => {
            error!("Error converting {:?}: {}", path, e);
            discard(path);
            FileFate::Removed
        }
    }
}

/// Re-encode `img` next to `path` under the canonical extension, then delete
/// the original. Nothing is left under the new name on failure.
fn convert_to_canonical(
    path: &Path,
    img: &image::DynamicImage,
    config: &PipelineConfig,
) -> Result<PathBuf, ImageOpError> {
    let new_path = path.with_extension(&config.canonical_extension);
    encode_canonical(img, &new_path, config.jpeg_quality)?;

    if let Err(e) = remove_file(path) {
        // Keep exactly one copy: drop the fresh output and let the caller discard the original
        discard(&new_path);
        return Err(e.into());
    }

    Ok(new_path)
}

fn discard(path: &Path) {
    if let Err(e) = remove_file(path) {
        warn!("{}", e);
    }
}
