//! The three pipeline stages and the orchestration that chains them.
//!
//! Data only flows downstream: the validator cleans the raw splits in place,
//! the balancer reads the cleaned train split into `augmented_dataset/`, and
//! the partitioner reads that into `final_dataset/`.

mod balancer;
mod partitioner;
mod validator;

pub use balancer::augment_split;
pub use partitioner::{split_augmented, ClassSplitCounts, SplitSummary};
pub use validator::{clean_split, CleanOutcome};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, PipelineConfig};
use crate::core::dataset::{ClassList, ClassListError, DatasetSplit};
use crate::core::operations::FileOpError;
use crate::core::report::{AugmentationReport, ReportError};

/// Failures that stop a stage as a whole. Per-file problems never end up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Classes(#[from] ClassListError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    FileOp(#[from] FileOpError),

    #[error("failed to scan {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Splits cleaned by the validator, in processing order
pub const CLEANED_SPLITS: [DatasetSplit; 2] = [DatasetSplit::Train, DatasetSplit::Test];

/// Random source for every stage: seeded when a seed is configured,
/// otherwise drawn from OS entropy.
pub fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => {
            info!("Using fixed random seed {}", seed);
            ChaCha8Rng::seed_from_u64(seed)
        }
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Results of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub cleaned: Vec<(DatasetSplit, CleanOutcome)>,
    pub augmentation: AugmentationReport,
    pub split: SplitSummary,
}

/// Clean every raw split
pub fn run_clean(
    config: &PipelineConfig,
    classes: &ClassList,
) -> Result<Vec<(DatasetSplit, CleanOutcome)>, PipelineError> {
    CLEANED_SPLITS
        .iter()
        .map(|&split| clean_split(config, classes, split).map(|outcome| (split, outcome)))
        .collect()
}

/// Run validator, balancer and partitioner in order with one shared RNG.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineSummary, PipelineError> {
    config.validate()?;
    let classes = ClassList::load(&config.classes_path())?;
    info!("Loaded {} classes", classes.len());

    let mut rng = make_rng(config.seed);

    let cleaned = run_clean(config, &classes)?;
    let augmentation = augment_split(config, &classes, &mut rng)?;
    let split = split_augmented(config, &mut rng)?;

    Ok(PipelineSummary {
        cleaned,
        augmentation,
        split,
    })
}
