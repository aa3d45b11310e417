//! Image dataset preparation
//!
//! Turns a raw, class-labelled image tree into a clean, balanced,
//! partitioned and uniformly sized dataset:
//!
//! - `clean`: drop unreadable files and normalize the `train` and `test` splits to JPEG
//! - `augment`: balance the cleaned `train` classes into `augmented_dataset/`
//! - `split`: shuffle, cut 70/15/15 and resize into `final_dataset/`
//! - `run`: all three in order

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod config;
mod core;
mod logging;

use crate::config::PipelineConfig;
use crate::core::dataset::ClassList;
use crate::core::pipeline::{
    augment_split, make_rng, run_clean, run_pipeline, split_augmented, ClassSplitCounts,
};
use crate::core::report::to_json_string;

#[derive(Parser)]
#[command(name = "image-dataset-prep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clean, balance and split a labelled image dataset", long_about = None)]
struct Cli {
    /// JSON configuration file; fields left out keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset root holding train/, test/ and classes.txt
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Where augmented_dataset/ and final_dataset/ are written (default: the dataset root)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Seed every random draw for a reproducible run
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory for log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and normalize the train and test splits in place
    Clean,

    /// Balance the cleaned train split by augmentation
    Augment,

    /// Partition the augmented dataset into train/val/test and resize
    Split,

    /// Run clean, augment and split in order
    Run,

    /// Write the classes file used by every stage
    InitClasses {
        /// Class labels, in stage iteration order
        #[arg(required = true)]
        labels: Vec<String>,
    },
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match (&self.config, &self.root) {
            (Some(path), _) => PipelineConfig::load(path)?,
            (None, Some(root)) => PipelineConfig::with_root(root.clone()),
            (None, None) => PipelineConfig::default(),
        };

        if let Some(root) = &self.root {
            config.input_root = root.clone();
        }
        if let Some(output_root) = &self.output_root {
            config.output_root = Some(output_root.clone());
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_classes(config: &PipelineConfig) -> Result<ClassList> {
    let classes = ClassList::load(&config.classes_path())?;
    info!("Loaded {} classes from {:?}", classes.len(), config.classes_path());
    Ok(classes)
}

fn log_split_counts(class: &str, augmented: usize, counts: &ClassSplitCounts) {
    info!(
        "{}: {} images -> train {} / val {} / test {} ({} failed)",
        class, augmented, counts.train, counts.val, counts.test, counts.failed
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::setup_logging(&cli.log_dir, cli.verbose)
        .with_context(|| format!("failed to set up logging in {:?}", cli.log_dir))?;
    info!("Starting image dataset preparation");

    let config = cli.pipeline_config().context("invalid configuration")?;
    info!("Dataset root: {:?}", config.input_root);

    match &cli.command {
        Commands::Clean => {
            let classes = load_classes(&config)?;
            for (split, outcome) in run_clean(&config, &classes)? {
                println!("\n=== {} Dataset Report ===", split.as_str());
                println!("{}", to_json_string(&outcome.report)?);
            }
        }
        Commands::Augment => {
            let classes = load_classes(&config)?;
            let mut rng = make_rng(config.seed);
            augment_split(&config, &classes, &mut rng)?;
        }
        Commands::Split => {
            let mut rng = make_rng(config.seed);
            split_augmented(&config, &mut rng)?;
        }
        Commands::Run => {
            let summary = run_pipeline(&config)?;
            for (split, outcome) in &summary.cleaned {
                println!("\n=== {} Dataset Report ===", split.as_str());
                println!("{}", to_json_string(&outcome.report)?);
            }
            println!("\n=== Augmentation Report ===");
            println!("{}", to_json_string(&summary.augmentation)?);

            for (class, augmented) in summary.augmentation.after_augmentation.iter() {
                if let Some(counts) = summary.split.get(class) {
                    log_split_counts(class, *augmented, counts);
                }
            }
        }
        Commands::InitClasses { labels } => {
            let classes = ClassList::new(labels.iter().map(String::as_str));
            let path = config.classes_path();
            classes.write(&path)?;
            info!("classes file created at: {:?}", path);
        }
    }

    info!("Done");
    Ok(())
}
