mod pipeline_config;

pub use pipeline_config::{AugmentationConfig, ConfigError, PipelineConfig, SplitRatios, TargetSize};
