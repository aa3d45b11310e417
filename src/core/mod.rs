pub mod dataset;
pub mod image;
pub mod operations;
pub mod pipeline;
pub mod report;
