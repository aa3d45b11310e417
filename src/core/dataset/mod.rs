mod class_list;
mod dataset;

pub use class_list::{ClassList, ClassListError};
pub use dataset::{class_population, count_files, list_class_dirs, snapshot_files, DatasetSplit};
