mod file_ops;

pub use file_ops::{copy_file, ensure_dir, file_name_of, recreate_dir, remove_file, FileOpError};
