//! Locale files: formats, normalization, and directory I/O.

pub mod directory;
pub mod file;
pub mod format;

pub use directory::{load_directory, load_file, write_directory, write_file};
pub use file::LocaleFile;
pub use format::FileFormat;
