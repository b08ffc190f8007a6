mod export;
mod import;
mod toc;
mod zip;

pub use export::{export, ExportOutcome};
pub use import::import;
pub use zip::{ZipReader, ZipWriter};

/// File extension of portable archive files.
pub const ARCHIVE_EXTENSION: &str = "PlugPackArchive";
