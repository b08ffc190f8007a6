use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plugpack_core::{ContainerReader, ContainerWriter};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive};

/// Read side of an archive container. Every extraction opens its own
/// handle on the file, so readers may run from multiple pool workers at
/// once.
pub struct ZipReader {
    path: PathBuf,
}

impl ZipReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Self::archive(&path)?;
        Ok(Self { path })
    }

    fn archive(path: &Path) -> Result<ZipArchive<File>> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        ZipArchive::new(file).with_context(|| format!("not a valid archive: {}", path.display()))
    }
}

impl ContainerReader for ZipReader {
    fn locate(&self, entry: &str) -> bool {
        match Self::archive(&self.path) {
            Ok(mut archive) => archive.by_name(entry).is_ok(),
            Err(_) => false,
        }
    }

    fn extract_to(&self, entry: &str, out: &mut dyn Write) -> Result<()> {
        let mut archive = Self::archive(&self.path)?;
        let mut file = archive
            .by_name(entry)
            .with_context(|| format!("no entry '{entry}' in {}", self.path.display()))?;
        io::copy(&mut file, out)
            .with_context(|| format!("failed extracting '{entry}' from {}", self.path.display()))?;
        Ok(())
    }
}

/// Write side of an archive container. The underlying writer keeps
/// directory state between entries, so one entry is added at a time.
pub struct ZipWriter {
    path: PathBuf,
    inner: zip::ZipWriter<File>,
}

impl ZipWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file =
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            inner: zip::ZipWriter::new(file),
            path,
        })
    }

    pub fn finish(mut self) -> Result<()> {
        self.inner
            .finish()
            .with_context(|| format!("failed to finalize {}", self.path.display()))?;
        Ok(())
    }
}

impl ContainerWriter for ZipWriter {
    fn add_entry(&mut self, entry: &str, data: &mut dyn Read) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.inner
            .start_file(entry, options)
            .with_context(|| format!("failed to add '{entry}' to {}", self.path.display()))?;
        io::copy(data, &mut self.inner)
            .with_context(|| format!("failed to write '{entry}' to {}", self.path.display()))?;
        Ok(())
    }
}
