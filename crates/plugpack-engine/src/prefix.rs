use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// On-disk layout of one managed prefix. Package files land directly under
/// the prefix root; engine state lives under `state/` and cached index
/// documents under `cache/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    root: PathBuf,
}

impl Prefix {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir().join("registry.toml")
    }

    pub fn remotes_path(&self) -> PathBuf {
        self.state_dir().join("remotes.toml")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.state_dir().join("settings.toml")
    }

    pub fn index_path(&self, remote: &str) -> PathBuf {
        self.cache_dir().join(format!("{remote}.xml"))
    }

    /// Absolute location of a file path recorded relative to the prefix
    /// root.
    pub fn target(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.state_dir(), self.cache_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_prefix() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user prefix")?;
        return Ok(PathBuf::from(app_data).join("PlugPack"));
    }

    let home = env::var("HOME").context("HOME is not set; cannot resolve user prefix")?;
    Ok(PathBuf::from(home).join(".plugpack"))
}
