use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn settings_file_version() -> u32 {
    1
}

fn default_workers() -> usize {
    4
}

/// Persisted engine preferences, read at startup and written back only by
/// explicit edits (there is no settings subcommand yet, the file is
/// hand-maintained).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "settings_file_version")]
    pub version: u32,
    #[serde(default)]
    pub auto_install: bool,
    #[serde(default)]
    pub bleeding_edge: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: settings_file_version(),
            auto_install: false,
            bleeding_edge: false,
            workers: default_workers(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading settings file: {}", path.display()));
            }
        };

        toml::from_str(&content)
            .with_context(|| format!("failed parsing settings file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string(self)
            .with_context(|| format!("failed serializing settings: {}", path.display()))?;
        fs::write(path, content)
            .with_context(|| format!("failed writing settings file: {}", path.display()))
    }
}
