use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use plugpack_core::{Package, PackageType, Sections, Version, VersionName};
use serde::{Deserialize, Serialize};

/// Identity of one registry entry: a package installed from a remote.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryKey {
    pub remote: String,
    pub category: String,
    pub package: String,
}

impl EntryKey {
    pub fn new(
        remote: impl Into<String>,
        category: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            remote: remote.into(),
            category: category.into(),
            package: package.into(),
        }
    }
}

/// One file owned by an installed package. Paths are slash-joined and
/// relative to the prefix root, matching container entry paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub package_type: PackageType,
    pub sections: Sections,
}

impl FileRecord {
    pub fn fs_path(&self) -> PathBuf {
        self.path.split('/').collect()
    }
}

/// The persisted truth of one installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub remote: String,
    pub category: String,
    pub package: String,
    pub version: VersionName,
    pub pinned: bool,
    pub files: Vec<FileRecord>,
}

impl Entry {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(&self.remote, &self.category, &self.package)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}/{}", self.remote, self.category, self.package)
    }

    /// Files participating in host integration sections.
    pub fn main_files(&self) -> Vec<FileRecord> {
        self.files
            .iter()
            .filter(|file| !file.sections.is_empty())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FileRecordToml {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sections: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    remote: String,
    category: String,
    package: String,
    version: String,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    files: Vec<FileRecordToml>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "registry_file_version")]
    version: u32,
    #[serde(default)]
    entries: Vec<EntryRecord>,
}

fn registry_file_version() -> u32 {
    1
}

/// Transactional ledger of what is installed on disk.
///
/// Mutations go through a write-ahead change log guarded by an explicit
/// checkpoint stack: `savepoint` pushes a marker, `restore` replays the
/// log backward to the latest marker, `commit` discards it. Popping the
/// last marker persists the ledger to its TOML file; a registry dropped
/// with pending checkpoints abandons uncommitted changes.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    entries: BTreeMap<EntryKey, Entry>,
    log: Vec<(EntryKey, Option<Entry>)>,
    checkpoints: Vec<usize>,
}

impl Registry {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut registry = Self {
            path,
            entries: BTreeMap::new(),
            log: Vec::new(),
            checkpoints: Vec::new(),
        };

        if !registry.path.exists() {
            return Ok(registry);
        }

        let content = fs::read_to_string(&registry.path).with_context(|| {
            format!("failed reading registry file: {}", registry.path.display())
        })?;
        let state: RegistryFile = toml::from_str(&content).with_context(|| {
            format!("failed parsing registry file: {}", registry.path.display())
        })?;

        for record in state.entries {
            let entry = Entry {
                version: VersionName::parse(&record.version).with_context(|| {
                    format!("invalid registry entry version for '{}'", record.package)
                })?,
                remote: record.remote,
                category: record.category,
                package: record.package,
                pinned: record.pinned,
                files: record
                    .files
                    .into_iter()
                    .map(|file| FileRecord {
                        path: file.path,
                        package_type: PackageType::parse(&file.kind),
                        sections: Sections::from_bits(file.sections),
                    })
                    .collect(),
            };
            registry.entries.insert(entry.key(), entry);
        }

        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, key: &EntryKey) -> Option<Entry> {
        self.entries.get(key).cloned()
    }

    pub fn entry_for(&self, package: &Package) -> Option<Entry> {
        self.entry(&EntryKey::new(
            package.remote(),
            package.category(),
            package.name(),
        ))
    }

    /// Every entry installed from one remote, in key order.
    pub fn entries(&self, remote: &str) -> Vec<Entry> {
        self.entries
            .values()
            .filter(|entry| entry.remote == remote)
            .cloned()
            .collect()
    }

    pub fn all_entries(&self) -> Vec<Entry> {
        self.entries.values().cloned().collect()
    }

    /// Inserts or replaces the entry for a resolved version.
    pub fn push(&mut self, version: &Version, pinned: bool) -> Entry {
        let entry = Entry {
            remote: version.remote().to_string(),
            category: version.category().to_string(),
            package: version.package().to_string(),
            version: version.name().clone(),
            pinned,
            files: version
                .sources()
                .iter()
                .map(|source| FileRecord {
                    path: source.target_entry(),
                    package_type: version.package_type(),
                    sections: source.sections(),
                })
                .collect(),
        };

        let key = entry.key();
        self.record(&key);
        self.entries.insert(key, entry.clone());
        entry
    }

    pub fn set_pinned(&mut self, key: &EntryKey, pinned: bool) -> Result<()> {
        self.record(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.pinned = pinned;
                Ok(())
            }
            None => {
                self.log.pop();
                bail!("no registry entry for '{}'", key.package);
            }
        }
    }

    pub fn forget(&mut self, key: &EntryKey) {
        self.record(key);
        self.entries.remove(key);
    }

    /// Opens a transactional boundary.
    pub fn savepoint(&mut self) {
        self.checkpoints.push(self.log.len());
    }

    /// Reverts every change made since the latest savepoint.
    pub fn restore(&mut self) {
        let marker = self.checkpoints.pop().unwrap_or(0);
        while self.log.len() > marker {
            if let Some((key, prior)) = self.log.pop() {
                match prior {
                    Some(entry) => self.entries.insert(key, entry),
                    None => self.entries.remove(&key),
                };
            }
        }
    }

    /// Discards the latest savepoint, keeping its changes. Discarding the
    /// outermost savepoint persists the ledger to disk.
    pub fn commit(&mut self) -> Result<()> {
        self.checkpoints.pop();
        if self.checkpoints.is_empty() {
            self.log.clear();
            self.persist()?;
        }
        Ok(())
    }

    fn record(&mut self, key: &EntryKey) {
        let prior = self.entries.get(key).cloned();
        self.log.push((key.clone(), prior));
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let state = RegistryFile {
            version: registry_file_version(),
            entries: self
                .entries
                .values()
                .map(|entry| EntryRecord {
                    remote: entry.remote.clone(),
                    category: entry.category.clone(),
                    package: entry.package.clone(),
                    version: entry.version.name().to_string(),
                    pinned: entry.pinned,
                    files: entry
                        .files
                        .iter()
                        .map(|file| FileRecordToml {
                            path: file.path.clone(),
                            kind: file.package_type.as_str().to_string(),
                            sections: file.sections.bits(),
                        })
                        .collect(),
                })
                .collect(),
        };
        let content = toml::to_string(&state)
            .with_context(|| format!("failed serializing registry: {}", self.path.display()))?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed writing registry: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests;
