use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::platform::{Platform, Sections};
use crate::version::VersionName;

/// Package type tag. Unknown types are rejected at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Script,
    Extension,
    Unknown,
}

impl PackageType {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "script" => Self::Script,
            "extension" => Self::Extension,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Extension => "extension",
            Self::Unknown => "unknown",
        }
    }
}

/// One downloadable file of a version. The back-reference to the owning
/// version is a plain path identifier captured at construction; attaching
/// a source to any other version fails.
#[derive(Debug, Clone)]
pub struct Source {
    owner: String,
    platform: Platform,
    file: String,
    url: String,
    sections: Sections,
    remote: String,
    category: String,
    package: String,
    package_type: PackageType,
}

impl Source {
    pub fn new(
        platform: Platform,
        file: impl Into<String>,
        url: impl Into<String>,
        owner: &Version,
    ) -> Self {
        Self {
            owner: owner.path(),
            platform,
            file: file.into(),
            url: url.into(),
            sections: Sections::NONE,
            remote: owner.remote.clone(),
            category: owner.category.clone(),
            package: owner.package.clone(),
            package_type: owner.package_type,
        }
    }

    pub fn with_sections(mut self, sections: Sections) -> Self {
        self.sections = sections;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn sections(&self) -> Sections {
        self.sections
    }

    /// An empty file path denotes the package's main file.
    pub fn is_main(&self) -> bool {
        self.file.is_empty()
    }

    pub fn file_name(&self) -> &str {
        if self.file.is_empty() {
            &self.package
        } else {
            &self.file
        }
    }

    fn target_segments(&self) -> Vec<&str> {
        match self.package_type {
            PackageType::Script | PackageType::Unknown => vec![
                "Scripts",
                self.remote.as_str(),
                self.category.as_str(),
                self.file_name(),
            ],
            PackageType::Extension => vec!["UserPlugins", self.file_name()],
        }
    }

    /// Install path relative to the prefix root.
    pub fn target_path(&self) -> PathBuf {
        self.target_segments().iter().collect()
    }

    /// Slash-joined logical path, as used by the container codec.
    pub fn target_entry(&self) -> String {
        self.target_segments().join("/")
    }
}

/// One release of a package, owning its platform-compatible sources.
#[derive(Debug, Clone)]
pub struct Version {
    owner: String,
    name: VersionName,
    author: String,
    sources: Vec<Source>,
    remote: String,
    category: String,
    package: String,
    package_type: PackageType,
}

impl Version {
    pub fn new(name: &str, owner: &Package) -> Result<Self> {
        Ok(Self {
            owner: owner.path(),
            name: VersionName::parse(name)?,
            author: String::new(),
            sources: Vec::new(),
            remote: owner.remote.clone(),
            category: owner.category.clone(),
            package: owner.name.clone(),
            package_type: owner.package_type,
        })
    }

    pub fn name(&self) -> &VersionName {
        &self.name
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn full_name(&self) -> String {
        format!(
            "{}/{}/{} v{}",
            self.remote, self.category, self.package, self.name
        )
    }

    pub(crate) fn path(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Adds a source, returning false when it was dropped because its
    /// platform tag does not match the current runtime.
    pub fn add_source(&mut self, source: Source) -> Result<bool> {
        if source.owner != self.path() {
            bail!("source belongs to another version");
        }
        if !source.platform.is_compatible() {
            return Ok(false);
        }

        self.sources.push(source);
        Ok(true)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn main_source(&self) -> Option<&Source> {
        self.sources.iter().find(|source| source.is_main())
    }

    /// Every file this version installs, relative to the prefix root.
    pub fn files(&self) -> BTreeSet<PathBuf> {
        self.sources
            .iter()
            .map(|source| source.target_path())
            .collect()
    }
}

/// A named package owning its ordered releases.
#[derive(Debug, Clone)]
pub struct Package {
    owner: String,
    remote: String,
    category: String,
    package_type: PackageType,
    name: String,
    versions: Vec<Version>,
}

impl Package {
    pub fn new(package_type: PackageType, name: impl Into<String>, owner: &Category) -> Self {
        Self {
            owner: owner.path(),
            remote: owner.owner.clone(),
            category: owner.name.clone(),
            package_type,
            name: name.into(),
            versions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}/{}", self.remote, self.category, self.name)
    }

    pub(crate) fn path(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Adds a version in ascending key order, returning false when it has
    /// no remaining sources after platform filtering or a version with the
    /// same ordering key is already present.
    pub fn add_version(&mut self, version: Version) -> Result<bool> {
        if version.owner != self.path() {
            bail!("version belongs to another package");
        }
        if version.sources.is_empty() {
            return Ok(false);
        }

        match self
            .versions
            .binary_search_by(|existing| existing.name.cmp(&version.name))
        {
            Ok(_) => Ok(false),
            Err(pos) => {
                self.versions.insert(pos, version);
                Ok(true)
            }
        }
    }

    /// Versions in ascending order of their packed key.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn version(&self, name: &VersionName) -> Option<&Version> {
        self.versions
            .binary_search_by(|existing| existing.name.cmp(name))
            .ok()
            .map(|pos| &self.versions[pos])
    }

    pub fn find_version(&self, name: &str) -> Option<&Version> {
        let parsed = VersionName::parse(name).ok()?;
        self.version(&parsed)
    }

    /// The best installable version: the highest whose stability is
    /// compatible with `bleeding_edge`, never below `from` (the installed
    /// version). When only pre-releases at or above a pre-release `from`
    /// exist, they stay eligible so an installed pre-release is never
    /// regressed to an older stable.
    pub fn last_version(&self, bleeding_edge: bool, from: &VersionName) -> Option<&Version> {
        for version in self.versions.iter().rev() {
            if version.name < *from {
                break;
            }
            if bleeding_edge || version.name.is_stable() {
                return Some(version);
            }
        }

        if from.is_stable() {
            None
        } else {
            self.last_version(true, &VersionName::default())
        }
    }
}

/// A category of one index, keyed by name.
#[derive(Debug, Clone)]
pub struct Category {
    owner: String,
    name: String,
    packages: Vec<Package>,
    by_name: HashMap<String, usize>,
}

impl Category {
    pub fn new(name: impl Into<String>, owner: &Index) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            bail!("empty category name");
        }

        Ok(Self {
            owner: owner.name.clone(),
            name,
            packages: Vec::new(),
            by_name: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub(crate) fn path(&self) -> String {
        self.full_name()
    }

    /// Adds a package, returning false when it was silently dropped for
    /// having an unknown type or no remaining versions.
    pub fn add_package(&mut self, package: Package) -> Result<bool> {
        if package.owner != self.path() {
            bail!("package belongs to another category");
        }
        if package.package_type == PackageType::Unknown || package.versions.is_empty() {
            return Ok(false);
        }

        self.by_name
            .insert(package.name.clone(), self.packages.len());
        self.packages.push(package);
        Ok(true)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.by_name.get(name).map(|&pos| &self.packages[pos])
    }
}

/// Parsed metadata document of one remote. Immutable once loaded; shared
/// read-only by every task resolving against it.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    categories: Vec<Category>,
    by_name: HashMap<String, usize>,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            categories: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a category, returning false when it was dropped for having no
    /// eligible packages.
    pub fn add_category(&mut self, category: Category) -> Result<bool> {
        if category.owner != self.name {
            bail!("category belongs to another index");
        }
        if category.packages.is_empty() {
            return Ok(false);
        }

        self.by_name
            .insert(category.name.clone(), self.categories.len());
        self.categories.push(category);
        Ok(true)
    }

    /// Categories in insertion order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.by_name.get(name).map(|&pos| &self.categories[pos])
    }

    /// The flattened union of every category's packages.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.categories
            .iter()
            .flat_map(|category| category.packages.iter())
    }

    pub fn find(&self, category: &str, package: &str) -> Option<&Package> {
        self.category(category)?.package(package)
    }
}
