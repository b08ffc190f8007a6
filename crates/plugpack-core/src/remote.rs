use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::fields::{quote_field, split_fields};

/// Per-remote override of the global auto-install setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoInstall {
    #[default]
    Default,
    Enabled,
    Disabled,
}

impl AutoInstall {
    pub fn as_override(self) -> Option<bool> {
        match self {
            Self::Default => None,
            Self::Enabled => Some(true),
            Self::Disabled => Some(false),
        }
    }

    fn as_record(self) -> &'static str {
        match self {
            Self::Default => "-",
            Self::Enabled => "1",
            Self::Disabled => "0",
        }
    }

    fn parse_record(input: &str) -> Result<Self> {
        match input {
            "-" => Ok(Self::Default),
            "1" => Ok(Self::Enabled),
            "0" => Ok(Self::Disabled),
            other => Err(anyhow!("invalid auto-install flag: '{other}'")),
        }
    }
}

/// A named, URL-addressed source of one package index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    name: String,
    url: String,
    enabled: bool,
    protected: bool,
    auto_install: AutoInstall,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_remote_name(&name)?;

        Ok(Self {
            name,
            url: url.into(),
            enabled: true,
            protected: false,
            auto_install: AutoInstall::Default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// A protected remote cannot be disabled or removed by an archive
    /// import, and keeps its local URL when one is imported over it.
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn protect(&mut self) {
        self.protected = true;
    }

    pub fn auto_install(&self) -> AutoInstall {
        self.auto_install
    }

    pub fn set_auto_install(&mut self, auto_install: AutoInstall) {
        self.auto_install = auto_install;
    }

    /// Serializes the remote as the fields of an archive `REPO` record.
    pub fn to_record(&self) -> String {
        format!(
            "{} {} {} {}",
            quote_field(&self.name),
            quote_field(&self.url),
            u8::from(self.enabled),
            self.auto_install.as_record()
        )
    }

    /// Parses the fields of an archive `REPO` record.
    pub fn from_record(record: &str) -> Result<Self> {
        let fields = split_fields(record)?;
        let [name, url, enabled, auto_install] = fields.as_slice() else {
            bail!("malformed remote record: '{record}'");
        };

        let mut remote = Self::new(name.as_str(), url.as_str())?;
        remote.enabled = match enabled.as_str() {
            "1" => true,
            "0" => false,
            other => bail!("invalid enabled flag: '{other}'"),
        };
        remote.auto_install = AutoInstall::parse_record(auto_install)?;
        Ok(remote)
    }
}

fn validate_remote_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("invalid remote name: must not be empty");
    }
    if name
        .chars()
        .any(|ch| ch.is_control() || matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        bail!("invalid remote name: '{name}'");
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteRecord {
    name: String,
    url: String,
    #[serde(default = "enabled_default")]
    enabled: bool,
    #[serde(default)]
    protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_install: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteListFile {
    #[serde(default = "state_file_version")]
    version: u32,
    #[serde(default)]
    remotes: Vec<RemoteRecord>,
}

impl Default for RemoteListFile {
    fn default() -> Self {
        Self {
            version: state_file_version(),
            remotes: Vec::new(),
        }
    }
}

fn state_file_version() -> u32 {
    1
}

fn enabled_default() -> bool {
    true
}

/// The configured remotes, persisted as a TOML state file.
#[derive(Debug, Clone, Default)]
pub struct RemoteList {
    remotes: Vec<Remote>,
}

impl RemoteList {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading remotes file: {}", path.display()))?;
        let state: RemoteListFile = toml::from_str(&content)
            .with_context(|| format!("failed parsing remotes file: {}", path.display()))?;

        let mut list = Self::default();
        for record in state.remotes {
            let mut remote = Remote::new(record.name, record.url)?;
            remote.enabled = record.enabled;
            remote.protected = record.protected;
            remote.auto_install = match record.auto_install {
                None => AutoInstall::Default,
                Some(true) => AutoInstall::Enabled,
                Some(false) => AutoInstall::Disabled,
            };
            list.add(remote);
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let state = RemoteListFile {
            version: state_file_version(),
            remotes: self
                .remotes
                .iter()
                .map(|remote| RemoteRecord {
                    name: remote.name.clone(),
                    url: remote.url.clone(),
                    enabled: remote.enabled,
                    protected: remote.protected,
                    auto_install: remote.auto_install.as_override(),
                })
                .collect(),
        };
        let content = toml::to_string(&state)
            .with_context(|| format!("failed serializing remotes file: {}", path.display()))?;
        fs::write(path, content)
            .with_context(|| format!("failed writing remotes file: {}", path.display()))
    }

    /// Inserts or replaces a remote by name.
    pub fn add(&mut self, remote: Remote) {
        match self
            .remotes
            .iter_mut()
            .find(|existing| existing.name == remote.name)
        {
            Some(existing) => *existing = remote,
            None => self.remotes.push(remote),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|remote| remote.name == name)
    }

    /// Removes a remote by name; protected remotes are left in place.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.remotes.len();
        self.remotes
            .retain(|remote| remote.name != name || remote.protected);
        self.remotes.len() != before
    }

    pub fn all(&self) -> &[Remote] {
        &self.remotes
    }

    pub fn enabled(&self) -> Vec<Remote> {
        self.remotes
            .iter()
            .filter(|remote| remote.enabled)
            .cloned()
            .collect()
    }
}
