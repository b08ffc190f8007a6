use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use plugpack_core::{ContainerReader, Version};
use plugpack_registry::{Entry, EntryKey, Registry};
use tracing::debug;

use crate::download::Downloader;
use crate::pool::{Job, WorkerPool};
use crate::prefix::Prefix;
use crate::receipt::Receipt;
use crate::transaction::Registration;

/// Everything a task may touch while starting or committing. Built fresh
/// for each call so tasks never hold engine state across phases.
pub(crate) struct TaskContext<'a> {
    pub prefix: &'a Prefix,
    pub registry: &'a mut Registry,
    pub pool: &'a mut WorkerPool,
    pub downloader: &'a Arc<dyn Downloader>,
    pub receipt: &'a mut Receipt,
    pub registrations: &'a mut Vec<Registration>,
}

/// One committable unit of work. Start stages asynchronous I/O on the
/// pool; commit applies the result to disk and registry; rollback discards
/// staged state and nothing else.
pub(crate) enum Task {
    Install(InstallTask),
    Uninstall(UninstallTask),
    Pin(PinTask),
}

impl Task {
    /// Start ordering within a batch. Uninstalls run first so paths they
    /// release can be re-created by installs in the same batch.
    pub fn sort_key(&self) -> (u8, String, String, String) {
        match self {
            Self::Uninstall(task) => (
                0,
                task.entry.remote.clone(),
                task.entry.category.clone(),
                task.entry.package.clone(),
            ),
            Self::Install(task) => (
                1,
                task.version.remote().to_string(),
                task.version.category().to_string(),
                task.version.package().to_string(),
            ),
            Self::Pin(task) => (
                2,
                task.entry.remote.clone(),
                task.entry.category.clone(),
                task.entry.package.clone(),
            ),
        }
    }

    pub fn location(&self) -> String {
        match self {
            Self::Install(task) => task.version.full_name(),
            Self::Uninstall(task) => task.entry.full_name(),
            Self::Pin(task) => task.entry.full_name(),
        }
    }

    pub fn start(&mut self, tag: usize, ctx: &mut TaskContext<'_>) -> Result<()> {
        match self {
            Self::Install(task) => task.start(tag, ctx),
            Self::Uninstall(_) | Self::Pin(_) => Ok(()),
        }
    }

    pub fn commit(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        match self {
            Self::Install(task) => task.commit(ctx),
            Self::Uninstall(task) => task.commit(ctx),
            Self::Pin(task) => task.commit(ctx),
        }
    }

    pub fn rollback(&mut self, prefix: &Prefix) {
        if let Self::Install(task) = self {
            task.rollback(prefix);
        }
    }
}

struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
}

pub(crate) struct InstallTask {
    version: Version,
    pinned: bool,
    container: Option<Arc<dyn ContainerReader>>,
    previous: Option<Entry>,
    staged: Vec<StagedFile>,
}

impl InstallTask {
    pub fn new(version: Version, pinned: bool, container: Option<Arc<dyn ContainerReader>>) -> Self {
        Self {
            version,
            pinned,
            container,
            previous: None,
            staged: Vec::new(),
        }
    }

    fn start(&mut self, tag: usize, ctx: &mut TaskContext<'_>) -> Result<()> {
        debug!(version = %self.version.full_name(), "staging install");

        self.previous = ctx.registry.entry(&EntryKey::new(
            self.version.remote(),
            self.version.category(),
            self.version.package(),
        ));

        for source in self.version.sources() {
            let target = ctx.prefix.target(&source.target_path());
            let mut temp = target.clone().into_os_string();
            temp.push(".part");
            let temp = PathBuf::from(temp);

            if let Some(parent) = temp.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }

            let job: Job = match &self.container {
                Some(reader) => {
                    let reader = Arc::clone(reader);
                    let entry = source.target_entry();
                    let out_path = temp.clone();
                    Box::new(move || {
                        let mut out = fs::File::create(&out_path).with_context(|| {
                            format!("failed to create {}", out_path.display())
                        })?;
                        reader
                            .extract_to(&entry, &mut out)
                            .with_context(|| format!("failed extracting {entry}"))
                    })
                }
                None => {
                    let downloader = Arc::clone(ctx.downloader);
                    let url = source.url().to_string();
                    let out_path = temp.clone();
                    Box::new(move || {
                        let bytes = downloader.fetch(&url)?;
                        fs::write(&out_path, bytes)
                            .with_context(|| format!("failed to write {}", out_path.display()))
                    })
                }
            };
            ctx.pool.push(tag, job);
            self.staged.push(StagedFile { temp, target });
        }

        Ok(())
    }

    fn commit(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        for staged in &self.staged {
            fs::rename(&staged.temp, &staged.target).with_context(|| {
                format!("failed to move {} into place", staged.target.display())
            })?;
        }

        if let Some(previous) = &self.previous {
            let keep: BTreeSet<PathBuf> = self.version.files();
            for file in &previous.files {
                let relative = file.fs_path();
                if keep.contains(&relative) {
                    continue;
                }
                let absolute = ctx.prefix.target(&relative);
                match fs::remove_file(&absolute) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => ctx.receipt.add_error(file.path.clone(), err.to_string()),
                }
            }
        }

        let pinned = self.pinned || self.previous.as_ref().is_some_and(|entry| entry.pinned);
        let entry = ctx.registry.push(&self.version, pinned);
        ctx.receipt.add_install(
            entry.full_name(),
            self.version.name().clone(),
            self.previous.as_ref().map(|entry| entry.version.clone()),
        );
        ctx.registrations.push(Registration {
            entry,
            remove: false,
        });
        Ok(())
    }

    fn rollback(&mut self, _prefix: &Prefix) {
        for staged in self.staged.drain(..) {
            let _ = fs::remove_file(&staged.temp);
        }
    }
}

pub(crate) struct UninstallTask {
    entry: Entry,
}

impl UninstallTask {
    pub fn new(entry: Entry) -> Self {
        Self { entry }
    }

    fn commit(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        debug!(entry = %self.entry.full_name(), "removing entry");

        for file in &self.entry.files {
            let absolute = ctx.prefix.target(&file.fs_path());
            match fs::remove_file(&absolute) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => ctx.receipt.add_error(file.path.clone(), err.to_string()),
            }
        }

        ctx.registry.forget(&self.entry.key());
        ctx.receipt.add_removal(self.entry.full_name());
        ctx.registrations.push(Registration {
            entry: self.entry.clone(),
            remove: true,
        });
        Ok(())
    }
}

pub(crate) struct PinTask {
    entry: Entry,
    pinned: bool,
}

impl PinTask {
    pub fn new(entry: Entry, pinned: bool) -> Self {
        Self { entry, pinned }
    }

    fn commit(&mut self, ctx: &mut TaskContext<'_>) -> Result<()> {
        ctx.registry.set_pinned(&self.entry.key(), self.pinned)
    }
}
