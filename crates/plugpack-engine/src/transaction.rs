use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::mem;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use plugpack_core::{parse_index, ContainerReader, Index, Package, Remote, Version};
use plugpack_registry::{Entry, EntryKey, Registry};
use tracing::{debug, warn};

use crate::download::Downloader;
use crate::pool::{JobResult, WorkerPool};
use crate::prefix::Prefix;
use crate::receipt::Receipt;
use crate::task::{InstallTask, PinTask, Task, TaskContext, UninstallTask};

/// A cached index older than this is re-downloaded on the next fetch.
const STALE_THRESHOLD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Options {
    pub auto_install: bool,
    pub bleeding_edge: bool,
    pub workers: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_install: false,
            bleeding_edge: false,
            workers: 4,
        }
    }
}

/// One deferred host-integration side effect, flushed after the final
/// registry commit.
#[derive(Debug, Clone)]
pub struct Registration {
    pub entry: Entry,
    pub remove: bool,
}

/// Embedder-owned hook applying registrations to the host environment.
/// Failures are recorded in the receipt and never block a commit.
pub trait HostRegistrar: Send {
    fn apply(&mut self, registration: &Registration) -> Result<()>;
}

/// Called once with every obsolete entry found during synchronization;
/// returning true queues their removal.
pub type ObsoleteHandler = Box<dyn FnMut(&[Entry]) -> bool>;

/// Orchestrates one unit of package-manager work: queued intents become
/// priority-ordered task batches, each run under a registry savepoint and
/// committed or rolled back as a whole. The final outer commit persists
/// the registry; cancellation restores it untouched.
pub struct Transaction {
    prefix: Prefix,
    options: Options,
    downloader: Arc<dyn Downloader>,
    registry: Registry,
    pool: WorkerPool,
    indexes: HashMap<String, Arc<Index>>,
    synced: HashSet<String>,
    inhibited: HashSet<String>,
    next_batch: Vec<Task>,
    batches: VecDeque<Vec<Task>>,
    obsolete: Vec<Entry>,
    obsolete_handler: Option<ObsoleteHandler>,
    registrar: Option<Box<dyn HostRegistrar>>,
    registrations: Vec<Registration>,
    receipt: Receipt,
}

impl Transaction {
    pub fn new(prefix: Prefix, options: Options, downloader: Arc<dyn Downloader>) -> Result<Self> {
        prefix.ensure_base_dirs()?;
        let mut registry = Registry::open(prefix.registry_path())?;
        registry.savepoint();
        let pool = WorkerPool::new(options.workers.max(1));

        Ok(Self {
            prefix,
            options,
            downloader,
            registry,
            pool,
            indexes: HashMap::new(),
            synced: HashSet::new(),
            inhibited: HashSet::new(),
            next_batch: Vec::new(),
            batches: VecDeque::new(),
            obsolete: Vec::new(),
            obsolete_handler: None,
            registrar: None,
            registrations: Vec::new(),
            receipt: Receipt::default(),
        })
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn set_obsolete_handler(&mut self, handler: ObsoleteHandler) {
        self.obsolete_handler = Some(handler);
    }

    pub fn set_registrar(&mut self, registrar: Box<dyn HostRegistrar>) {
        self.registrar = Some(registrar);
    }

    /// Shared flag checked by queued pool jobs; setting it aborts the run.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.pool.cancel_flag()
    }

    pub fn abort(&mut self) {
        self.pool.abort();
    }

    pub fn report_error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.receipt.add_error(context, message);
    }

    /// Resolves every package of the remote against the registry, queueing
    /// installs per the resolution rule. Idempotent within one transaction
    /// and a no-op for inhibited remotes.
    pub fn synchronize(&mut self, remote: &Remote, force_auto_install: Option<bool>) -> Result<()> {
        if self.inhibited.contains(remote.name()) {
            return Ok(());
        }
        if !self.synced.insert(remote.name().to_string()) {
            return Ok(());
        }

        debug!(remote = remote.name(), "synchronizing");
        let index = match self.fetch_index(remote, true) {
            Ok(index) => index,
            Err(err) => {
                warn!(remote = remote.name(), "index unavailable: {err:#}");
                self.receipt.add_error(remote.name(), format!("{err:#}"));
                return Ok(());
            }
        };

        let auto_install = force_auto_install
            .or(remote.auto_install().as_override())
            .unwrap_or(self.options.auto_install);

        for package in index.packages() {
            self.resolve(package, auto_install);
        }

        // Packages from a protected remote are never offered for removal.
        if !remote.is_protected() {
            for entry in self.registry.entries(remote.name()) {
                if index.find(&entry.category, &entry.package).is_none() {
                    self.obsolete.push(entry);
                }
            }
        }

        Ok(())
    }

    fn resolve(&mut self, package: &Package, auto_install: bool) {
        let entry = self.registry.entry(&EntryKey::new(
            package.remote(),
            package.category(),
            package.name(),
        ));
        if entry.is_none() && !auto_install {
            return;
        }

        let installed = entry
            .as_ref()
            .map(|entry| entry.version.clone())
            .unwrap_or_default();
        let Some(latest) = package.last_version(self.options.bleeding_edge, &installed) else {
            return;
        };

        if let Some(entry) = &entry {
            if *latest.name() == entry.version && self.all_files_exist(entry) {
                return;
            }
            if entry.pinned || *latest.name() < entry.version {
                return;
            }
        }

        self.install(latest.clone(), false, None);
    }

    fn all_files_exist(&self, entry: &Entry) -> bool {
        entry
            .files
            .iter()
            .all(|file| self.prefix.target(&file.fs_path()).exists())
    }

    /// Loads a remote's index, downloading only when the cached copy is
    /// missing or stale.
    pub fn index(&mut self, remote: &Remote) -> Result<Arc<Index>> {
        self.fetch_index(remote, false)
    }

    fn fetch_index(&mut self, remote: &Remote, force_fresh: bool) -> Result<Arc<Index>> {
        if let Some(index) = self.indexes.get(remote.name()) {
            return Ok(Arc::clone(index));
        }

        let path = self.prefix.index_path(remote.name());
        if force_fresh || !index_is_fresh(&path) {
            match self.downloader.fetch(remote.url()) {
                Ok(bytes) => {
                    fs::write(&path, bytes)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                Err(err) => {
                    warn!(remote = remote.name(), "download failed: {err:#}");
                    if !path.exists() {
                        return Err(err.context(format!(
                            "no usable index for remote '{}'",
                            remote.name()
                        )));
                    }
                    // Stale-but-present data is still usable below.
                    self.receipt.add_error(remote.name(), format!("{err:#}"));
                }
            }
        }

        let xml = fs::read_to_string(&path)
            .with_context(|| format!("no usable index for remote '{}'", remote.name()))?;
        let index = Arc::new(parse_index(remote.name(), &xml)?);
        self.indexes.insert(remote.name().to_string(), Arc::clone(&index));
        Ok(index)
    }

    pub fn install(
        &mut self,
        version: Version,
        pinned: bool,
        container: Option<Arc<dyn ContainerReader>>,
    ) {
        self.next_batch
            .push(Task::Install(InstallTask::new(version, pinned, container)));
    }

    pub fn uninstall(&mut self, entry: Entry) {
        self.next_batch.push(Task::Uninstall(UninstallTask::new(entry)));
    }

    pub fn set_pinned(&mut self, entry: Entry, pinned: bool) {
        self.next_batch.push(Task::Pin(PinTask::new(entry, pinned)));
    }

    /// Queues registration tickets for every installed entry of a remote,
    /// without touching any file. An enabled remote registers its entries;
    /// a disabled one unregisters them and is inhibited for the rest of
    /// the transaction.
    pub fn register_all(&mut self, remote: &Remote) {
        let remove = !remote.is_enabled();
        for entry in self.registry.entries(remote.name()) {
            self.registrations.push(Registration { entry, remove });
        }
        if remove {
            self.inhibit(remote.name());
        }
    }

    /// Stops further synchronization of a remote and suppresses its
    /// pending add-registrations. Unregistration is unaffected.
    pub fn inhibit(&mut self, remote: &str) {
        self.synced.remove(remote);
        self.inhibited.insert(remote.to_string());
    }

    /// Queues removal of everything installed from a remote, drops its
    /// cached index, and inhibits it for the rest of the transaction.
    pub fn uninstall_remote(&mut self, remote: &Remote) {
        self.inhibit(remote.name());

        let path = self.prefix.index_path(remote.name());
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                self.receipt
                    .add_error(remote.name(), format!("failed to remove cached index: {err}"));
            }
        }

        for entry in self.registry.entries(remote.name()) {
            self.uninstall(entry);
        }
    }

    /// Runs every queued batch to completion and returns the receipt.
    /// Cancellation rolls everything back and is reported in the receipt,
    /// not as an error.
    pub fn run(mut self) -> Result<Receipt> {
        self.flush_queue();
        self.prompt_obsolete();

        while let Some(batch) = self.batches.pop_front() {
            self.process_batch(batch)?;
            self.flush_queue();
        }

        if self.pool.is_cancelled() {
            self.registry.restore();
            self.receipt.set_cancelled();
            return Ok(mem::take(&mut self.receipt));
        }

        self.registry.commit()?;
        self.flush_registrations();
        Ok(mem::take(&mut self.receipt))
    }

    fn flush_queue(&mut self) {
        if !self.next_batch.is_empty() {
            self.batches.push_back(mem::take(&mut self.next_batch));
        }
    }

    fn prompt_obsolete(&mut self) {
        if self.obsolete.is_empty() {
            return;
        }
        let obsolete = mem::take(&mut self.obsolete);
        let Some(handler) = self.obsolete_handler.as_mut() else {
            return;
        };
        if handler(&obsolete) {
            for entry in obsolete {
                self.uninstall(entry);
            }
            self.flush_queue();
        }
    }

    fn process_batch(&mut self, mut batch: Vec<Task>) -> Result<()> {
        batch.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        self.registry.savepoint();
        let mut running: Vec<(Task, bool)> = Vec::new();
        for mut task in batch {
            let tag = running.len();
            let mut ctx = TaskContext {
                prefix: &self.prefix,
                registry: &mut self.registry,
                pool: &mut self.pool,
                downloader: &self.downloader,
                receipt: &mut self.receipt,
                registrations: &mut self.registrations,
            };
            match task.start(tag, &mut ctx) {
                Ok(()) => running.push((task, false)),
                Err(err) => {
                    self.receipt
                        .add_error(task.location(), format!("{err:#}"));
                    // Jobs already queued under this tag keep the slot
                    // until the pool drains; rollback then removes
                    // whatever they staged.
                    running.push((task, true));
                }
            }
        }
        self.registry.restore();

        let results = self.pool.wait();
        let cancelled = self.pool.is_cancelled();
        for JobResult { tag, result } in results {
            if let Err(err) = result {
                if let Some((task, failed)) = running.get_mut(tag) {
                    if !cancelled && !*failed {
                        self.receipt
                            .add_error(task.location(), format!("{err:#}"));
                    }
                    *failed = true;
                }
            }
        }

        for (mut task, failed) in running {
            if cancelled || failed {
                task.rollback(&self.prefix);
                continue;
            }
            let mut ctx = TaskContext {
                prefix: &self.prefix,
                registry: &mut self.registry,
                pool: &mut self.pool,
                downloader: &self.downloader,
                receipt: &mut self.receipt,
                registrations: &mut self.registrations,
            };
            if let Err(err) = task.commit(&mut ctx) {
                self.receipt
                    .add_error(task.location(), format!("{err:#}"));
                task.rollback(&self.prefix);
            }
        }

        Ok(())
    }

    fn flush_registrations(&mut self) {
        let Some(registrar) = self.registrar.as_mut() else {
            self.registrations.clear();
            return;
        };

        for registration in mem::take(&mut self.registrations) {
            if !registration.remove && self.inhibited.contains(&registration.entry.remote) {
                continue;
            }
            if let Err(err) = registrar.apply(&registration) {
                self.receipt
                    .add_error(registration.entry.full_name(), format!("{err:#}"));
            }
        }
    }
}

fn index_is_fresh(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    match modified.elapsed() {
        Ok(age) => age < STALE_THRESHOLD,
        Err(_) => true,
    }
}
