use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use plugpack_core::{Remote, RemoteList, Version, VersionName};
use plugpack_engine::{
    default_user_prefix, HttpDownloader, Options, Prefix, Receipt, Transaction,
};
use plugpack_registry::{Entry, EntryKey, Registry};

use crate::dispatch::RemoteCommand;
use crate::render;
use crate::settings::Settings;

pub struct CliContext {
    prefix: Prefix,
    settings: Settings,
    yes: bool,
}

impl CliContext {
    pub fn new(root: Option<PathBuf>, yes: bool) -> Result<Self> {
        let prefix = match root {
            Some(root) => Prefix::new(root),
            None => Prefix::new(default_user_prefix()?),
        };
        let settings = Settings::load(&prefix.settings_path())?;
        Ok(Self {
            prefix,
            settings,
            yes,
        })
    }

    fn options(&self) -> Options {
        Options {
            auto_install: self.settings.auto_install,
            bleeding_edge: self.settings.bleeding_edge,
            workers: self.settings.workers,
        }
    }

    fn transaction(&self) -> Result<Transaction> {
        let downloader = Arc::new(HttpDownloader::new()?);
        let mut tx = Transaction::new(self.prefix.clone(), self.options(), downloader)?;
        let yes = self.yes;
        tx.set_obsolete_handler(Box::new(move |entries: &[Entry]| {
            println!("The following packages are no longer available:");
            for entry in entries {
                println!("  {}", entry.full_name());
            }
            yes || render::confirm("Remove them?")
        }));
        Ok(tx)
    }

    fn remotes(&self) -> Result<RemoteList> {
        RemoteList::load(&self.prefix.remotes_path())
    }
}

/// A remote/category/package[@version] argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub remote: String,
    pub category: String,
    pub package: String,
    pub version: Option<String>,
}

impl PackageSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let (path, version) = match spec.rsplit_once('@') {
            Some((path, version)) if !version.is_empty() => (path, Some(version.to_string())),
            Some(_) => bail!("invalid package spec '{spec}': empty version"),
            None => (spec, None),
        };

        let mut segments = path.splitn(3, '/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(remote), Some(category), Some(package))
                if !remote.is_empty() && !category.is_empty() && !package.is_empty() =>
            {
                Ok(Self {
                    remote: remote.to_string(),
                    category: category.to_string(),
                    package: package.to_string(),
                    version,
                })
            }
            _ => bail!("invalid package spec '{spec}': expected remote/category/package"),
        }
    }

    fn key(&self) -> EntryKey {
        EntryKey::new(&self.remote, &self.category, &self.package)
    }
}

pub fn sync(ctx: &CliContext, names: &[String]) -> Result<()> {
    let remotes = ctx.remotes()?;
    let selected: Vec<Remote> = if names.is_empty() {
        remotes.enabled()
    } else {
        names
            .iter()
            .map(|name| {
                remotes
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown remote '{name}'"))
            })
            .collect::<Result<_>>()?
    };

    if selected.is_empty() {
        render::print_status("sync", "no remotes configured");
        return Ok(());
    }

    let mut tx = ctx.transaction()?;
    let bar = render::progress(selected.len() as u64, "sync");
    for remote in &selected {
        if !remote.is_enabled() {
            render::print_status("skipped", &format!("{} is disabled", remote.name()));
        } else {
            tx.synchronize(remote, None)?;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    finish(tx.run()?)
}

pub fn install(ctx: &CliContext, specs: &[String], pin: bool) -> Result<()> {
    if specs.is_empty() {
        bail!("no packages given");
    }

    let remotes = ctx.remotes()?;
    let mut tx = ctx.transaction()?;
    for raw in specs {
        let spec = PackageSpec::parse(raw)?;
        let version = resolve_spec(ctx, &mut tx, &remotes, &spec)?;
        tx.install(version, pin, None);
    }

    finish(tx.run()?)
}

fn resolve_spec(
    ctx: &CliContext,
    tx: &mut Transaction,
    remotes: &RemoteList,
    spec: &PackageSpec,
) -> Result<Version> {
    let remote = remotes
        .get(&spec.remote)
        .ok_or_else(|| anyhow!("unknown remote '{}'", spec.remote))?;
    let index = tx.index(remote)?;
    let package = index
        .find(&spec.category, &spec.package)
        .ok_or_else(|| {
            anyhow!(
                "no package '{}/{}' in remote '{}'",
                spec.category,
                spec.package,
                spec.remote
            )
        })?;

    let version = match &spec.version {
        Some(name) => package
            .find_version(name)
            .ok_or_else(|| anyhow!("no version '{name}' of {}", package.full_name()))?,
        None => package
            .last_version(ctx.settings.bleeding_edge, &VersionName::default())
            .ok_or_else(|| anyhow!("no installable version of {}", package.full_name()))?,
    };
    Ok(version.clone())
}

pub fn uninstall(ctx: &CliContext, specs: &[String]) -> Result<()> {
    if specs.is_empty() {
        bail!("no packages given");
    }

    let mut tx = ctx.transaction()?;
    for raw in specs {
        let spec = PackageSpec::parse(raw)?;
        if spec.version.is_some() {
            bail!("invalid package spec '{raw}': uninstall takes no version");
        }
        let entry = tx
            .registry()
            .entry(&spec.key())
            .ok_or_else(|| anyhow!("'{raw}' is not installed"))?;
        tx.uninstall(entry);
    }

    finish(tx.run()?)
}

pub fn set_pinned(ctx: &CliContext, specs: &[String], pinned: bool) -> Result<()> {
    if specs.is_empty() {
        bail!("no packages given");
    }

    let mut tx = ctx.transaction()?;
    for raw in specs {
        let spec = PackageSpec::parse(raw)?;
        let entry = tx
            .registry()
            .entry(&spec.key())
            .ok_or_else(|| anyhow!("'{raw}' is not installed"))?;
        let name = entry.full_name();
        tx.set_pinned(entry, pinned);
        render::print_status(if pinned { "pinned" } else { "unpinned" }, &name);
    }

    finish(tx.run()?)
}

pub fn list(ctx: &CliContext, remote: Option<&str>) -> Result<()> {
    let registry = Registry::open(ctx.prefix.registry_path())?;
    let entries = match remote {
        Some(remote) => registry.entries(remote),
        None => registry.all_entries(),
    };

    if entries.is_empty() {
        println!("no packages installed");
        return Ok(());
    }

    for entry in entries {
        let pin = if entry.pinned { " [pinned]" } else { "" };
        println!("{} v{}{pin}", entry.full_name(), entry.version);
    }
    Ok(())
}

pub fn remote(ctx: &CliContext, command: RemoteCommand) -> Result<()> {
    let path = ctx.prefix.remotes_path();
    let mut remotes = ctx.remotes()?;

    match command {
        RemoteCommand::Add { name, url } => {
            let remote = Remote::new(name, url)?;
            let name = remote.name().to_string();
            remotes.add(remote);
            remotes.save(&path)?;
            render::print_status("added", &format!("{name} (run 'plugpack sync {name}')"));
        }
        RemoteCommand::Remove { name, purge } => {
            let remote = remotes
                .get(&name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown remote '{name}'"))?;
            if !remotes.remove(&name) {
                bail!("remote '{name}' is protected and cannot be removed");
            }

            if purge {
                let mut tx = ctx.transaction()?;
                tx.uninstall_remote(&remote);
                finish(tx.run()?)?;
            }
            remotes.save(&path)?;
            render::print_status("removed", &name);
        }
        RemoteCommand::List => {
            for remote in remotes.all() {
                let state = if remote.is_enabled() { "enabled" } else { "disabled" };
                let protected = if remote.is_protected() { " [protected]" } else { "" };
                println!("{} {} {state}{protected}", remote.name(), remote.url());
            }
        }
        RemoteCommand::Enable { name } => set_remote_enabled(ctx, &mut remotes, &path, &name, true)?,
        RemoteCommand::Disable { name } => {
            set_remote_enabled(ctx, &mut remotes, &path, &name, false)?
        }
    }

    Ok(())
}

fn set_remote_enabled(
    ctx: &CliContext,
    remotes: &mut RemoteList,
    path: &Path,
    name: &str,
    enabled: bool,
) -> Result<()> {
    let mut remote = remotes
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("unknown remote '{name}'"))?;
    remote.set_enabled(enabled);
    remotes.add(remote.clone());
    remotes.save(path)?;

    // Re-register (or unregister) everything installed from the remote.
    let mut tx = ctx.transaction()?;
    tx.register_all(&remote);
    let receipt = tx.run()?;
    for error in receipt.errors() {
        render::print_error(&error.context, &error.message);
    }

    render::print_status(if enabled { "enabled" } else { "disabled" }, name);
    Ok(())
}

pub fn export(ctx: &CliContext, path: &Path) -> Result<()> {
    let remotes = ctx.remotes()?;
    let registry = Registry::open(ctx.prefix.registry_path())?;
    let outcome = plugpack_archive::export(
        path,
        &remotes,
        &registry,
        &ctx.prefix,
        ctx.settings.workers,
    )?;

    for error in &outcome.errors {
        render::print_error(&error.context, &error.message);
    }
    render::print_status(
        "exported",
        &format!("{} packages to {}", outcome.exported, path.display()),
    );
    if outcome.exported == 0 && !outcome.errors.is_empty() {
        bail!("nothing was exported ({} errors)", outcome.errors.len());
    }
    Ok(())
}

pub fn import(ctx: &CliContext, path: &Path) -> Result<()> {
    let mut remotes = ctx.remotes()?;
    let mut tx = ctx.transaction()?;
    plugpack_archive::import(path, &mut remotes, &mut tx)
        .with_context(|| format!("failed importing {}", path.display()))?;
    remotes.save(&ctx.prefix.remotes_path())?;
    finish(tx.run()?)
}

fn finish(receipt: Receipt) -> Result<()> {
    for note in receipt.installs() {
        let detail = match &note.previous {
            Some(previous) if *previous != note.version => {
                format!("{} v{} (from v{previous})", note.name, note.version)
            }
            Some(_) => format!("{} v{} (reinstalled)", note.name, note.version),
            None => format!("{} v{}", note.name, note.version),
        };
        render::print_status("installed", &detail);
    }
    for name in receipt.removals() {
        render::print_status("removed", name);
    }
    for error in receipt.errors() {
        render::print_error(&error.context, &error.message);
    }

    if receipt.cancelled() {
        render::print_status("cancelled", "no changes were applied");
        return Ok(());
    }
    if receipt.has_errors() && receipt.installs().is_empty() && receipt.removals().is_empty() {
        bail!("no changes were applied ({} errors)", receipt.errors().len());
    }
    if receipt.is_empty() {
        render::print_status("up-to-date", "nothing to do");
    }
    Ok(())
}
