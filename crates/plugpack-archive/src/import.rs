use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use plugpack_core::{parse_index, ContainerReader, Index, Remote, RemoteList};
use plugpack_engine::Transaction;
use tracing::debug;

use crate::toc::{parse_line, PackRecord, TocRecord, TOC_ENTRY};
use crate::zip::ZipReader;

/// Replays an archive into the transaction: remotes are registered and
/// their indexes restored to the cache, installed entries become install
/// tasks sourced from the container. Per-line failures land in the
/// transaction receipt; only a missing table of contents aborts.
pub fn import(path: &Path, remotes: &mut RemoteList, tx: &mut Transaction) -> Result<()> {
    let reader = Arc::new(ZipReader::open(path)?);

    if !reader.locate(TOC_ENTRY) {
        bail!(
            "cannot locate the table of contents in {}",
            path.display()
        );
    }

    let mut toc = Vec::new();
    reader.extract_to(TOC_ENTRY, &mut toc)?;
    let toc = String::from_utf8(toc)
        .with_context(|| format!("table of contents is not UTF-8 in {}", path.display()))?;

    let context = path.display().to_string();
    let mut current: Option<Index> = None;

    for line in toc.lines() {
        let outcome = parse_line(line).and_then(|record| match record {
            None => Ok(()),
            Some(TocRecord::Repo(remote)) => {
                // A failed remote leaves no current index, so its
                // packages are skipped until the next REPO line.
                current = None;
                current = Some(import_remote(remote, &reader, remotes, tx)?);
                Ok(())
            }
            Some(TocRecord::Pack(record)) => import_package(&record, &current, &reader, tx),
        });

        if let Err(err) = outcome {
            tx.report_error(context.clone(), format!("{err:#}"));
        }
    }

    debug!(archive = %path.display(), "import complete");
    Ok(())
}

fn import_remote(
    mut remote: Remote,
    reader: &Arc<ZipReader>,
    remotes: &mut RemoteList,
    tx: &mut Transaction,
) -> Result<Index> {
    let entry = format!("cache/{}.xml", remote.name());
    let target = tx.prefix().index_path(remote.name());
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut out = fs::File::create(&target)
        .with_context(|| format!("failed to create {}", target.display()))?;
    reader.extract_to(&entry, &mut out)?;
    drop(out);

    if let Some(existing) = remotes.get(remote.name()) {
        if existing.is_protected() {
            remote.set_url(existing.url());
            remote.set_enabled(existing.is_enabled());
            remote.set_auto_install(existing.auto_install());
            remote.protect();
        }
    }
    remotes.add(remote.clone());

    let xml = fs::read_to_string(&target)
        .with_context(|| format!("failed to read {}", target.display()))?;
    parse_index(remote.name(), &xml)
}

fn import_package(
    record: &PackRecord,
    current: &Option<Index>,
    reader: &Arc<ZipReader>,
    tx: &mut Transaction,
) -> Result<()> {
    // The owning REPO line already reported its failure.
    let Some(index) = current else {
        return Ok(());
    };

    let version = index
        .find(&record.category, &record.package)
        .and_then(|package| package.find_version(&record.version));
    let Some(version) = version else {
        bail!(
            "{}/{}/{} v{} cannot be found or is incompatible",
            index.name(),
            record.category,
            record.package,
            record.version
        );
    };

    let container: Arc<dyn ContainerReader> = Arc::clone(reader) as _;
    tx.install(version.clone(), record.pinned, Some(container));
    Ok(())
}
