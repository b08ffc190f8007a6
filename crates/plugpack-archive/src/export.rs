use std::collections::BTreeSet;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use plugpack_core::{ContainerWriter, RemoteList};
use plugpack_engine::{Prefix, ReceiptError, WorkerPool};
use plugpack_registry::Registry;
use tracing::debug;

use crate::toc::{pack_line, repo_line, TOC_ENTRY};
use crate::zip::ZipWriter;

/// Result of one export: how many registry entries made it into the
/// archive, plus the files that could not be read.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub exported: usize,
    pub errors: Vec<ReceiptError>,
}

/// Writes a portable snapshot of every remote with installed entries.
/// The table of contents and all directory bookkeeping go first on the
/// calling thread; file bodies are then compressed by pool workers, each
/// opening its own read handle and serializing on the shared writer.
pub fn export(
    path: &Path,
    remotes: &RemoteList,
    registry: &Registry,
    prefix: &Prefix,
    workers: usize,
) -> Result<ExportOutcome> {
    let mut outcome = ExportOutcome::default();
    let mut toc = String::new();
    let mut files: BTreeSet<String> = BTreeSet::new();

    for remote in remotes.all() {
        let entries = registry.entries(remote.name());
        if entries.is_empty() {
            continue;
        }

        toc.push_str(&repo_line(remote));
        toc.push('\n');
        files.insert(format!("cache/{}.xml", remote.name()));

        for entry in entries {
            toc.push_str(&pack_line(&entry));
            toc.push('\n');
            files.extend(entry.files.iter().map(|file| file.path.clone()));
            outcome.exported += 1;
        }
    }

    let mut writer = ZipWriter::create(path)?;
    writer.add_entry(TOC_ENTRY, &mut Cursor::new(toc.into_bytes()))?;

    let writer = Arc::new(Mutex::new(writer));
    let mut pool = WorkerPool::new(workers.max(1));
    let mut queued: Vec<String> = Vec::new();

    for entry_name in files {
        let absolute = prefix.target(Path::new(&entry_name));
        if !absolute.exists() {
            outcome.errors.push(ReceiptError {
                context: entry_name,
                message: "file not found".to_string(),
            });
            continue;
        }

        let writer = Arc::clone(&writer);
        let name = entry_name.clone();
        let tag = queued.len();
        queued.push(entry_name);
        pool.push(
            tag,
            Box::new(move || {
                let mut file = File::open(&absolute)
                    .with_context(|| format!("failed to open {}", absolute.display()))?;
                let mut writer = writer
                    .lock()
                    .map_err(|_| anyhow!("archive writer poisoned"))?;
                writer.add_entry(&name, &mut file)
            }),
        );
    }

    for result in pool.wait() {
        if let Err(err) = result.result {
            let context = queued
                .get(result.tag)
                .cloned()
                .unwrap_or_else(|| path.display().to_string());
            outcome.errors.push(ReceiptError {
                context,
                message: format!("{err:#}"),
            });
        }
    }
    drop(pool);

    let writer = Arc::try_unwrap(writer)
        .map_err(|_| anyhow!("archive writer still shared"))?
        .into_inner()
        .map_err(|_| anyhow!("archive writer poisoned"))?;
    writer.finish()?;

    debug!(archive = %path.display(), exported = outcome.exported, "export complete");
    Ok(outcome)
}
