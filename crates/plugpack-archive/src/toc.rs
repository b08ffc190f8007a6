use anyhow::{bail, Result};
use plugpack_core::{quote_field, split_fields, Remote};
use plugpack_registry::Entry;

/// Container path of the table-of-contents stream.
pub(crate) const TOC_ENTRY: &str = "toc";

/// Installed-entry record following the owning `REPO` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackRecord {
    pub category: String,
    pub package: String,
    pub version: String,
    pub pinned: bool,
}

#[derive(Debug)]
pub(crate) enum TocRecord {
    Repo(Remote),
    Pack(PackRecord),
}

pub(crate) fn repo_line(remote: &Remote) -> String {
    format!("REPO {}", remote.to_record())
}

pub(crate) fn pack_line(entry: &Entry) -> String {
    format!(
        "PACK {} {} {} {}",
        quote_field(&entry.category),
        quote_field(&entry.package),
        quote_field(entry.version.name()),
        u8::from(entry.pinned)
    )
}

/// Parses one table-of-contents line. Lines too short to carry a token
/// and payload yield `None` and are skipped by the caller.
pub(crate) fn parse_line(line: &str) -> Result<Option<TocRecord>> {
    if line.len() <= 5 {
        return Ok(None);
    }

    let (Some(token), Some(data)) = (line.get(..4), line.get(5..)) else {
        bail!("malformed table of contents line");
    };

    match token {
        "REPO" => Ok(Some(TocRecord::Repo(Remote::from_record(data)?))),
        "PACK" => {
            let fields = split_fields(data)?;
            if fields.len() != 4 {
                bail!("invalid package record: {data}");
            }
            let mut fields = fields.into_iter();
            let (category, package, version) = match (fields.next(), fields.next(), fields.next())
            {
                (Some(category), Some(package), Some(version)) => (category, package, version),
                _ => bail!("invalid package record: {data}"),
            };
            let pinned = fields.next().as_deref() == Some("1");
            Ok(Some(TocRecord::Pack(PackRecord {
                category,
                package,
                version,
                pinned,
            })))
        }
        other => bail!("unknown table of contents token '{other}'"),
    }
}
