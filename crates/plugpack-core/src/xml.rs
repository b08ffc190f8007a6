use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::platform::{Platform, Sections};
use crate::tree::{Category, Index, Package, PackageType, Source, Version};

/// Parses a remote's index document. The root element and its `version`
/// attribute are required; each format version has its own loading path.
pub fn parse_index(name: &str, xml: &str) -> Result<Index> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let root = loop {
        match reader.read_event().context("malformed index document")? {
            Event::Start(start) => break start.into_owned(),
            Event::Decl(_) | Event::Comment(_) | Event::Text(_) => continue,
            Event::Eof => bail!("invalid index"),
            _ => bail!("invalid index"),
        }
    };

    if root.name().as_ref() != b"index" {
        bail!("invalid index");
    }

    let version = attribute(&root, b"version")?
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(0);
    if version == 0 {
        bail!("index version not found");
    }

    let mut index = Index::new(name);
    match version {
        1 => load_v1(&mut reader, &mut index)?,
        _ => bail!("index version is unsupported"),
    }

    Ok(index)
}

/// Version-1 format: category > package > version > source, with the
/// download URL as the source element's text content. Subtrees that
/// violate an attach-time invariant are dropped, never stored.
fn load_v1(reader: &mut Reader<&[u8]>, index: &mut Index) -> Result<()> {
    let mut category: Option<Category> = None;
    let mut package: Option<Package> = None;
    let mut version: Option<Version> = None;
    let mut pending_source: Option<(Platform, String, Sections, String)> = None;
    let mut skip_depth = 0u32;

    loop {
        let event = reader.read_event().context("malformed index document")?;
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => bail!("malformed index document"),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(start) => match start.name().as_ref() {
                b"category" if category.is_none() => {
                    let name = attribute(&start, b"name")?.unwrap_or_default();
                    match Category::new(name, index) {
                        Ok(built) => category = Some(built),
                        Err(_) => skip_depth = 1,
                    }
                }
                b"package" if package.is_none() => {
                    let Some(owner) = category.as_ref() else {
                        skip_depth = 1;
                        continue;
                    };
                    let name = attribute(&start, b"name")?.unwrap_or_default();
                    let package_type =
                        PackageType::parse(&attribute(&start, b"type")?.unwrap_or_default());
                    package = Some(Package::new(package_type, name, owner));
                }
                b"version" if version.is_none() => {
                    let Some(owner) = package.as_ref() else {
                        skip_depth = 1;
                        continue;
                    };
                    let name = attribute(&start, b"name")?.unwrap_or_default();
                    match Version::new(&name, owner) {
                        Ok(mut built) => {
                            if let Some(author) = attribute(&start, b"author")? {
                                built.set_author(author);
                            }
                            version = Some(built);
                        }
                        Err(_) => skip_depth = 1,
                    }
                }
                b"source" if version.is_some() && pending_source.is_none() => {
                    let platform =
                        Platform::parse(&attribute(&start, b"platform")?.unwrap_or_default());
                    let file = attribute(&start, b"file")?.unwrap_or_default();
                    let sections =
                        Sections::parse(&attribute(&start, b"main")?.unwrap_or_default());
                    pending_source = Some((platform, file, sections, String::new()));
                }
                _ => skip_depth = 1,
            },
            Event::Text(text) => {
                if let Some((_, _, _, url)) = pending_source.as_mut() {
                    url.push_str(&text.unescape().context("malformed index document")?);
                }
            }
            Event::End(end) => match end.name().as_ref() {
                b"source" => {
                    let (Some((platform, file, sections, url)), Some(owner)) =
                        (pending_source.take(), version.as_mut())
                    else {
                        bail!("malformed index document");
                    };
                    if !url.trim().is_empty() {
                        let source = Source::new(platform, file, url.trim(), owner)
                            .with_sections(sections);
                        owner.add_source(source)?;
                    }
                }
                b"version" => {
                    let (Some(built), Some(owner)) = (version.take(), package.as_mut()) else {
                        bail!("malformed index document");
                    };
                    owner.add_version(built)?;
                }
                b"package" => {
                    let (Some(built), Some(owner)) = (package.take(), category.as_mut()) else {
                        bail!("malformed index document");
                    };
                    owner.add_package(built)?;
                }
                b"category" => {
                    let Some(built) = category.take() else {
                        bail!("malformed index document");
                    };
                    index.add_category(built)?;
                }
                b"index" => return Ok(()),
                _ => {}
            },
            Event::Empty(_) | Event::Comment(_) | Event::Decl(_) | Event::CData(_) => {}
            Event::Eof => bail!("malformed index document"),
            _ => {}
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.context("malformed index attribute")?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .context("malformed index attribute")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
