mod container;
mod fields;
mod platform;
mod remote;
mod tree;
mod version;
mod xml;

pub use container::{ContainerReader, ContainerWriter};
pub use fields::{quote_field, split_fields};
pub use platform::{Platform, Sections};
pub use remote::{AutoInstall, Remote, RemoteList};
pub use tree::{Category, Index, Package, PackageType, Source, Version};
pub use version::VersionName;
pub use xml::parse_index;

#[cfg(test)]
mod tests;
