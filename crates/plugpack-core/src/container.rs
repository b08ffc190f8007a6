use std::io::{Read, Write};

use anyhow::Result;

/// Read side of a generic archive container. Entries are addressed by
/// slash-joined logical paths. Implementations must allow concurrent
/// extraction from worker threads, each opening its own stream.
pub trait ContainerReader: Send + Sync {
    fn locate(&self, entry: &str) -> bool;

    fn extract_to(&self, entry: &str, out: &mut dyn Write) -> Result<()>;
}

/// Write side of a generic archive container. The writer is not safe for
/// concurrent use; callers serialize access to it.
pub trait ContainerWriter: Send {
    fn add_entry(&mut self, entry: &str, data: &mut dyn Read) -> Result<()>;
}
