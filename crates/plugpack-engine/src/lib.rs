mod download;
mod pool;
mod prefix;
mod receipt;
mod task;
mod transaction;

pub use download::{Downloader, HttpDownloader};
pub use pool::{Job, JobResult, WorkerPool};
pub use prefix::{default_user_prefix, Prefix};
pub use receipt::{InstallNote, Receipt, ReceiptError};
pub use transaction::{
    HostRegistrar, ObsoleteHandler, Options, Registration, Transaction,
};
