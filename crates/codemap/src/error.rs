//! Fatal index errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a command before any query runs
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(
        "Index not found: {}\n\n\
         Generate it by running the project indexer in your project root,\n\
         or point codemap at an existing index with -i/--index <path>.",
        path.display()
    )]
    NotFound { path: PathBuf },

    #[error(
        "Index file is corrupt or not a valid project index: {} ({reason})\n\n\
         Regenerate it by re-running the project indexer.",
        path.display()
    )]
    InvalidFormat { path: PathBuf, reason: String },
}
