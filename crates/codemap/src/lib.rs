//! codemap - Structural queries over a pre-generated project index
//!
//! The index document (PROJECT_INDEX.json) is produced by a separate
//! indexer. codemap loads it once per process, derives call and import
//! graphs from it, and answers questions like "who calls this" or "what
//! imports that" without reading any source files.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exclude;
pub mod format;
pub mod graph;
pub mod index;
pub mod output;
pub mod pattern;
pub mod store;
pub mod summary;
pub mod tree;

pub use config::Config;
pub use error::IndexError;
pub use graph::DerivedGraph;
pub use index::IndexDocument;
pub use store::{Project, QueryContext};
