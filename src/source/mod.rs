//! The generated project as a tree of directories, files and content nodes.
//!
//! - [`node`]: the arena and its navigation
//! - [`reader`] and [`parser`]: reconstruction from disk
//! - [`factory`]: new subtrees built from templates
//! - [`edit`]: in-memory changes
//! - [`render`]: text output
//! - [`writer`]: reconciliation with the filesystem

mod edit;
mod factory;
pub mod node;
pub mod parser;
pub mod reader;
mod render;
pub mod writer;

pub use node::{FsStatus, SourceKind, SourceTree, SrcId};
pub use parser::PatternCache;
pub use reader::Reader;
pub use writer::Writer;
