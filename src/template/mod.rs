//! Template compilation for maker
//!
//! - `lexer`: tokens of the path-name and file-content placeholder grammars
//! - `parser`: strategy-driven compilation of directories, names and contents
//! - `node`: the template arena
//! - `namespace`: namespace analysis and the compiled [`Schema`]

pub mod lexer;
pub mod namespace;
pub mod node;
pub mod parser;

pub use namespace::{Namespace, NsId, Schema};
pub use node::{FileKind, InsertSpec, TemplateKind, TemplateTree, TplId};
