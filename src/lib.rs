/// Case transforms applied to placeholder values.
pub mod case;

/// Handles argument parsing and command dispatch.
pub mod cli;

/// Configuration read from the template directory.
pub mod config;

pub mod constants;

/// Defines custom error types.
pub mod error;

/// Small extensions over standard library types.
pub mod ext;

/// Formatting of generated Go sources.
pub mod format;

/// Processes ignore files to exclude template paths.
pub mod ignore;

/// Typed access to a generated project.
pub mod project;

/// The generated project as a source tree.
pub mod source;

/// Template compilation and the namespace schema.
pub mod template;
