//! Configuration management for maker templates
//!
//! - `loader`: configuration file loading, defaults and validation

pub mod loader;

pub use loader::{Config, FormatterKind};
