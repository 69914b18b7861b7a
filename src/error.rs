use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    /// A filesystem operation on a concrete path failed.
    #[error("Cannot {operation} '{path}'. Original error: {source}")]
    FsError {
        operation: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ignore patterns. Original error: {0}")]
    GlobSetParseError(#[from] globset::Error),

    #[error("Failed to walk directory. Original error: {0}")]
    WalkDirError(#[from] walkdir::Error),

    #[error("Failed to parse JSON. Original error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse YAML. Original error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}.")]
    ConfigValidation(String),

    /// The template directory uses the placeholder grammar incorrectly.
    #[error("Template error: {0}.")]
    TemplateError(String),

    #[error("Namespace '{namespace}' is not declared under '{parent}'.")]
    UnknownNamespace { namespace: String, parent: String },

    /// No source node could be located for a required template position.
    #[error("Source node not found: {0}.")]
    StructuralNotFound(String),

    /// A repeatable entry was read without a usable merge field.
    #[error("Cannot merge repeated entry: {0}.")]
    AmbiguousMerge(String),

    #[error("Unable to delete root node.")]
    RootDeletion,

    #[error("Failed to compile pattern '{pattern}'. Original error: {source}")]
    PatternCompileError {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Value '{value}' does not match its template pattern '{pattern}'.")]
    PatternMismatch { value: String, pattern: String },

    /// The external formatter rejected reconstructed file content.
    #[error("Failed to format '{name}': {message}\ncontent:\n{content}")]
    FormatError {
        name: String,
        message: String,
        content: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Wraps an I/O error with the operation and path it failed on.
    pub fn fs(operation: &'static str, path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::FsError { operation, path: path.as_ref().display().to_string(), source }
    }
}

/// Convenience type alias for Results with maker's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{}", err);
    std::process::exit(crate::constants::exit_codes::FAILURE);
}
