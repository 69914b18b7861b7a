use std::path::Path;

use crate::error::{Error, Result};

/// Extension trait for Path to provide checked conversions used when paths
/// are matched against name patterns.
pub trait PathExt {
    /// Converts a path to a string slice, returning an error if the path contains invalid Unicode characters.
    ///
    /// # Examples
    /// ```
    /// use maker::ext::PathExt;
    /// use std::path::Path;
    ///
    /// let path = Path::new("test");
    /// assert_eq!(path.to_str_checked().unwrap(), "test");
    /// ```
    fn to_str_checked(&self) -> Result<&str>;

    /// Returns the final component as a string, failing for `..`, `/` or
    /// non-Unicode names.
    ///
    /// # Examples
    /// ```
    /// use maker::ext::PathExt;
    /// use std::path::Path;
    ///
    /// assert_eq!(Path::new("a/b.go").file_name_checked().unwrap(), "b.go");
    /// ```
    fn file_name_checked(&self) -> Result<&str>;
}

impl PathExt for Path {
    fn to_str_checked(&self) -> Result<&str> {
        self.to_str().ok_or_else(|| {
            Error::Other(anyhow::anyhow!(
                "Path '{}' contains invalid Unicode characters",
                self.display()
            ))
        })
    }

    fn file_name_checked(&self) -> Result<&str> {
        self.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
            Error::Other(anyhow::anyhow!(
                "Path '{}' has no valid file name",
                self.display()
            ))
        })
    }
}
