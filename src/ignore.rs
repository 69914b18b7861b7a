use crate::{constants::DEFAULT_IGNORE_PATTERNS, error::Result, ext::PathExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, info};
use std::path::Path;

/// Builds the set of template entries that are never compiled: version control
/// metadata, maker's own config files and any `extra` patterns from the config.
/// Patterns are resolved against `template_root`.
pub fn build_ignore_set<P: AsRef<Path>>(template_root: P, extra: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let template_root = template_root.as_ref();

    let mut patterns = Vec::with_capacity(DEFAULT_IGNORE_PATTERNS.len() + extra.len());
    for pattern in DEFAULT_IGNORE_PATTERNS.iter().copied().chain(extra.iter().map(String::as_str)) {
        let path_to_ignored_pattern = template_root.join(pattern.trim());
        patterns.push(path_to_ignored_pattern.to_str_checked()?.to_string());
    }

    for pattern in &patterns {
        debug!("Adding ignore pattern: {} to globset", pattern);
        builder.add(Glob::new(pattern)?);
    }
    info!("Loaded {} ignore patterns", patterns.len());
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_defaults_and_extra_patterns() {
        let root = Path::new("/templates/service");
        let set = build_ignore_set(root, &["*.bak".to_string()]).unwrap();
        assert!(set.is_match(root.join(".git")));
        assert!(set.is_match(root.join(".git/HEAD")));
        assert!(set.is_match(root.join("maker.yaml")));
        assert!(set.is_match(root.join("notes.bak")));
        assert!(!set.is_match(root.join("{!service_name}")));
    }
}
