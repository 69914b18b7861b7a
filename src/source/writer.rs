//! Reconciles the filesystem with the source tree.

use crate::{
    error::{Error, Result},
    format::Formatter,
    source::node::{FsStatus, SourceKind, SourceTree, SrcId},
    template::{FileKind, TemplateKind, TemplateTree},
};
use log::{debug, info};
use std::fs;

/// Writes pending changes below a node to disk.
pub struct Writer<'a> {
    templates: &'a TemplateTree,
    tree: &'a mut SourceTree,
    formatter: &'a dyn Formatter,
}

impl<'a> Writer<'a> {
    pub fn new(templates: &'a TemplateTree, tree: &'a mut SourceTree, formatter: &'a dyn Formatter) -> Self {
        Self { templates, tree, formatter }
    }

    /// Saves the directory or file enclosing `id`, and everything below it.
    pub fn flush(&mut self, id: SrcId) -> Result<()> {
        let fs = self.tree.up_to_fs(id)?;
        self.save(fs)
    }

    fn save(&mut self, id: SrcId) -> Result<()> {
        let Some(status) = self.tree.status(id) else {
            return Ok(());
        };
        let is_dir = matches!(self.tree.kind(id), SourceKind::Dir { .. });

        match status {
            FsStatus::Deleted => return self.delete(id, is_dir),
            FsStatus::New if is_dir => self.create_dir(id)?,
            FsStatus::New => self.create_file(id)?,
            FsStatus::Changed if is_dir => self.rename(id)?,
            FsStatus::Changed => self.update_file(id)?,
            _ => {}
        }

        if is_dir {
            // Back to front, so deleting an item does not shift the rest.
            let items = self.tree.items(id).to_vec();
            for item in items.into_iter().rev() {
                self.save(item)?;
            }
        }

        if status > FsStatus::NotChanged {
            self.tree.set_status(id, FsStatus::NotChanged);
        }
        Ok(())
    }

    fn create_dir(&mut self, id: SrcId) -> Result<()> {
        let path = self.tree.build_path(self.templates, id)?;
        fs::create_dir(&path).map_err(|e| Error::fs("create directory", &path, e))?;
        info!("Created {}", path.display());
        self.tree.update_real_name(self.templates, id);
        Ok(())
    }

    fn create_file(&mut self, id: SrcId) -> Result<()> {
        let path = self.tree.build_path(self.templates, id)?;
        let content = self.build_content(id)?;
        fs::write(&path, content).map_err(|e| Error::fs("create file", &path, e))?;
        info!("Created {}", path.display());
        self.tree.update_real_name(self.templates, id);
        Ok(())
    }

    fn update_file(&mut self, id: SrcId) -> Result<()> {
        self.rename(id)?;
        let path = self.tree.build_real_path(id)?;
        let content = self.build_content(id)?;
        fs::write(&path, content).map_err(|e| Error::fs("write file", &path, e))?;
        info!("Updated {}", path.display());
        Ok(())
    }

    fn rename(&mut self, id: SrcId) -> Result<()> {
        if self.tree.render_name(self.templates, id) == self.tree.real_name(id) {
            return Ok(());
        }
        let old = self.tree.build_real_path(id)?;
        let new = self.tree.build_path(self.templates, id)?;
        fs::rename(&old, &new).map_err(|e| Error::fs("rename", &old, e))?;
        info!("Renamed {} to {}", old.display(), new.display());
        self.tree.update_real_name(self.templates, id);
        Ok(())
    }

    fn delete(&mut self, id: SrcId, is_dir: bool) -> Result<()> {
        let path = self.tree.build_real_path(id)?;
        if is_dir {
            fs::remove_dir_all(&path).map_err(|e| Error::fs("delete directory", &path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| Error::fs("delete file", &path, e))?;
        }
        info!("Deleted {}", path.display());
        if let Some(parent) = self.tree.parent(id) {
            self.tree.remove_child(parent, id);
        }
        Ok(())
    }

    /// Rendered content, formatted when the file is Go source.
    fn build_content(&self, id: SrcId) -> Result<String> {
        let content = self.tree.render(self.templates, id);
        let is_go = self
            .tree
            .template(id)
            .is_some_and(|tpl| matches!(self.templates.kind(tpl), TemplateKind::File { kind: FileKind::Go, .. }));
        if !is_go {
            return Ok(content);
        }
        let name = self.tree.render_name(self.templates, id);
        debug!("Formatting {}", name);
        self.formatter.format(&name, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Passthrough;
    use tempfile::TempDir;
    use test_log::test;

    fn word(tree: &mut SourceTree, parent: SrcId, value: &str) -> SrcId {
        tree.push(Some(parent), None, SourceKind::Word(value.to_string()))
    }

    fn file(tree: &mut SourceTree, dir: SrcId, name: &str, content: &str, status: FsStatus) -> SrcId {
        let real_name = if status == FsStatus::New { String::new() } else { name.to_string() };
        let id = tree.push(
            Some(dir),
            None,
            SourceKind::File { name: vec![], content: vec![], real_name, status },
        );
        let name = word(tree, id, name);
        let content = word(tree, id, content);
        if let SourceKind::File { name: n, content: c, .. } = tree.kind_mut(id) {
            *n = vec![name];
            *c = vec![content];
        }
        tree.items_mut(dir).unwrap().push(id);
        id
    }

    fn root(dir: &TempDir) -> (SourceTree, SrcId) {
        let mut tree = SourceTree::default();
        let path = dir.path().to_str().unwrap();
        let root = tree.push(
            None,
            None,
            SourceKind::Dir { name: vec![], items: vec![], real_name: path.into(), status: FsStatus::NotChanged },
        );
        let name = word(&mut tree, root, path);
        tree.set_name(root, vec![name]);
        (tree, root)
    }

    #[test]
    fn creates_updates_and_deletes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.txt"), "old").unwrap();
        std::fs::write(dir.path().join("keep.txt"), "stale").unwrap();

        let templates = TemplateTree::default();
        let (mut tree, root) = root(&dir);
        let new = file(&mut tree, root, "new.txt", "fresh", FsStatus::New);
        let old = file(&mut tree, root, "old.txt", "old", FsStatus::Deleted);
        let keep = file(&mut tree, root, "keep.txt", "kept", FsStatus::Changed);

        Writer::new(&templates, &mut tree, &Passthrough).flush(root).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("new.txt")).unwrap(), "fresh");
        assert_eq!(std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "kept");
        assert!(!dir.path().join("old.txt").exists());
        assert!(!tree.items(root).contains(&old));
        assert_eq!(tree.status(new), Some(FsStatus::NotChanged));
        assert_eq!(tree.status(keep), Some(FsStatus::NotChanged));
        assert_eq!(tree.real_name(new), "new.txt");
    }

    #[test]
    fn renames_changed_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let templates = TemplateTree::default();
        let (mut tree, root) = root(&dir);
        let id = file(&mut tree, root, "a.txt", "b", FsStatus::Changed);
        if let SourceKind::Word(name) = tree.kind_mut(tree.children(id)[0]) {
            *name = "b.txt".into();
        }

        Writer::new(&templates, &mut tree, &Passthrough).flush(id).unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "b");
        assert_eq!(tree.real_name(id), "b.txt");
    }
}
