//! In-memory edits of the source tree: insert values, import merging, deletion.

use crate::{
    constants::{TYPE_GO_FIELD, TYPE_GO_IMPORTS},
    error::{Error, Result},
    source::node::{FsStatus, SourceKind, SourceTree, SrcId},
    template::TemplateTree,
};
use log::trace;

impl SourceTree {
    /// Sets an insert value and marks the owning directory or file changed.
    /// A `type_go` value may also pull an import into the owning Go file.
    pub fn set_insert_value(&mut self, templates: &TemplateTree, insert: SrcId, new_value: &str) -> Result<()> {
        match self.kind_mut(insert) {
            SourceKind::Insert { value, .. } => *value = new_value.to_string(),
            other => {
                return Err(Error::StructuralNotFound(format!(
                    "expected an insert, got {other:?}"
                )))
            }
        }

        let fs = self.up_to_fs(insert)?;
        if self.status(fs) == Some(FsStatus::NotChanged) {
            self.set_status(fs, FsStatus::Changed);
        }

        let is_type_go = self
            .template(insert)
            .and_then(|tpl| templates.insert(tpl))
            .is_some_and(|spec| spec.name == TYPE_GO_FIELD);
        if !is_type_go {
            return Ok(());
        }

        if !matches!(self.kind(fs), SourceKind::File { .. }) {
            return Err(Error::StructuralNotFound(format!(
                "'{TYPE_GO_FIELD}' is set outside of a file"
            )));
        }
        let imports = self
            .items(fs)
            .iter()
            .copied()
            .find(|id| matches!(self.kind(*id), SourceKind::Imports { .. }))
            .ok_or_else(|| {
                Error::StructuralNotFound(format!("import list in '{}'", self.real_name(fs)))
            })?;
        self.add_import_for_type(templates, imports, new_value);
        Ok(())
    }

    /// Adds the import a Go type needs, unless it is already listed.
    pub fn add_import_for_type(&mut self, templates: &TemplateTree, imports: SrcId, type_go: &str) {
        let Some((_, path)) = TYPE_GO_IMPORTS.iter().find(|(ty, _)| *ty == type_go) else {
            return;
        };

        let exists = self.items(imports).iter().any(|item| match self.kind(*item) {
            SourceKind::Import { name, .. } => self.concat(templates, name) == *path,
            _ => false,
        });
        if exists {
            return;
        }

        trace!("Adding import \"{}\" for {}", path, type_go);
        let import = self.push(Some(imports), None, SourceKind::Import { name: Vec::new(), alias: Vec::new() });
        let word = self.push(Some(import), None, SourceKind::Word(path.to_string()));
        if let SourceKind::Import { name, .. } = self.kind_mut(import) {
            name.push(word);
        }
        if let Some(items) = self.items_mut(imports) {
            items.push(import);
        }
    }

    /// Removes an entry. New directories and files vanish at once, existing
    /// ones are marked for deletion on the next flush. Content entries are
    /// detached now and their file is marked changed.
    pub fn delete_node(&mut self, id: SrcId) -> Result<()> {
        if let Some(status) = self.status(id) {
            match status {
                FsStatus::NotExist => {}
                FsStatus::New => {
                    if let Some(parent) = self.parent(id) {
                        self.remove_child(parent, id);
                    }
                }
                _ => self.set_status(id, FsStatus::Deleted),
            }
            return Ok(());
        }

        let parent = self
            .parent(id)
            .ok_or_else(|| Error::StructuralNotFound("detached content node".into()))?;
        match self.kind(parent) {
            SourceKind::Imports { .. } | SourceKind::Group { .. } | SourceKind::File { .. } => {
                self.remove_child(parent, id);
            }
            other => {
                return Err(Error::StructuralNotFound(format!(
                    "cannot delete an entry of {other:?}"
                )))
            }
        }

        let fs = self.up_to_fs(parent)?;
        if self.status(fs) == Some(FsStatus::NotChanged) {
            self.set_status(fs, FsStatus::Changed);
        }
        Ok(())
    }
}
