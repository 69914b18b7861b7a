//! Construction of new source subtrees from templates.

use crate::{
    constants::FIXTURE_SUFFIX,
    error::{Error, Result},
    source::node::{FsStatus, SourceKind, SourceTree, SrcId},
    template::{TemplateKind, TemplateTree, TplId},
};

impl SourceTree {
    /// Builds a `New` subtree for the entry template `tpl` and attaches it to
    /// `parent`. Nested entries are left out: they belong to other namespaces.
    pub fn create_entry(
        &mut self,
        templates: &TemplateTree,
        tpl: TplId,
        parent: SrcId,
        fixture_mode: bool,
    ) -> Result<SrcId> {
        let entry = self
            .create_recursive(templates, tpl, Some(parent), false, fixture_mode)
            .ok_or_else(|| Error::StructuralNotFound(format!("no source node can be built for {tpl:?}")))?;
        self.add_entry_to_parent(templates, entry, parent)?;
        Ok(entry)
    }

    fn create_recursive(
        &mut self,
        templates: &TemplateTree,
        tpl: TplId,
        parent: Option<SrcId>,
        skip_entry: bool,
        fixture_mode: bool,
    ) -> Option<SrcId> {
        if skip_entry && templates.is_entry(tpl) {
            return None;
        }

        let kind = match templates.kind(tpl) {
            TemplateKind::Dir { .. } => SourceKind::Dir {
                name: Vec::new(),
                items: Vec::new(),
                real_name: String::new(),
                status: FsStatus::New,
            },
            TemplateKind::File { .. } => SourceKind::File {
                name: Vec::new(),
                content: Vec::new(),
                real_name: String::new(),
                status: FsStatus::New,
            },
            TemplateKind::Group { .. } => SourceKind::Group { items: Vec::new() },
            TemplateKind::Insert(_) => SourceKind::Insert { value: String::new(), items: Vec::new() },
            TemplateKind::Imports { .. } => SourceKind::Imports { items: Vec::new() },
            TemplateKind::Import { .. } => SourceKind::Import { name: Vec::new(), alias: Vec::new() },
            TemplateKind::Word(value) => SourceKind::Word(value.clone()),
            TemplateKind::LineFeed(count) => SourceKind::LineFeed(*count),
            TemplateKind::Separator(value) => SourceKind::Separator(value.clone()),
            TemplateKind::Key => return None,
        };
        let id = self.push(parent, Some(tpl), kind);

        let build = |tree: &mut Self, nodes: &[TplId]| -> Vec<SrcId> {
            nodes
                .iter()
                .filter_map(|child| tree.create_recursive(templates, *child, Some(id), true, fixture_mode))
                .collect()
        };

        match templates.kind(tpl) {
            TemplateKind::Dir { name, items, .. } => {
                let name = build(self, name);
                let items = build(self, items);
                if let SourceKind::Dir { name: n, items: i, .. } = self.kind_mut(id) {
                    *n = name;
                    *i = items;
                }
            }
            TemplateKind::File { name, content, .. } => {
                let mut name = build(self, name);
                if fixture_mode {
                    name.push(self.push(Some(id), None, SourceKind::Word(FIXTURE_SUFFIX.to_string())));
                }
                let content = build(self, content);
                if let SourceKind::File { name: n, content: c, .. } = self.kind_mut(id) {
                    *n = name;
                    *c = content;
                }
            }
            TemplateKind::Import { name, alias, .. } => {
                let name = build(self, name);
                let alias = build(self, alias);
                if let SourceKind::Import { name: n, alias: a } = self.kind_mut(id) {
                    *n = name;
                    *a = alias;
                }
            }
            _ => {
                let items = build(self, templates.items(tpl));
                if let Some(slot) = self.items_mut(id) {
                    *slot = items;
                }
            }
        }
        Some(id)
    }

    /// Places a new entry inside its parent: at the end of a directory, at the
    /// start of an import list, and inside a file right after the last
    /// instance of the same entry or else after the line of the template node
    /// that precedes it.
    fn add_entry_to_parent(&mut self, templates: &TemplateTree, child: SrcId, parent: SrcId) -> Result<()> {
        match self.kind(parent) {
            SourceKind::Dir { .. } => {
                if let Some(items) = self.items_mut(parent) {
                    items.push(child);
                }
                Ok(())
            }
            SourceKind::Imports { .. } => {
                if let Some(items) = self.items_mut(parent) {
                    items.insert(0, child);
                }
                Ok(())
            }
            SourceKind::File { .. } => {
                let position = self.position_in_file(templates, child, parent)?;
                if let Some(content) = self.items_mut(parent) {
                    content.insert(position, child);
                }
                Ok(())
            }
            other => Err(Error::StructuralNotFound(format!(
                "entries cannot be placed in {other:?}"
            ))),
        }
    }

    fn position_in_file(&self, templates: &TemplateTree, child: SrcId, file: SrcId) -> Result<usize> {
        let tpl = self.template(child);
        let file_tpl = self
            .template(file)
            .ok_or_else(|| Error::StructuralNotFound("untemplated file".into()))?;

        let mut previous = None;
        for node in templates.items(file_tpl) {
            if Some(*node) == tpl {
                break;
            }
            if !matches!(templates.kind(*node), TemplateKind::LineFeed(_)) {
                previous = Some(*node);
            }
        }

        let content = self.items(file);
        for (i, node) in content.iter().enumerate().rev() {
            let current = self.template(*node);
            if current.is_some() && current == tpl {
                return Ok(i + 1);
            }
            if current.is_some() && current == previous {
                // Skip the line feed that ends the previous line.
                return Ok((i + 2).min(content.len()));
            }
        }

        if previous.is_none() {
            return Ok(0);
        }
        Err(Error::StructuralNotFound(format!(
            "no place for a new entry in '{}'",
            self.real_name(file)
        )))
    }
}
