//! Arena holding the source tree reconstructed from, or destined for, disk.

use crate::{
    error::{Error, Result},
    template::{TemplateTree, TplId},
};
use std::path::PathBuf;

/// Index of a node in a [`SourceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SrcId(pub(crate) usize);

/// Reconciliation state of a directory or file. Ordered: anything at or above
/// `NotChanged` has been read or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FsStatus {
    NotRead,
    NotExist,
    NotChanged,
    Changed,
    New,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Dir {
        name: Vec<SrcId>,
        items: Vec<SrcId>,
        real_name: String,
        status: FsStatus,
    },
    File {
        name: Vec<SrcId>,
        content: Vec<SrcId>,
        real_name: String,
        status: FsStatus,
    },
    Group {
        items: Vec<SrcId>,
    },
    Insert {
        value: String,
        items: Vec<SrcId>,
    },
    Imports {
        items: Vec<SrcId>,
    },
    Import {
        name: Vec<SrcId>,
        alias: Vec<SrcId>,
    },
    Word(String),
    LineFeed(usize),
    Separator(String),
}

#[derive(Debug, Clone)]
pub struct SourceNode {
    parent: Option<SrcId>,
    template: Option<TplId>,
    kind: SourceKind,
}

#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    nodes: Vec<SourceNode>,
}

impl SourceTree {
    /// Creates the tree with its root directory at `path`, bound to the root
    /// template directory. The root name is the `path` insert.
    pub fn with_root(templates: &TemplateTree, root_tpl: TplId, path: &str) -> (Self, SrcId) {
        let mut tree = Self::default();
        let root = tree.push(
            None,
            Some(root_tpl),
            SourceKind::Dir {
                name: Vec::new(),
                items: Vec::new(),
                real_name: path.to_string(),
                status: FsStatus::NotRead,
            },
        );
        let name_tpl = templates.name(root_tpl).first().copied();
        let insert = tree.push(
            Some(root),
            name_tpl,
            SourceKind::Insert { value: path.to_string(), items: Vec::new() },
        );
        if let SourceKind::Dir { name, .. } = tree.kind_mut(root) {
            name.push(insert);
        }
        (tree, root)
    }

    /// Number of nodes ever pushed, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, parent: Option<SrcId>, template: Option<TplId>, kind: SourceKind) -> SrcId {
        self.nodes.push(SourceNode { parent, template, kind });
        SrcId(self.nodes.len() - 1)
    }

    pub fn kind(&self, id: SrcId) -> &SourceKind {
        &self.nodes[id.0].kind
    }

    pub(crate) fn kind_mut(&mut self, id: SrcId) -> &mut SourceKind {
        &mut self.nodes[id.0].kind
    }

    pub fn parent(&self, id: SrcId) -> Option<SrcId> {
        self.nodes[id.0].parent
    }

    pub(crate) fn set_parent(&mut self, id: SrcId, parent: SrcId) {
        self.nodes[id.0].parent = Some(parent);
    }

    pub fn template(&self, id: SrcId) -> Option<TplId> {
        self.nodes[id.0].template
    }

    pub(crate) fn set_template(&mut self, id: SrcId, template: TplId) {
        self.nodes[id.0].template = Some(template);
    }

    pub fn is_fs(&self, id: SrcId) -> bool {
        matches!(self.kind(id), SourceKind::Dir { .. } | SourceKind::File { .. })
    }

    pub fn status(&self, id: SrcId) -> Option<FsStatus> {
        match self.kind(id) {
            SourceKind::Dir { status, .. } | SourceKind::File { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn set_status(&mut self, id: SrcId, new: FsStatus) {
        if let SourceKind::Dir { status, .. } | SourceKind::File { status, .. } = self.kind_mut(id) {
            *status = new;
        }
    }

    pub fn real_name(&self, id: SrcId) -> &str {
        match self.kind(id) {
            SourceKind::Dir { real_name, .. } | SourceKind::File { real_name, .. } => real_name,
            _ => "",
        }
    }

    pub(crate) fn set_name(&mut self, id: SrcId, nodes: Vec<SrcId>) {
        if let SourceKind::Dir { name, .. } | SourceKind::File { name, .. } = self.kind_mut(id) {
            *name = nodes;
        }
    }

    pub fn value(&self, id: SrcId) -> Option<&str> {
        match self.kind(id) {
            SourceKind::Insert { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Items owned by a node: directory items, file content, group, insert
    /// and import list items.
    pub fn items(&self, id: SrcId) -> &[SrcId] {
        match self.kind(id) {
            SourceKind::Dir { items, .. } => items,
            SourceKind::File { content, .. } => content,
            SourceKind::Group { items } | SourceKind::Insert { items, .. } | SourceKind::Imports { items } => items,
            _ => &[],
        }
    }

    pub(crate) fn items_mut(&mut self, id: SrcId) -> Option<&mut Vec<SrcId>> {
        match self.kind_mut(id) {
            SourceKind::Dir { items, .. } => Some(items),
            SourceKind::File { content, .. } => Some(content),
            SourceKind::Group { items } | SourceKind::Insert { items, .. } | SourceKind::Imports { items } => {
                Some(items)
            }
            _ => None,
        }
    }

    /// All direct children, names before items.
    pub fn children(&self, id: SrcId) -> Vec<SrcId> {
        match self.kind(id) {
            SourceKind::Dir { name, items, .. } => name.iter().chain(items).copied().collect(),
            SourceKind::File { name, content, .. } => name.iter().chain(content).copied().collect(),
            SourceKind::Import { name, alias } => name.iter().chain(alias).copied().collect(),
            _ => self.items(id).to_vec(),
        }
    }

    pub(crate) fn remove_child(&mut self, parent: SrcId, child: SrcId) -> bool {
        let Some(items) = self.items_mut(parent) else {
            return false;
        };
        let before = items.len();
        items.retain(|id| *id != child);
        before != items.len()
    }

    /// The nearest directory or file at or above `id`.
    pub fn up_to_fs(&self, id: SrcId) -> Result<SrcId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_fs(node) {
                return Ok(node);
            }
            current = self.parent(node);
        }
        Err(Error::StructuralNotFound("no enclosing directory or file".into()))
    }

    /// Path from the root to `id` built from current names.
    pub fn build_path(&self, templates: &TemplateTree, id: SrcId) -> Result<PathBuf> {
        self.collect_path(id, |tree, node| tree.render_name(templates, node))
    }

    /// Path from the root to `id` built from the names on disk.
    pub fn build_real_path(&self, id: SrcId) -> Result<PathBuf> {
        self.collect_path(id, |tree, node| tree.real_name(node).to_string())
    }

    fn collect_path(&self, id: SrcId, name_of: impl Fn(&Self, SrcId) -> String) -> Result<PathBuf> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let name = name_of(self, node);
            if name.is_empty() {
                return Err(Error::StructuralNotFound(format!(
                    "empty path segment above '{}'",
                    segments.last().map(String::as_str).unwrap_or_default()
                )));
            }
            segments.push(name);
            current = self.parent(node);
        }
        Ok(segments.iter().rev().collect())
    }

    /// Records the current name as the name on disk.
    pub(crate) fn update_real_name(&mut self, templates: &TemplateTree, id: SrcId) {
        let rendered = self.render_name(templates, id);
        if let SourceKind::Dir { real_name, .. } | SourceKind::File { real_name, .. } = self.kind_mut(id) {
            *real_name = rendered;
        }
    }

    /// Walks down from `src` along the template path to `tpl`. Returns the
    /// deepest node reached and the template steps that had no source node.
    pub fn find_nearest(&self, templates: &TemplateTree, src: SrcId, tpl: TplId) -> Result<(SrcId, Vec<TplId>)> {
        let mut path = Vec::new();
        let mut current = Some(tpl);
        while let Some(step) = current {
            if Some(step) != self.template(src) {
                path.push(step);
                current = templates.parent(step);
                continue;
            }

            path.reverse();
            let mut node = src;
            for (i, step) in path.iter().enumerate() {
                let children = match self.kind(node) {
                    SourceKind::Dir { items, .. } => items,
                    SourceKind::File { content, .. } => content,
                    other => {
                        return Err(Error::StructuralNotFound(format!(
                            "cannot descend into {other:?}"
                        )))
                    }
                };
                match children.iter().find(|c| self.template(**c) == Some(*step)) {
                    Some(child) => node = *child,
                    None => return Ok((node, path[i..].to_vec())),
                }
            }
            return Ok((node, Vec::new()));
        }
        Ok((src, Vec::new()))
    }

    /// The source node for `tpl` under `src`, if it exists and was read or created.
    pub fn find_child_by_template(&self, templates: &TemplateTree, src: SrcId, tpl: TplId) -> Result<Option<SrcId>> {
        let (nearest, path) = self.find_nearest(templates, src, tpl)?;
        if !path.is_empty() {
            return Ok(None);
        }
        match self.status(nearest) {
            Some(status) if status < FsStatus::NotChanged => Ok(None),
            _ => Ok(Some(nearest)),
        }
    }

    /// Whether `id` is a repeatable entry instance.
    pub fn is_entry(&self, templates: &TemplateTree, id: SrcId) -> bool {
        self.template(id).is_some_and(|tpl| templates.is_entry(tpl))
    }
}
