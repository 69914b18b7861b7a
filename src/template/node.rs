//! Arena holding the compiled template tree.

use crate::case::CaseTransform;

/// Index of a node in a [`TemplateTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TplId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Unknown,
    Go,
}

/// Placeholder bound to a field of a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertSpec {
    pub namespace: String,
    pub name: String,
    /// The value identifies an entry of the namespace on disk.
    pub is_key: bool,
    /// The value disambiguates repeated entries during a read.
    pub for_merge: bool,
    pub case: Option<CaseTransform>,
    /// Literal content emitted only when the value is non-empty.
    pub items: Vec<TplId>,
}

impl InsertSpec {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            is_key: false,
            for_merge: false,
            case: None,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateKind {
    Dir {
        name: Vec<TplId>,
        items: Vec<TplId>,
        entry: bool,
        /// Next directory or file on the way from a key-named directory to the key itself.
        next_in_key_path: Option<TplId>,
    },
    File {
        kind: FileKind,
        name: Vec<TplId>,
        content: Vec<TplId>,
        entry: bool,
    },
    Group {
        items: Vec<TplId>,
        entry: bool,
    },
    Insert(InsertSpec),
    Imports {
        items: Vec<TplId>,
    },
    Import {
        name: Vec<TplId>,
        alias: Vec<TplId>,
        entry: bool,
    },
    Word(String),
    LineFeed(usize),
    Separator(String),
    /// Marks the containing name as a key. Removed during analysis.
    Key,
}

#[derive(Debug, Clone)]
pub struct TemplateNode {
    parent: Option<TplId>,
    kind: TemplateKind,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateTree {
    nodes: Vec<TemplateNode>,
}

impl TemplateTree {
    pub fn push(&mut self, kind: TemplateKind) -> TplId {
        self.nodes.push(TemplateNode { parent: None, kind });
        TplId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: TplId) -> &TemplateKind {
        &self.nodes[id.0].kind
    }

    pub(crate) fn kind_mut(&mut self, id: TplId) -> &mut TemplateKind {
        &mut self.nodes[id.0].kind
    }

    pub fn parent(&self, id: TplId) -> Option<TplId> {
        self.nodes[id.0].parent
    }

    pub fn insert(&self, id: TplId) -> Option<&InsertSpec> {
        match self.kind(id) {
            TemplateKind::Insert(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn word(&self, id: TplId) -> Option<&str> {
        match self.kind(id) {
            TemplateKind::Word(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_fs(&self, id: TplId) -> bool {
        matches!(self.kind(id), TemplateKind::Dir { .. } | TemplateKind::File { .. })
    }

    pub fn is_dir(&self, id: TplId) -> bool {
        matches!(self.kind(id), TemplateKind::Dir { .. })
    }

    pub fn is_entry(&self, id: TplId) -> bool {
        match self.kind(id) {
            TemplateKind::Dir { entry, .. }
            | TemplateKind::File { entry, .. }
            | TemplateKind::Group { entry, .. }
            | TemplateKind::Import { entry, .. } => *entry,
            _ => false,
        }
    }

    pub(crate) fn set_entry(&mut self, id: TplId) {
        if let TemplateKind::Dir { entry, .. }
        | TemplateKind::File { entry, .. }
        | TemplateKind::Group { entry, .. }
        | TemplateKind::Import { entry, .. } = self.kind_mut(id)
        {
            *entry = true;
        }
    }

    /// Name nodes of a directory or file.
    pub fn name(&self, id: TplId) -> &[TplId] {
        match self.kind(id) {
            TemplateKind::Dir { name, .. } | TemplateKind::File { name, .. } => name,
            _ => &[],
        }
    }

    pub fn next_in_key_path(&self, id: TplId) -> Option<TplId> {
        match self.kind(id) {
            TemplateKind::Dir { next_in_key_path, .. } => *next_in_key_path,
            _ => None,
        }
    }

    /// All direct children. Directory and file names come before their items,
    /// an import's name before its alias.
    pub fn children(&self, id: TplId) -> Vec<TplId> {
        match self.kind(id) {
            TemplateKind::Dir { name, items, .. } => name.iter().chain(items).copied().collect(),
            TemplateKind::File { name, content, .. } => name.iter().chain(content).copied().collect(),
            TemplateKind::Group { items, .. } | TemplateKind::Imports { items } => items.clone(),
            TemplateKind::Insert(spec) => spec.items.clone(),
            TemplateKind::Import { name, alias, .. } => name.iter().chain(alias).copied().collect(),
            TemplateKind::Word(_)
            | TemplateKind::LineFeed(_)
            | TemplateKind::Separator(_)
            | TemplateKind::Key => Vec::new(),
        }
    }

    /// Items a source node of this template owns: directory items, file content,
    /// group or insert items, import list items.
    pub fn items(&self, id: TplId) -> &[TplId] {
        match self.kind(id) {
            TemplateKind::Dir { items, .. } => items,
            TemplateKind::File { content, .. } => content,
            TemplateKind::Group { items, .. } | TemplateKind::Imports { items } => items,
            TemplateKind::Insert(spec) => &spec.items,
            _ => &[],
        }
    }

    /// Whether `child` is `parent` or lies below it.
    pub fn is_child_or_current(&self, parent: TplId, child: TplId) -> bool {
        let mut current = Some(child);
        while let Some(id) = current {
            if id == parent {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// The nearest directory or file at or above `id`.
    pub fn up_to_fs(&self, id: TplId) -> Option<TplId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_fs(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    pub fn has_insert_in_name(&self, id: TplId) -> bool {
        self.name(id).iter().any(|&n| self.insert(n).is_some())
    }

    /// Sets parent links for every node reachable from `root`.
    pub(crate) fn link_parents(&mut self, root: TplId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in self.children(id) {
                self.nodes[child.0].parent = Some(id);
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_parents_through_names_and_inserts() {
        let mut tree = TemplateTree::default();
        let word = tree.push(TemplateKind::Word("x".into()));
        let mut spec = InsertSpec::new("attribute", "nullable");
        spec.items.push(word);
        let insert = tree.push(TemplateKind::Insert(spec));
        let file = tree.push(TemplateKind::File {
            kind: FileKind::Go,
            name: vec![],
            content: vec![insert],
            entry: false,
        });
        let dir = tree.push(TemplateKind::Dir {
            name: vec![],
            items: vec![file],
            entry: true,
            next_in_key_path: None,
        });
        tree.link_parents(dir);

        assert_eq!(tree.parent(word), Some(insert));
        assert_eq!(tree.up_to_fs(word), Some(file));
        assert!(tree.is_child_or_current(dir, word));
        assert!(!tree.is_child_or_current(file, dir));
        assert!(tree.is_entry(dir));
    }

    #[test]
    fn lists_import_name_before_alias() {
        let mut tree = TemplateTree::default();
        let name = tree.push(TemplateKind::Word("github.com/google/uuid".into()));
        let alias = tree.push(TemplateKind::Word("guuid".into()));
        let import = tree.push(TemplateKind::Import { name: vec![name], alias: vec![alias], entry: false });
        let imports = tree.push(TemplateKind::Imports { items: vec![import] });
        tree.link_parents(imports);

        assert_eq!(tree.children(import), vec![name, alias]);
        assert_eq!(tree.parent(alias), Some(import));
        assert!(tree.items(import).is_empty());
    }
}
