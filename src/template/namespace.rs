//! Namespace tree derived from the placeholders of a compiled template.

use crate::{
    config::Config,
    constants::ROOT_PATH_FIELD,
    error::{Error, Result},
    ignore::build_ignore_set,
    template::{
        node::{InsertSpec, TemplateKind, TemplateTree, TplId},
        parser::parse_dir,
    },
};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use std::path::Path;

/// Index of a namespace in a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NsId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    pub parent: Option<NsId>,
    pub children: IndexMap<String, NsId>,
    /// Templates that start one entry of this namespace.
    pub entrypoints: Vec<TplId>,
    /// Directories and files whose names carry a key of this namespace.
    pub keys: Vec<TplId>,
    /// Deepest directories and files that carry a field of this namespace.
    pub paths: Vec<TplId>,
    /// Field names, in order of first appearance.
    pub values: IndexSet<String>,
}

impl Namespace {
    fn new(name: impl Into<String>, parent: Option<NsId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: IndexMap::new(),
            entrypoints: Vec::new(),
            keys: Vec::new(),
            paths: Vec::new(),
            values: IndexSet::new(),
        }
    }
}

/// A compiled template directory together with its namespace tree.
#[derive(Debug, Clone)]
pub struct Schema {
    tree: TemplateTree,
    namespaces: Vec<Namespace>,
    root_dir: TplId,
}

impl Schema {
    /// Compiles the template directory at `template_dir`.
    pub fn load<P: AsRef<Path>>(template_dir: P, config: &Config) -> Result<Self> {
        let template_dir = template_dir.as_ref();
        if !template_dir.is_dir() {
            return Err(Error::TemplateError(format!(
                "template directory '{}' does not exist",
                template_dir.display()
            )));
        }
        let ignore = build_ignore_set(template_dir, &config.ignore)?;

        let mut tree = TemplateTree::default();
        let root_dir = parse_dir(&mut tree, template_dir, &ignore)?;
        let schema = Self::from_tree(tree, root_dir)?;
        info!(
            "Compiled template {} into {} nodes and {} namespaces",
            template_dir.display(),
            schema.tree.len(),
            schema.namespaces.len()
        );
        Ok(schema)
    }

    /// Binds the root directory name to the `path` field of the root namespace
    /// and analyzes the tree.
    pub fn from_tree(mut tree: TemplateTree, root_dir: TplId) -> Result<Self> {
        let mut path_insert = InsertSpec::new("", ROOT_PATH_FIELD);
        path_insert.is_key = true;
        path_insert.for_merge = true;
        let path_insert = tree.push(TemplateKind::Insert(path_insert));
        if let TemplateKind::Dir { name, entry, .. } = tree.kind_mut(root_dir) {
            *name = vec![path_insert];
            *entry = true;
        }
        tree.link_parents(root_dir);

        let mut root = Namespace::new("", None);
        root.entrypoints.push(root_dir);
        let mut analyzer = Analyzer { tree: &mut tree, namespaces: vec![root] };
        analyzer.analyze(root_dir, NsId(0))?;
        let namespaces = analyzer.namespaces;

        Ok(Self { tree, namespaces, root_dir })
    }

    pub fn tree(&self) -> &TemplateTree {
        &self.tree
    }

    pub fn root(&self) -> NsId {
        NsId(0)
    }

    pub fn root_dir(&self) -> TplId {
        self.root_dir
    }

    pub fn namespace(&self, id: NsId) -> &Namespace {
        &self.namespaces[id.0]
    }

    pub fn child(&self, parent: NsId, name: &str) -> Option<NsId> {
        self.namespace(parent).children.get(name).copied()
    }

    /// Like [`Schema::child`] but fails for an undeclared namespace.
    pub fn require_child(&self, parent: NsId, name: &str) -> Result<NsId> {
        self.child(parent, name).ok_or_else(|| Error::UnknownNamespace {
            namespace: name.to_string(),
            parent: self.namespace(parent).name.clone(),
        })
    }

    /// `ns` itself or the nearest ancestor named `name`.
    pub fn current_or_parent(&self, ns: NsId, name: &str) -> Option<NsId> {
        current_or_parent(&self.namespaces, ns, name)
    }

    pub fn is_current_or_ancestor(&self, ns: NsId, candidate: NsId) -> bool {
        let mut current = Some(ns);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.namespace(id).parent;
        }
        false
    }

    /// Every namespace in depth-first order, with its depth.
    pub fn walk(&self) -> Vec<(usize, NsId)> {
        let mut out = Vec::with_capacity(self.namespaces.len());
        let mut stack = vec![(0, self.root())];
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            for child in self.namespace(id).children.values().rev() {
                stack.push((depth + 1, *child));
            }
        }
        out
    }
}

fn current_or_parent(namespaces: &[Namespace], ns: NsId, name: &str) -> Option<NsId> {
    let mut current = Some(ns);
    while let Some(id) = current {
        if namespaces[id.0].name == name {
            return Some(id);
        }
        current = namespaces[id.0].parent;
    }
    None
}

struct Analyzer<'t> {
    tree: &'t mut TemplateTree,
    namespaces: Vec<Namespace>,
}

impl Analyzer<'_> {
    /// Walks the children of `current`. A placeholder of an unknown namespace
    /// opens a child namespace that stays in scope for the following siblings.
    fn analyze(&mut self, current: TplId, mut ns: NsId) -> Result<()> {
        for child in self.tree.children(current) {
            match self.tree.kind(child) {
                TemplateKind::Insert(spec) => {
                    let spec = spec.clone();
                    let owner = match current_or_parent(&self.namespaces, ns, &spec.namespace) {
                        Some(owner) => owner,
                        None => {
                            ns = self.get_or_add_child(ns, &spec.namespace);
                            self.add_entrypoint(ns, current);
                            ns
                        }
                    };
                    if spec.is_key {
                        self.add_key(owner, child)?;
                    }
                    self.add_path(owner, child)?;
                    self.namespaces[owner.0].values.insert(spec.name);
                }
                TemplateKind::Key => self.add_key_force(ns, current)?,
                _ => self.analyze(child, ns)?,
            }
        }
        Ok(())
    }

    fn get_or_add_child(&mut self, parent: NsId, name: &str) -> NsId {
        if let Some(id) = self.namespaces[parent.0].children.get(name) {
            return *id;
        }
        let id = NsId(self.namespaces.len());
        self.namespaces.push(Namespace::new(name, Some(parent)));
        self.namespaces[parent.0].children.insert(name.to_string(), id);
        debug!("Declared namespace '{}'", name);
        id
    }

    fn add_entrypoint(&mut self, ns: NsId, node: TplId) {
        if self.tree.is_fs(node) {
            self.tree.set_entry(node);
            self.namespaces[ns.0].entrypoints.push(node);
            return;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if self.tree.is_entry(id) {
                self.namespaces[ns.0].entrypoints.push(id);
                return;
            }
            current = self.tree.parent(id);
        }
    }

    fn add_key(&mut self, ns: NsId, insert: TplId) -> Result<()> {
        let mut keys = std::mem::take(&mut self.namespaces[ns.0].keys);
        let result = self.add_or_replace_last(insert, &mut keys);
        self.namespaces[ns.0].keys = keys;
        result
    }

    fn add_path(&mut self, ns: NsId, insert: TplId) -> Result<()> {
        let mut paths = std::mem::take(&mut self.namespaces[ns.0].paths);
        let result = self.add_or_replace_last(insert, &mut paths);
        self.namespaces[ns.0].paths = paths;
        result
    }

    /// Keeps only the deepest directory or file per branch.
    fn add_or_replace_last(&self, insert: TplId, list: &mut Vec<TplId>) -> Result<()> {
        let fs = self.tree.up_to_fs(insert).ok_or_else(|| {
            Error::TemplateError("placeholder outside of any directory or file".into())
        })?;
        match list.last_mut() {
            Some(last) if self.tree.is_child_or_current(*last, fs) => *last = fs,
            _ => list.push(fs),
        }
        Ok(())
    }

    /// A bare key marker makes `fs` reach its namespace key: every directory
    /// between the last key and `fs` records the next step towards it.
    fn add_key_force(&mut self, ns: NsId, fs: TplId) -> Result<()> {
        let retained: Vec<TplId> = self
            .tree
            .name(fs)
            .iter()
            .copied()
            .filter(|id| !matches!(self.tree.kind(*id), TemplateKind::Key))
            .collect();
        match self.tree.kind_mut(fs) {
            TemplateKind::Dir { name, .. } | TemplateKind::File { name, .. } => *name = retained,
            _ => {
                return Err(Error::TemplateError(
                    "key marker is only allowed in directory and file names".into(),
                ))
            }
        }

        let namespace = &self.namespaces[ns.0];
        let last_key = *namespace.keys.last().ok_or_else(|| {
            Error::TemplateError(format!(
                "key marker used before any key of namespace '{}'",
                namespace.name
            ))
        })?;

        let mut path = Vec::new();
        let mut current = Some(fs);
        loop {
            let Some(id) = current else {
                return Err(Error::TemplateError(
                    "key marker is not below the key of its namespace".into(),
                ));
            };
            path.push(id);
            if id == last_key {
                break;
            }
            current = self.tree.parent(id);
        }

        for i in (1..path.len()).rev() {
            if let TemplateKind::Dir { next_in_key_path, .. } = self.tree.kind_mut(path[i]) {
                *next_in_key_path = Some(path[i - 1]);
            }
        }
        Ok(())
    }
}
