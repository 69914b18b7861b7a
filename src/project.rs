//! Typed access to a generated project through its namespaces.
//!
//! A [`Project`] pairs a compiled [`Schema`] with the source tree of one
//! generated directory. Every entity found on disk, or created through
//! [`Project::create_child`], is a node with a namespace, a set of field
//! values and the source nodes it is anchored to. Reads are lazy: a node only
//! looks at the directories and files it needs to answer a call.

use crate::{
    case::normalize,
    config::Config,
    error::{Error, Result},
    format::{self, Formatter},
    source::{PatternCache, Reader, SourceTree, SrcId, Writer},
    template::{NsId, Schema, TplId},
};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// Handle to a node of a [`Project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    id: Uuid,
    namespace: NsId,
    parent: Option<NodeId>,
    children: IndexMap<String, Vec<NodeId>>,
    keys_read: HashSet<NsId>,
    entrypoints: Vec<SrcId>,
    inserts: HashMap<String, Vec<SrcId>>,
    values: IndexMap<String, String>,
    is_new: bool,
    deleted: bool,
}

pub struct Project {
    schema: Schema,
    tree: SourceTree,
    patterns: PatternCache,
    formatter: Box<dyn Formatter>,
    fixture_mode: bool,
    nodes: Vec<Node>,
}

impl Project {
    /// Opens the project at `path` against the template at `template_dir`.
    pub fn open<T: AsRef<Path>, P: AsRef<Path>>(template_dir: T, path: P, config: &Config) -> Result<Self> {
        let schema = Schema::load(template_dir, config)?;
        let formatter = format::from_config(config)?;
        Self::new(schema, path, formatter, config.fixture_mode)
    }

    /// Wraps `path` as the root of an already compiled schema.
    pub fn new<P: AsRef<Path>>(
        schema: Schema,
        path: P,
        formatter: Box<dyn Formatter>,
        fixture_mode: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let path = path
            .to_str()
            .ok_or_else(|| Error::Other(anyhow::anyhow!("Path '{}' is not valid UTF-8", path.display())))?
            .to_string();

        let root_ns = schema.root();
        let root_tpl = schema.namespace(root_ns).entrypoints.first().copied().ok_or_else(|| {
            Error::TemplateError("root namespace has no entrypoint".into())
        })?;
        let (tree, root_src) = SourceTree::with_root(schema.tree(), root_tpl, &path);

        let mut project = Self {
            schema,
            tree,
            patterns: PatternCache::default(),
            formatter,
            fixture_mode,
            nodes: Vec::new(),
        };
        let root = project.push_node(Uuid::new_v4(), root_ns, None, IndexMap::new());
        let root_field = crate::constants::ROOT_PATH_FIELD.to_string();
        project.nodes[root.0].entrypoints.push(root_src);
        project.nodes[root.0].values.insert(root_field, path);
        Ok(project)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn source(&self) -> &SourceTree {
        &self.tree
    }

    pub fn id(&self, node: NodeId) -> Uuid {
        self.nodes[node.0].id
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn namespace(&self, node: NodeId) -> &str {
        &self.schema.namespace(self.nodes[node.0].namespace).name
    }

    /// Values known for the node: key fields read from disk, and everything
    /// set through [`Project::create_child`] or [`Project::set_values`].
    pub fn values(&self, node: NodeId) -> &IndexMap<String, String> {
        &self.nodes[node.0].values
    }

    pub fn value_string(&self, node: NodeId, name: &str) -> &str {
        self.nodes[node.0].values.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn value_bool(&self, node: NodeId, name: &str) -> bool {
        !self.value_string(node, name).is_empty()
    }

    /// Names of the namespaces nested directly under the node's namespace.
    pub fn child_namespaces(&self, node: NodeId) -> Vec<String> {
        self.schema.namespace(self.nodes[node.0].namespace).children.keys().cloned().collect()
    }

    /// Source nodes the node is anchored to.
    pub fn entrypoints(&self, node: NodeId) -> &[SrcId] {
        &self.nodes[node.0].entrypoints
    }

    /// Children in namespace `namespace`, reading whatever is needed to find
    /// every instance on disk.
    pub fn children(&mut self, node: NodeId, namespace: &str) -> Result<Vec<NodeId>> {
        let ns = self.schema.require_child(self.nodes[node.0].namespace, namespace)?;
        self.read_keys(node, ns)?;
        Ok(self.nodes[node.0].children.get(namespace).cloned().unwrap_or_default())
    }

    /// Updates fields of `node` and every placeholder bound to them.
    pub fn set_values<I, K, V>(&mut self, node: NodeId, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.read_paths(node)?;

        for (name, value) in values {
            let (name, value) = (name.into(), value.into());
            debug!("Setting {}.{} = '{}'", self.namespace(node), name, value);
            let inserts = self.nodes[node.0].inserts.get(&name).cloned().unwrap_or_default();
            for insert in inserts {
                self.tree.set_insert_value(self.schema.tree(), insert, &value)?;
            }
            self.nodes[node.0].values.insert(name, value);
        }
        Ok(())
    }

    /// Creates a child in `namespace` and builds its source entries from the
    /// templates, filled from `values`. Nothing is written until a flush.
    pub fn create_child<I, K, V>(&mut self, node: NodeId, namespace: &str, id: Uuid, values: I) -> Result<NodeId>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let ns = self.schema.require_child(self.nodes[node.0].namespace, namespace)?;
        self.read_keys(node, ns)?;

        let values = values.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let child = self.push_node(id, ns, Some(node), values);
        self.nodes[child.0].is_new = true;
        self.nodes[node.0].children.entry(namespace.to_string()).or_default().push(child);

        for entry_tpl in self.schema.namespace(ns).entrypoints.clone() {
            let parent_tpl = self.schema.tree().parent(entry_tpl).ok_or_else(|| {
                Error::StructuralNotFound(format!("entrypoint of '{namespace}' has no parent"))
            })?;
            let src_parent = self.find_source_by_template(node, parent_tpl)?;
            let src = self
                .tree
                .create_entry(self.schema.tree(), entry_tpl, src_parent, self.fixture_mode)?;
            self.nodes[child.0].entrypoints.push(src);
            self.set_inserts(child, src)?;
        }

        info!("Created {} {}", namespace, id);
        Ok(child)
    }

    /// Deletes `node`. Its files are removed by the next flush that covers
    /// them; until then the node stays listed, unless it was never flushed.
    pub fn delete(&mut self, node: NodeId) -> Result<()> {
        let parent = self.nodes[node.0].parent.ok_or(Error::RootDeletion)?;
        self.read_paths(node)?;

        for entry in self.nodes[node.0].entrypoints.clone() {
            self.tree.delete_node(entry)?;
        }

        if self.nodes[node.0].is_new {
            self.detach(parent, node);
        } else {
            self.nodes[node.0].deleted = true;
        }
        info!("Deleted {} {}", self.namespace(node), self.nodes[node.0].id);
        Ok(())
    }

    /// Writes every change below the node's entrypoints to disk.
    pub fn flush(&mut self, node: NodeId) -> Result<()> {
        for entry in self.nodes[node.0].entrypoints.clone() {
            Writer::new(self.schema.tree(), &mut self.tree, self.formatter.as_ref()).flush(entry)?;
        }
        self.prune(node);
        Ok(())
    }

    fn push_node(
        &mut self,
        id: Uuid,
        namespace: NsId,
        parent: Option<NodeId>,
        values: IndexMap<String, String>,
    ) -> NodeId {
        self.nodes.push(Node {
            id,
            namespace,
            parent,
            children: IndexMap::new(),
            keys_read: HashSet::new(),
            entrypoints: Vec::new(),
            inserts: HashMap::new(),
            values,
            is_new: false,
            deleted: false,
        });
        NodeId(self.nodes.len() - 1)
    }

    fn detach(&mut self, parent: NodeId, node: NodeId) {
        for list in self.nodes[parent.0].children.values_mut() {
            list.retain(|child| *child != node);
        }
    }

    fn prune(&mut self, node: NodeId) {
        self.nodes[node.0].is_new = false;
        if self.nodes[node.0].deleted {
            if let Some(parent) = self.nodes[node.0].parent {
                self.detach(parent, node);
            }
            return;
        }
        let children: Vec<NodeId> = self.nodes[node.0].children.values().flatten().copied().collect();
        for child in children {
            self.prune(child);
        }
    }

    /// `node` itself or its nearest ancestor in namespace `name`.
    fn current_or_parent(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.namespace(id) == name {
                return Some(id);
            }
            current = self.nodes[id.0].parent;
        }
        None
    }

    fn entry_by_template(&self, node: NodeId, tpl: TplId) -> Option<SrcId> {
        self.nodes[node.0]
            .entrypoints
            .iter()
            .copied()
            .find(|entry| self.tree.template(*entry) == Some(tpl))
    }

    /// Reads the key path of `ns` once, so every child in it is discovered.
    fn read_keys(&mut self, node: NodeId, ns: NsId) -> Result<()> {
        if !self.nodes[node.0].keys_read.insert(ns) {
            return Ok(());
        }
        let name = self.schema.namespace(ns).name.clone();
        self.nodes[node.0].children.entry(name).or_default();

        for key in self.schema.namespace(ns).keys.clone() {
            self.read_source_by_template(node, key)?;
        }
        Ok(())
    }

    /// Reads every path of the node's namespace, from the nearest node that
    /// can reach it.
    fn read_paths(&mut self, node: NodeId) -> Result<()> {
        let ns = self.nodes[node.0].namespace;
        for tpl in self.schema.namespace(ns).paths.clone() {
            let mut current = node;
            loop {
                if self.read_source_by_template(current, tpl)? {
                    break;
                }
                match self.nodes[current.0].parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Source node for `tpl` reachable from `node`, reading it from disk if
    /// it is not loaded yet.
    fn find_source_by_template(&mut self, node: NodeId, tpl: TplId) -> Result<SrcId> {
        let ns = self.nodes[node.0].namespace;
        for parent_tpl in self.schema.namespace(ns).entrypoints.clone() {
            if !self.schema.tree().is_child_or_current(parent_tpl, tpl) {
                continue;
            }

            let src = match self.entry_by_template(node, parent_tpl) {
                Some(src) => src,
                None => {
                    let parent = self.nodes[node.0].parent.ok_or_else(|| {
                        Error::StructuralNotFound(format!("no entry of '{}' above {tpl:?}", self.namespace(node)))
                    })?;
                    self.find_source_by_template(parent, parent_tpl)?
                }
            };

            if let Some(found) = self.tree.find_child_by_template(self.schema.tree(), src, tpl)? {
                return Ok(found);
            }

            let tpl_fs = self
                .schema
                .tree()
                .up_to_fs(tpl)
                .ok_or_else(|| Error::StructuralNotFound(format!("no directory or file above {tpl:?}")))?;
            if !self.read_source_by_template(node, tpl_fs)? {
                break;
            }
            match self.tree.find_child_by_template(self.schema.tree(), src, tpl)? {
                Some(found) => return Ok(found),
                None => break,
            }
        }

        Err(Error::StructuralNotFound(format!(
            "no source for {tpl:?} under '{}'",
            self.namespace(node)
        )))
    }

    /// Reads `tpl` through the first entrypoint of `node` that contains it.
    /// Returns whether such an entrypoint exists.
    fn read_source_by_template(&mut self, node: NodeId, tpl: TplId) -> Result<bool> {
        for entry in self.nodes[node.0].entrypoints.clone() {
            let Some(entry_tpl) = self.tree.template(entry) else {
                continue;
            };
            if !self.schema.tree().is_child_or_current(entry_tpl, tpl) {
                continue;
            }

            let sources = Reader::new(self.schema.tree(), &mut self.tree, &mut self.patterns, self.fixture_mode)
                .read(entry, tpl)?;
            for src in sources {
                self.get_inserts(node, src)?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Binds the inserts of a freshly built subtree to their nodes and fills
    /// them from the nodes' values.
    fn set_inserts(&mut self, node: NodeId, src: SrcId) -> Result<()> {
        let spec = self.tree.template(src).and_then(|tpl| self.schema.tree().insert(tpl)).cloned();
        if let Some(spec) = spec {
            let owner = self.owner_of(node, &spec.namespace)?;
            self.nodes[owner.0].inserts.entry(spec.name.clone()).or_default().push(src);
            let value = self.nodes[owner.0].values.get(&spec.name).cloned().unwrap_or_default();
            self.tree.set_insert_value(self.schema.tree(), src, &value)?;
        }

        for child in self.tree.children(src) {
            self.set_inserts(node, child)?;
        }
        Ok(())
    }

    /// Binds the inserts of a freshly read subtree to their nodes. Crossing a
    /// repeatable entry moves to the child it belongs to, found by its merge
    /// field or created.
    fn get_inserts(&mut self, node: NodeId, src: SrcId) -> Result<()> {
        let spec = self.tree.template(src).and_then(|tpl| self.schema.tree().insert(tpl)).cloned();
        if let Some(spec) = spec {
            let owner = self.owner_of(node, &spec.namespace)?;
            self.nodes[owner.0].inserts.entry(spec.name.clone()).or_default().push(src);
            if spec.is_key {
                let value = self.tree.value(src).unwrap_or_default().to_string();
                self.nodes[owner.0].values.insert(spec.name, value);
            }
        }

        let mut node = node;
        if self.tree.is_entry(self.schema.tree(), src) {
            node = self.merge_entry(node, src)?;
        }

        for child in self.tree.children(src) {
            self.get_inserts(node, child)?;
        }
        Ok(())
    }

    fn merge_entry(&mut self, node: NodeId, src: SrcId) -> Result<NodeId> {
        let merge = self.tree.children(src).into_iter().find_map(|child| {
            let spec = self.tree.template(child).and_then(|tpl| self.schema.tree().insert(tpl))?;
            if !spec.for_merge || self.current_or_parent(node, &spec.namespace).is_some() {
                return None;
            }
            Some((child, spec.namespace.clone(), spec.name.clone()))
        });
        let Some((insert, namespace, field)) = merge else {
            return Err(Error::AmbiguousMerge(format!(
                "entry under '{}' has no merge field of a child namespace",
                self.namespace(node)
            )));
        };

        let value = self.tree.value(insert).unwrap_or_default().to_string();
        let wanted = normalize(&value);
        let existing = self.nodes[node.0].children.get(&namespace).and_then(|list| {
            list.iter()
                .copied()
                .find(|child| normalize(self.value_string(*child, &field)) == wanted)
        });

        let child = match existing {
            Some(child) => {
                debug!("Merged {} '{}' into an existing node", namespace, value);
                child
            }
            None => {
                let ns = self.schema.require_child(self.nodes[node.0].namespace, &namespace)?;
                let values = IndexMap::from([(field, value.clone())]);
                let child = self.push_node(Uuid::new_v4(), ns, Some(node), values);
                self.nodes[node.0].children.entry(namespace.clone()).or_default().push(child);
                debug!("Found {} '{}'", namespace, value);
                child
            }
        };
        self.nodes[child.0].entrypoints.push(src);
        Ok(child)
    }

    fn owner_of(&self, node: NodeId, namespace: &str) -> Result<NodeId> {
        self.current_or_parent(node, namespace).ok_or_else(|| Error::UnknownNamespace {
            namespace: namespace.to_string(),
            parent: self.namespace(node).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatterKind;
    use tempfile::TempDir;
    use test_log::test;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn template() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "{!service_name}/README.md", "# ▶ServiceName◀\n\nEntities:\n⏩- ▶entity➡name◀⏪\n");
        dir
    }

    fn config() -> Config {
        Config { formatter: FormatterKind::None, ..Config::default() }
    }

    #[test]
    fn root_cannot_be_deleted() {
        let template = template();
        let project_dir = TempDir::new().unwrap();
        let mut project = Project::open(template.path(), project_dir.path(), &config()).unwrap();
        let root = project.root();
        assert!(matches!(project.delete(root), Err(Error::RootDeletion)));
        assert_eq!(project.value_string(root, "path"), project_dir.path().to_str().unwrap());
    }

    #[test]
    fn unknown_namespace_is_rejected() {
        let template = template();
        let project_dir = TempDir::new().unwrap();
        let mut project = Project::open(template.path(), project_dir.path(), &config()).unwrap();
        let root = project.root();
        assert!(matches!(
            project.children(root, "entity"),
            Err(Error::UnknownNamespace { .. })
        ));
    }

    #[test]
    fn new_child_vanishes_on_delete() {
        let template = template();
        let project_dir = TempDir::new().unwrap();
        let mut project = Project::open(template.path(), project_dir.path(), &config()).unwrap();
        let root = project.root();

        let service = project.create_child(root, "service", Uuid::new_v4(), [("name", "billing")]).unwrap();
        let invoice = project.create_child(service, "entity", Uuid::new_v4(), [("name", "invoice")]).unwrap();
        assert_eq!(project.children(service, "entity").unwrap(), vec![invoice]);

        project.delete(invoice).unwrap();
        assert!(project.children(service, "entity").unwrap().is_empty());

        project.flush(root).unwrap();
        let readme = std::fs::read_to_string(project_dir.path().join("billing/README.md")).unwrap();
        assert_eq!(readme, "# Billing\n\nEntities:\n");
    }

    #[test]
    fn reads_back_created_children() {
        let template = template();
        let project_dir = TempDir::new().unwrap();
        {
            let mut project = Project::open(template.path(), project_dir.path(), &config()).unwrap();
            let root = project.root();
            let service = project.create_child(root, "service", Uuid::new_v4(), [("name", "billing")]).unwrap();
            for name in ["invoice", "payment"] {
                project.create_child(service, "entity", Uuid::new_v4(), [("name", name)]).unwrap();
            }
            project.flush(service).unwrap();
        }

        let mut project = Project::open(template.path(), project_dir.path(), &config()).unwrap();
        let root = project.root();
        let services = project.children(root, "service").unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(project.value_string(services[0], "name"), "billing");

        let service = services[0];
        project.set_values(service, [("name", "billing")]).unwrap();
        let entities = project.children(service, "entity").unwrap();
        let names: Vec<&str> = entities.iter().map(|e| project.value_string(*e, "name")).collect();
        assert_eq!(names, vec!["invoice", "payment"]);
    }
}
