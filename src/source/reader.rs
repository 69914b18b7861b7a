//! Lazy reconstruction of the source tree from disk.

use crate::{
    constants::FIXTURE_SUFFIX,
    error::{Error, Result},
    ext::PathExt,
    source::{
        node::{FsStatus, SourceKind, SourceTree, SrcId},
        parser::{compile_pattern, PatternCache},
    },
    template::{TemplateKind, TemplateTree, TplId},
};
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, trace};
use walkdir::WalkDir;

/// Reads directories and files on demand and binds what it finds to templates.
pub struct Reader<'a> {
    pub(crate) templates: &'a TemplateTree,
    pub(crate) tree: &'a mut SourceTree,
    pub(crate) patterns: &'a mut PatternCache,
    pub(crate) fixture_mode: bool,
}

impl<'a> Reader<'a> {
    pub fn new(
        templates: &'a TemplateTree,
        tree: &'a mut SourceTree,
        patterns: &'a mut PatternCache,
        fixture_mode: bool,
    ) -> Self {
        Self { templates, tree, patterns, fixture_mode }
    }

    /// Reads what is needed to reach the filesystem template `tpl` from
    /// `src`. Returns the items of the node the walk started on, when that
    /// node was read by this call. Nodes read before are never returned twice.
    pub fn read(&mut self, src: SrcId, tpl: TplId) -> Result<Vec<SrcId>> {
        let templates = self.templates;
        let (nearest, path) = self.tree.find_nearest(templates, src, tpl)?;
        if !self.tree.is_fs(nearest) {
            return Ok(Vec::new());
        }
        let path: Vec<TplId> = path.into_iter().take_while(|step| templates.is_fs(*step)).collect();
        self.read_path(nearest, &path)
    }

    fn read_path(&mut self, node: SrcId, path: &[TplId]) -> Result<Vec<SrcId>> {
        let status = self.tree.status(node);
        if status == Some(FsStatus::NotExist) {
            return Ok(Vec::new());
        }

        let is_file = match self.tree.kind(node) {
            SourceKind::File { .. } => true,
            SourceKind::Dir { .. } => false,
            other => return Err(Error::StructuralNotFound(format!("cannot read into {other:?}"))),
        };

        let mut out = Vec::new();
        if status == Some(FsStatus::NotRead) {
            if is_file {
                self.read_file(node)?;
            } else {
                self.read_dir(node)?;
            }
            out = self.tree.items(node).to_vec();
        }
        if is_file {
            return Ok(out);
        }

        if let Some((first, rest)) = path.split_first() {
            let matching: Vec<SrcId> = self
                .tree
                .items(node)
                .iter()
                .copied()
                .filter(|item| self.tree.template(*item) == Some(*first))
                .collect();
            for item in matching {
                self.read_path(item, rest)?;
            }
        }
        Ok(out)
    }

    /// Lists a directory and binds its entries to the directory template.
    /// Literal names are bound before names with inserts.
    fn read_dir(&mut self, dir: SrcId) -> Result<()> {
        let templates = self.templates;
        let path = self.tree.build_real_path(dir)?;
        let dir_tpl = self
            .tree
            .template(dir)
            .ok_or_else(|| Error::StructuralNotFound(format!("untemplated directory {}", path.display())))?;
        debug!("Reading directory {}", path.display());

        let mut items = Vec::new();
        for entry in WalkDir::new(&path).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            let real_name = entry.path().file_name_checked()?.to_string();
            let kind = if entry.file_type().is_dir() {
                SourceKind::Dir { name: Vec::new(), items: Vec::new(), real_name, status: FsStatus::NotRead }
            } else {
                SourceKind::File { name: Vec::new(), content: Vec::new(), real_name, status: FsStatus::NotRead }
            };
            items.push(self.tree.push(Some(dir), None, kind));
        }
        if let Some(slot) = self.tree.items_mut(dir) {
            *slot = items;
        }

        let (literal, with_inserts): (Vec<TplId>, Vec<TplId>) = templates
            .items(dir_tpl)
            .iter()
            .partition(|tpl| !templates.has_insert_in_name(**tpl));

        for tpl in literal.into_iter().chain(with_inserts) {
            let matched = self.matched_items(dir, tpl)?;
            let mut bound = 0;
            for src in matched {
                if templates.next_in_key_path(tpl).is_some() && !self.has_next_key_path(src, tpl)? {
                    debug!("Skipping {} without the rest of the key path", self.tree.real_name(src));
                    continue;
                }
                if self.bind_name(src, tpl)? {
                    bound += 1;
                }
            }

            if bound == 0 && !templates.is_entry(tpl) {
                let kind = match templates.kind(tpl) {
                    TemplateKind::Dir { .. } => SourceKind::Dir {
                        name: Vec::new(),
                        items: Vec::new(),
                        real_name: String::new(),
                        status: FsStatus::NotExist,
                    },
                    _ => SourceKind::File {
                        name: Vec::new(),
                        content: Vec::new(),
                        real_name: String::new(),
                        status: FsStatus::NotExist,
                    },
                };
                let placeholder = self.tree.push(Some(dir), Some(tpl), kind);
                if let Some(slot) = self.tree.items_mut(dir) {
                    slot.push(placeholder);
                }
            }
        }

        self.tree.set_status(dir, FsStatus::NotChanged);
        Ok(())
    }

    fn read_file(&mut self, file: SrcId) -> Result<()> {
        let path = self.tree.build_real_path(file)?;
        debug!("Reading file {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| Error::fs("read", &path, e))?;
        self.parse_content(file, &content)?;
        self.tree.set_status(file, FsStatus::NotChanged);
        Ok(())
    }

    /// Unbound entries of `dir` whose kind and name fit `tpl`. A non-entry
    /// template takes at most one.
    fn matched_items(&self, dir: SrcId, tpl: TplId) -> Result<Vec<SrcId>> {
        let matcher = glob_matcher(&self.search_pattern(tpl)?)?;
        let wants_dir = self.templates.is_dir(tpl);
        let entry = self.templates.is_entry(tpl);

        let mut found = Vec::new();
        for item in self.tree.items(dir) {
            if self.tree.template(*item).is_some() {
                continue;
            }
            let is_dir = matches!(self.tree.kind(*item), SourceKind::Dir { .. });
            if is_dir != wants_dir || !matcher.is_match(self.tree.real_name(*item)) {
                continue;
            }
            found.push(*item);
            if !entry {
                break;
            }
        }
        trace!("{} entries match {:?}", found.len(), tpl);
        Ok(found)
    }

    /// Glob for a template name: literal words escaped, inserts as `*`.
    fn search_pattern(&self, tpl: TplId) -> Result<String> {
        let mut pattern = String::new();
        for node in self.templates.name(tpl) {
            match self.templates.kind(*node) {
                TemplateKind::Word(word) => pattern.push_str(&globset::escape(word)),
                TemplateKind::Insert(_) => pattern.push('*'),
                other => {
                    return Err(Error::TemplateError(format!("{other:?} cannot appear in a searchable name")))
                }
            }
        }
        if self.fixture_mode && !self.templates.is_dir(tpl) {
            pattern.push_str(FIXTURE_SUFFIX);
        }
        Ok(pattern)
    }

    /// Whether the rest of the key path below `tpl` exists under `dir`.
    fn has_next_key_path(&self, dir: SrcId, tpl: TplId) -> Result<bool> {
        let mut segments = Vec::new();
        let mut next = self.templates.next_in_key_path(tpl);
        while let Some(step) = next {
            segments.push(self.search_pattern(step)?);
            next = self.templates.next_in_key_path(step);
        }
        if segments.is_empty() {
            return Ok(true);
        }

        let base = self.tree.build_real_path(dir)?;
        let matcher = glob_matcher(&segments.join("/"))?;
        let depth = segments.len();
        for entry in WalkDir::new(&base).min_depth(depth).max_depth(depth) {
            let entry = entry?;
            if let Ok(relative) = entry.path().strip_prefix(&base) {
                if matcher.is_match(relative) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Binds a listed entry to `tpl` by parsing its name. Returns false when
    /// the name fits the glob but not the full pattern, e.g. an empty insert.
    fn bind_name(&mut self, src: SrcId, tpl: TplId) -> Result<bool> {
        let templates = self.templates;
        let real_name = self.tree.real_name(src).to_string();
        let stem = if self.fixture_mode && !templates.is_dir(tpl) {
            real_name.strip_suffix(FIXTURE_SUFFIX).unwrap_or(&real_name).to_string()
        } else {
            real_name.clone()
        };

        let Some(mut nodes) = self.match_text(&stem, templates.name(tpl), src)? else {
            debug!(
                "Leaving {} untemplated, it does not fit {}",
                real_name,
                compile_pattern(templates, templates.name(tpl))?
            );
            return Ok(false);
        };
        if stem.len() != real_name.len() {
            nodes.push(self.tree.push(Some(src), None, SourceKind::Word(FIXTURE_SUFFIX.to_string())));
        }
        self.tree.set_name(src, nodes);
        self.tree.set_template(src, tpl);
        Ok(true)
    }
}

fn glob_matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern).literal_separator(true).build()?.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::{parse_content, parse_name};
    use crate::template::FileKind;
    use tempfile::TempDir;
    use test_log::test;

    struct Fixture {
        templates: TemplateTree,
        root_tpl: TplId,
        file_tpl: TplId,
        dir: TempDir,
    }

    fn fixture() -> Fixture {
        let mut templates = TemplateTree::default();
        let name = parse_name(&mut templates, "{!entity_name}.md").unwrap();
        let content = parse_content(&mut templates, "# ▶EntityName◀\n").unwrap();
        let file_tpl = templates.push(TemplateKind::File { kind: FileKind::Unknown, name, content, entry: true });
        let readme_name = parse_name(&mut templates, "README.md").unwrap();
        let readme_content = parse_content(&mut templates, "hello\n").unwrap();
        let readme = templates.push(TemplateKind::File {
            kind: FileKind::Unknown,
            name: readme_name,
            content: readme_content,
            entry: false,
        });
        let root_name = parse_name(&mut templates, "{!path}").unwrap();
        let root_tpl = templates.push(TemplateKind::Dir {
            name: root_name,
            items: vec![file_tpl, readme],
            entry: true,
            next_in_key_path: None,
        });
        templates.link_parents(root_tpl);
        Fixture { templates, root_tpl, file_tpl, dir: TempDir::new().unwrap() }
    }

    fn bound_to(tree: &SourceTree, dir: SrcId, tpl: TplId) -> Vec<SrcId> {
        tree.items(dir).iter().copied().filter(|id| tree.template(*id) == Some(tpl)).collect()
    }

    #[test]
    fn reads_entries_and_leaves_missing_placeholders() {
        let fx = fixture();
        std::fs::write(fx.dir.path().join("user_account.md"), "# UserAccount\nextra\n").unwrap();
        std::fs::write(fx.dir.path().join("notes.txt"), "x").unwrap();

        let root_path = fx.dir.path().to_str().unwrap();
        let (mut tree, root) = SourceTree::with_root(&fx.templates, fx.root_tpl, root_path);
        let mut patterns = PatternCache::default();
        let mut reader = Reader::new(&fx.templates, &mut tree, &mut patterns, false);
        let read = reader.read(root, fx.file_tpl).unwrap();
        assert_eq!(read.len(), 3);
        assert!(reader.read(root, fx.file_tpl).unwrap().is_empty());

        let files = bound_to(&tree, root, fx.file_tpl);
        assert_eq!(files.len(), 1);
        assert_eq!(tree.status(files[0]), Some(FsStatus::NotChanged));
        assert_eq!(tree.render(&fx.templates, files[0]), "# UserAccount\nextra\n");
        let insert = tree.children(files[0])[0];
        assert_eq!(tree.value(insert), Some("user_account"));

        let missing: Vec<_> = tree
            .items(root)
            .iter()
            .filter(|id| tree.status(**id) == Some(FsStatus::NotExist))
            .collect();
        assert_eq!(missing.len(), 1);
        assert!(tree.items(root).iter().any(|id| tree.template(*id).is_none()));
    }

    #[test]
    fn fixture_mode_expects_suffix() {
        let fx = fixture();
        std::fs::write(fx.dir.path().join("order.md"), "# Order\n").unwrap();
        std::fs::write(fx.dir.path().join("item.md.e"), "# Item\n").unwrap();

        let root_path = fx.dir.path().to_str().unwrap();
        let (mut tree, root) = SourceTree::with_root(&fx.templates, fx.root_tpl, root_path);
        let mut patterns = PatternCache::default();
        let mut reader = Reader::new(&fx.templates, &mut tree, &mut patterns, true);
        reader.read(root, fx.file_tpl).unwrap();

        let files = bound_to(&tree, root, fx.file_tpl);
        assert_eq!(files.len(), 1);
        assert_eq!(tree.real_name(files[0]), "item.md.e");
        assert_eq!(tree.render_name(&fx.templates, files[0]), "item.md.e");
    }

    #[test]
    fn name_with_empty_insert_stays_untemplated() {
        let fx = fixture();
        std::fs::write(fx.dir.path().join(".md"), "# \n").unwrap();
        std::fs::write(fx.dir.path().join("order.md"), "# Order\n").unwrap();

        let root_path = fx.dir.path().to_str().unwrap();
        let (mut tree, root) = SourceTree::with_root(&fx.templates, fx.root_tpl, root_path);
        let mut patterns = PatternCache::default();
        let mut reader = Reader::new(&fx.templates, &mut tree, &mut patterns, false);
        reader.read(root, fx.file_tpl).unwrap();

        let files = bound_to(&tree, root, fx.file_tpl);
        assert_eq!(files.len(), 1);
        assert_eq!(tree.real_name(files[0]), "order.md");
        let hidden = tree.items(root).iter().copied().find(|id| tree.real_name(*id) == ".md").unwrap();
        assert!(tree.template(hidden).is_none());
    }
}
