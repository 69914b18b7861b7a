//! Matches raw names and file lines against compiled template patterns.

use crate::{
    error::{Error, Result},
    source::{
        node::{SourceKind, SrcId},
        reader::Reader,
    },
    template::{TemplateKind, TemplateTree, TplId},
};
use log::trace;
use regex::Regex;
use std::collections::{hash_map::Entry, HashMap};

/// Regular expressions compiled from template node sequences, reused across reads.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: HashMap<Vec<TplId>, Regex>,
}

impl PatternCache {
    fn regex(&mut self, templates: &TemplateTree, nodes: &[TplId]) -> Result<&Regex> {
        match self.compiled.entry(nodes.to_vec()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let pattern = compile_pattern(templates, nodes)?;
                let regex = Regex::new(&pattern)
                    .map_err(|source| Error::PatternCompileError { pattern, source })?;
                Ok(entry.insert(regex))
            }
        }
    }

    /// Every capture group of a match, unmatched groups as empty strings.
    fn captures(&mut self, templates: &TemplateTree, nodes: &[TplId], text: &str) -> Result<Option<Vec<String>>> {
        let regex = self.regex(templates, nodes)?;
        Ok(regex.captures(text).map(|caps| {
            caps.iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        }))
    }
}

/// Anchored pattern for a node sequence. A trailing literal lets the rest of
/// the text through as an extra capture.
pub fn compile_pattern(templates: &TemplateTree, nodes: &[TplId]) -> Result<String> {
    let mut pattern = String::from("^");
    for node in nodes {
        pattern.push_str(&node_pattern(templates, *node)?);
    }
    if nodes.last().is_some_and(|last| templates.word(*last).is_some()) {
        pattern.push_str("(.*)");
    }
    pattern.push('$');
    Ok(pattern)
}

fn node_pattern(templates: &TemplateTree, node: TplId) -> Result<String> {
    match templates.kind(node) {
        TemplateKind::Word(value) => Ok(format!("({})", regex::escape(value))),
        TemplateKind::Separator(_) => Ok(r"([\t ]+)".to_string()),
        TemplateKind::Insert(spec) if spec.items.is_empty() => Ok("([^/]+?)".to_string()),
        TemplateKind::Insert(spec) => Ok(format!("({})?", items_pattern(templates, &spec.items)?)),
        TemplateKind::Group { items, .. } => Ok(format!("({})?", items_pattern(templates, items)?)),
        other => Err(Error::TemplateError(format!("{other:?} cannot be matched inside a line"))),
    }
}

fn items_pattern(templates: &TemplateTree, items: &[TplId]) -> Result<String> {
    items.iter().map(|item| node_pattern(templates, *item)).collect()
}

struct TemplateLine {
    nodes: Vec<TplId>,
    lf: Option<TplId>,
    imports: Option<TplId>,
    entry: Option<TplId>,
}

/// Cuts template content into lines at line feeds. A repeatable entry is a
/// line of its own and an import list belongs to the line it ends.
fn split_template_lines(templates: &TemplateTree, content: &[TplId]) -> Vec<TemplateLine> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut imports = None;

    for &node in content {
        match templates.kind(node) {
            TemplateKind::LineFeed(_) => lines.push(TemplateLine {
                nodes: std::mem::take(&mut buf),
                lf: Some(node),
                imports: imports.take(),
                entry: None,
            }),
            TemplateKind::Imports { .. } => imports = Some(node),
            TemplateKind::Group { items, entry: true } => lines.push(TemplateLine {
                nodes: items.clone(),
                lf: None,
                imports: None,
                entry: Some(node),
            }),
            _ => buf.push(node),
        }
    }
    if !buf.is_empty() || imports.is_some() {
        lines.push(TemplateLine { nodes: buf, lf: None, imports, entry: None });
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Base,
    ExpectImport,
    InImport,
}

impl Reader<'_> {
    /// Matches `text` against `nodes`. On a match the returned nodes mirror the
    /// template. Nothing is added to the tree when the text does not match.
    pub(crate) fn match_text(&mut self, text: &str, nodes: &[TplId], parent: SrcId) -> Result<Option<Vec<SrcId>>> {
        let templates = self.templates;
        let Some(caps) = self.patterns.captures(templates, nodes, text)? else {
            return Ok(None);
        };

        let mut pos = 0;
        let mut out = Vec::with_capacity(nodes.len() + 1);
        for node in nodes {
            out.push(self.capture_to_node(&caps, &mut pos, *node, parent)?);
        }
        if let Some(rest) = caps.get(pos).filter(|rest| !rest.is_empty()) {
            out.push(self.tree.push(Some(parent), None, SourceKind::Word(rest.clone())));
        }
        Ok(Some(out))
    }

    fn capture_to_node(&mut self, caps: &[String], pos: &mut usize, tpl: TplId, parent: SrcId) -> Result<SrcId> {
        let templates = self.templates;
        let captured = caps.get(*pos).cloned().unwrap_or_default();
        let (kind, items) = match templates.kind(tpl) {
            TemplateKind::Word(value) => (SourceKind::Word(value.clone()), None),
            TemplateKind::Separator(_) => (SourceKind::Separator(captured), None),
            TemplateKind::Insert(spec) if spec.items.is_empty() => {
                (SourceKind::Insert { value: captured, items: Vec::new() }, None)
            }
            TemplateKind::Insert(spec) => {
                let value = if captured.is_empty() { String::new() } else { "1".to_string() };
                (SourceKind::Insert { value, items: Vec::new() }, Some(spec.items.as_slice()))
            }
            TemplateKind::Group { items, .. } => (SourceKind::Group { items: Vec::new() }, Some(items.as_slice())),
            other => return Err(Error::TemplateError(format!("{other:?} cannot be matched inside a line"))),
        };
        *pos += 1;

        let id = self.tree.push(Some(parent), Some(tpl), kind);
        if let Some(item_tpls) = items {
            let mut children = Vec::with_capacity(item_tpls.len());
            for item in item_tpls {
                children.push(self.capture_to_node(caps, pos, *item, id)?);
            }
            if let Some(slot) = self.tree.items_mut(id) {
                *slot = children;
            }
        }
        Ok(id)
    }

    /// Rebuilds the content of `file` from `text`, line by line.
    pub(crate) fn parse_content(&mut self, file: SrcId, text: &str) -> Result<()> {
        let templates = self.templates;
        let file_tpl = self
            .tree
            .template(file)
            .ok_or_else(|| Error::StructuralNotFound("untemplated file".into()))?;
        let lines = split_template_lines(templates, templates.items(file_tpl));
        let src_lines: Vec<&str> = text.split_terminator('\n').collect();

        let mut content = Vec::new();
        let mut cursor = 0;
        let mut state = LineState::Base;
        let mut import_buf = Vec::new();

        for (i, line) in src_lines.iter().copied().enumerate() {
            let Some(tpl_line) = lines.get(cursor) else {
                self.push_tail(file, &src_lines[i..], &mut content);
                break;
            };
            if tpl_line.imports.is_some() && state == LineState::Base {
                state = LineState::ExpectImport;
            }

            match state {
                LineState::Base => {}
                LineState::ExpectImport => {
                    if line.is_empty() {
                        self.bump_line_feed(file, &mut content);
                        continue;
                    }
                    if !line.starts_with("import") {
                        self.parse_imports(file, Vec::new(), tpl_line, &mut content)?;
                        cursor += 1;
                        state = LineState::Base;
                    } else if line.ends_with('(') {
                        state = LineState::InImport;
                        continue;
                    } else {
                        let spec = line.trim_start_matches("import").trim().to_string();
                        self.parse_imports(file, vec![spec], tpl_line, &mut content)?;
                        cursor += 1;
                        state = LineState::Base;
                        continue;
                    }
                }
                LineState::InImport => {
                    let spec = line.trim();
                    if spec.is_empty() {
                        continue;
                    }
                    if spec != ")" {
                        import_buf.push(spec.to_string());
                        continue;
                    }
                    self.parse_imports(file, std::mem::take(&mut import_buf), tpl_line, &mut content)?;
                    cursor += 1;
                    state = LineState::Base;
                    continue;
                }
            }

            let Some(tpl_line) = lines.get(cursor) else {
                self.push_tail(file, &src_lines[i..], &mut content);
                break;
            };

            if let Some(nodes) = self.match_text(line, &tpl_line.nodes, file)? {
                if let Some(entry) = tpl_line.entry {
                    let group = self.tree.push(Some(file), Some(entry), SourceKind::Group { items: Vec::new() });
                    for node in &nodes {
                        self.tree.set_parent(*node, group);
                    }
                    if let Some(slot) = self.tree.items_mut(group) {
                        *slot = nodes;
                    }
                    content.push(group);
                    continue;
                }
                content.extend(nodes);
                content.push(self.line_feed(file, tpl_line.lf, 1));
                cursor += 1;
                continue;
            }

            // An entry line that does not match may be where the entries end.
            if tpl_line.entry.is_some() {
                if let Some(next) = lines.get(cursor + 1) {
                    if let Some(next_nodes) = self.match_text(line, &next.nodes, file)? {
                        content.extend(next_nodes);
                        content.push(self.line_feed(file, next.lf, 1));
                        cursor += 2;
                        continue;
                    }
                }
            }

            if line.is_empty() {
                self.bump_line_feed(file, &mut content);
                continue;
            }
            content.push(self.tree.push(Some(file), None, SourceKind::Word(line.to_string())));
            content.push(self.line_feed(file, None, 1));
        }

        trace!("Parsed {} lines into {} nodes", src_lines.len(), content.len());
        if let Some(slot) = self.tree.items_mut(file) {
            *slot = content;
        }
        Ok(())
    }

    fn line_feed(&mut self, file: SrcId, tpl: Option<TplId>, count: usize) -> SrcId {
        self.tree.push(Some(file), tpl, SourceKind::LineFeed(count))
    }

    /// A blank line extends the preceding line feed, or starts one.
    fn bump_line_feed(&mut self, file: SrcId, content: &mut Vec<SrcId>) {
        if let Some(&last) = content.last() {
            if let SourceKind::LineFeed(count) = self.tree.kind_mut(last) {
                *count += 1;
                return;
            }
        }
        content.push(self.line_feed(file, None, 1));
    }

    fn push_tail(&mut self, file: SrcId, lines: &[&str], content: &mut Vec<SrcId>) {
        for line in lines {
            content.push(self.tree.push(Some(file), None, SourceKind::Word(line.to_string())));
            content.push(self.line_feed(file, None, 1));
        }
    }

    /// Binds import specs (`path` or `alias path`, quoted) to the template
    /// imports. Literal imports are bound once, insert-bearing ones first
    /// wait for literal ones and entry imports may bind many times.
    fn parse_imports(
        &mut self,
        file: SrcId,
        specs: Vec<String>,
        tpl_line: &TemplateLine,
        content: &mut Vec<SrcId>,
    ) -> Result<()> {
        let templates = self.templates;
        let imports = self.tree.push(Some(file), tpl_line.imports, SourceKind::Imports { items: Vec::new() });
        content.push(imports);
        content.push(self.line_feed(file, tpl_line.lf, 0));

        let template_items = tpl_line.imports.map(|tpl| templates.items(tpl)).unwrap_or_default();
        let (mut candidates, tail): (Vec<TplId>, Vec<TplId>) = template_items.iter().partition(|imp| {
            !matches!(templates.kind(**imp), TemplateKind::Import { name, .. }
                if name.iter().any(|n| templates.insert(*n).is_some()))
        });
        candidates.extend(tail);

        let mut items = Vec::with_capacity(specs.len());
        for spec in specs {
            let cleaned = spec.replacen('"', "", 2);
            let parts: Vec<&str> = cleaned.split(' ').collect();
            let (alias, name) = match parts.as_slice() {
                [alias, name] => (*alias, *name),
                _ => ("", parts.first().copied().unwrap_or_default()),
            };

            let import = self.tree.push(Some(imports), None, SourceKind::Import { name: Vec::new(), alias: Vec::new() });
            let mut bound = None;
            for (idx, candidate) in candidates.iter().enumerate() {
                let TemplateKind::Import { name: name_tpl, alias: alias_tpl, entry } = templates.kind(*candidate) else {
                    continue;
                };
                let Some(name_nodes) = self.match_text(name, name_tpl, import)? else {
                    continue;
                };
                let alias_nodes = if alias.is_empty() {
                    Vec::new()
                } else {
                    match self.match_text(alias, alias_tpl, import)? {
                        Some(nodes) => nodes,
                        None => vec![self.tree.push(Some(import), None, SourceKind::Word(alias.to_string()))],
                    }
                };
                self.tree.set_template(import, *candidate);
                if let SourceKind::Import { name: n, alias: a } = self.tree.kind_mut(import) {
                    *n = name_nodes;
                    *a = alias_nodes;
                }
                bound = Some((idx, *entry));
                break;
            }

            match bound {
                Some((idx, false)) => {
                    candidates.remove(idx);
                }
                Some((_, true)) => {}
                None => {
                    let name_word = self.tree.push(Some(import), None, SourceKind::Word(name.to_string()));
                    let alias_words = if alias.is_empty() {
                        Vec::new()
                    } else {
                        vec![self.tree.push(Some(import), None, SourceKind::Word(alias.to_string()))]
                    };
                    if let SourceKind::Import { name: n, alias: a } = self.tree.kind_mut(import) {
                        *n = vec![name_word];
                        *a = alias_words;
                    }
                }
            }
            items.push(import);
        }

        if let Some(slot) = self.tree.items_mut(imports) {
            *slot = items;
        }
        Ok(())
    }
}
