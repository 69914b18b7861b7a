//! Text reconstruction of source nodes.

use crate::{
    source::node::{SourceKind, SourceTree, SrcId},
    template::{InsertSpec, TemplateTree},
};

impl SourceTree {
    /// Renders a content node. Directories and files render their content.
    pub fn render(&self, templates: &TemplateTree, id: SrcId) -> String {
        match self.kind(id) {
            SourceKind::Word(value) | SourceKind::Separator(value) => value.clone(),
            SourceKind::LineFeed(count) => "\n".repeat(*count),
            SourceKind::Group { items } => {
                if self.is_entry(templates, id) {
                    format!("{}\n", self.concat(templates, items))
                } else if self.has_value(id) {
                    self.concat(templates, items)
                } else {
                    String::new()
                }
            }
            SourceKind::Insert { value, items } => {
                let spec = self.template(id).and_then(|tpl| templates.insert(tpl));
                match spec {
                    Some(InsertSpec { case: Some(case), .. }) => case.apply(value),
                    Some(spec) if !spec.items.is_empty() => {
                        if value.is_empty() {
                            String::new()
                        } else {
                            self.concat(templates, items)
                        }
                    }
                    _ => value.clone(),
                }
            }
            SourceKind::Imports { items } => match items.as_slice() {
                [] => String::new(),
                [single] => format!("import {}\n", self.render(templates, *single)),
                many => {
                    let body: String = many
                        .iter()
                        .map(|item| format!("\t{}\n", self.render(templates, *item)))
                        .collect();
                    format!("import (\n{body})\n")
                }
            },
            SourceKind::Import { name, alias } => {
                let name = self.concat(templates, name);
                if alias.is_empty() {
                    format!("\"{name}\"")
                } else {
                    format!("{} \"{name}\"", self.concat(templates, alias))
                }
            }
            SourceKind::File { content, .. } => self.concat(templates, content),
            SourceKind::Dir { .. } => String::new(),
        }
    }

    /// Current name of a directory or file.
    pub fn render_name(&self, templates: &TemplateTree, id: SrcId) -> String {
        match self.kind(id) {
            SourceKind::Dir { name, .. } | SourceKind::File { name, .. } => self.concat(templates, name),
            _ => String::new(),
        }
    }

    pub(crate) fn concat(&self, templates: &TemplateTree, nodes: &[SrcId]) -> String {
        nodes.iter().map(|id| self.render(templates, *id)).collect()
    }

    /// Whether any insert below `id` holds a non-empty value.
    fn has_value(&self, id: SrcId) -> bool {
        self.children(id).into_iter().any(|child| {
            matches!(self.kind(child), SourceKind::Insert { value, .. } if !value.is_empty())
                || self.has_value(child)
        })
    }
}
