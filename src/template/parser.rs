//! Compiles template directories, file names and file contents into the
//! template arena.
//!
//! Parsing is driven by a stack of strategies, one per syntactic context.
//! A strategy consumes one token at a time and either buffers a node, opens
//! a nested context, or hands a finished node back to its parent when its
//! context closes.

use crate::{
    case::{normalize, CaseTransform},
    constants::{GO_EXTENSION, MERGE_FIELD, TEMPLATE_FILE_SUFFIX},
    error::{Error, Result},
    ext::PathExt,
    template::{
        lexer::{Grammar, Lexer, Token},
        node::{FileKind, InsertSpec, TemplateKind, TemplateTree, TplId},
    },
};
use globset::GlobSet;
use log::{debug, trace};
use std::path::Path;
use walkdir::WalkDir;

struct Context<'t> {
    tree: &'t mut TemplateTree,
    lexer: Lexer,
}

impl Context<'_> {
    fn push(&mut self, kind: TemplateKind) -> TplId {
        self.tree.push(kind)
    }
}

enum Delegated {
    NoChild,
    Pending,
    Finished(TplId),
}

enum Nested {
    Insert(InsertStrategy),
    Entry(EntryStrategy),
    Import(ImportStrategy),
}

impl Nested {
    fn handle(&mut self, cx: &mut Context, token: Option<Token>) -> Result<Option<TplId>> {
        match self {
            Nested::Insert(s) => s.handle(cx, token),
            Nested::Entry(s) => s.handle(cx, token),
            Nested::Import(s) => s.handle(cx, token),
        }
    }
}

#[derive(Default)]
struct Base {
    buf: Vec<TplId>,
    child: Option<Box<Nested>>,
}

impl Base {
    fn delegate(&mut self, cx: &mut Context, token: &Option<Token>) -> Result<Delegated> {
        let Some(child) = self.child.as_mut() else {
            return Ok(Delegated::NoChild);
        };
        match child.handle(cx, token.clone())? {
            Some(id) => {
                self.child = None;
                Ok(Delegated::Finished(id))
            }
            None => Ok(Delegated::Pending),
        }
    }

    fn push_token(&mut self, cx: &mut Context, token: Token) -> Result<()> {
        match token {
            Token::Word(value) => self.buf.push(cx.push(TemplateKind::Word(value))),
            Token::LineFeed(count) => self.buf.push(cx.push(TemplateKind::LineFeed(count))),
            Token::Separator(value) => self.buf.push(cx.push(TemplateKind::Separator(value))),
            Token::Start => self.child = Some(Box::new(Nested::Insert(InsertStrategy::default()))),
            Token::EntryStart => self.child = Some(Box::new(Nested::Entry(EntryStrategy::default()))),
            other => return Err(unexpected("text", Some(other))),
        }
        Ok(())
    }
}

fn unexpected(context: &str, token: Option<Token>) -> Error {
    match token {
        Some(token) => Error::TemplateError(format!("unexpected token {token:?} in {context}")),
        None => Error::TemplateError(format!("unexpected end of input in {context}")),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum InsertState {
    #[default]
    WithCase,
    Plain,
    Condition,
    Group,
}

#[derive(Default)]
struct InsertStrategy {
    base: Base,
    state: InsertState,
    has_key: bool,
}

impl InsertStrategy {
    fn handle(&mut self, cx: &mut Context, token: Option<Token>) -> Result<Option<TplId>> {
        match self.base.delegate(cx, &token)? {
            Delegated::Pending => return Ok(None),
            Delegated::Finished(id) => {
                self.base.buf.push(id);
                if cx.tree.insert(id).is_some() && self.state != InsertState::Condition {
                    self.state = InsertState::Group;
                }
                return Ok(None);
            }
            Delegated::NoChild => {}
        }

        match token {
            Some(t @ (Token::Word(_) | Token::Separator(_) | Token::LineFeed(_) | Token::Start)) => {
                self.base.push_token(cx, t)?;
            }
            Some(Token::Key) => self.has_key = true,
            Some(Token::NameSeparator) => self.state = InsertState::Plain,
            Some(Token::Condition) => self.state = InsertState::Condition,
            Some(Token::End) => return self.finish(cx).map(Some),
            other => return Err(unexpected("placeholder", other)),
        }
        Ok(None)
    }

    fn finish(&mut self, cx: &mut Context) -> Result<TplId> {
        let buf = std::mem::take(&mut self.base.buf);
        let kind = match self.state {
            InsertState::Plain | InsertState::Condition => {
                let (namespace, name) = match buf.as_slice() {
                    [ns, name, ..] => match (cx.tree.word(*ns), cx.tree.word(*name)) {
                        (Some(ns), Some(name)) => (normalize(ns), normalize(name)),
                        _ => {
                            return Err(Error::TemplateError(
                                "placeholder namespace and name must be plain words".into(),
                            ))
                        }
                    },
                    _ => {
                        return Err(Error::TemplateError(
                            "placeholder needs a namespace and a name".into(),
                        ))
                    }
                };
                let mut spec = self.spec(namespace, name);
                if self.state == InsertState::Condition {
                    spec.items = buf[2..].to_vec();
                }
                TemplateKind::Insert(spec)
            }
            InsertState::Group => TemplateKind::Group { items: buf, entry: false },
            InsertState::WithCase => {
                if self.has_key && buf.is_empty() {
                    TemplateKind::Key
                } else {
                    let mut literal = String::new();
                    for id in &buf {
                        let word = cx.tree.word(*id).ok_or_else(|| {
                            Error::TemplateError("placeholder must be a single word".into())
                        })?;
                        literal.push_str(word);
                    }
                    let case = CaseTransform::infer(&literal).ok_or_else(|| {
                        Error::TemplateError(format!("unexpected case of '{literal}'"))
                    })?;
                    let snake = normalize(&literal);
                    let (namespace, name) = snake.split_once('_').unwrap_or((snake.as_str(), ""));
                    let mut spec = self.spec(namespace.to_string(), name.to_string());
                    spec.case = Some(case);
                    TemplateKind::Insert(spec)
                }
            }
        };
        Ok(cx.push(kind))
    }

    fn spec(&self, namespace: String, name: String) -> InsertSpec {
        let mut spec = InsertSpec::new(namespace, name);
        spec.is_key = self.has_key;
        spec.for_merge = spec.name == MERGE_FIELD;
        spec
    }
}

#[derive(Default)]
struct EntryStrategy {
    base: Base,
}

impl EntryStrategy {
    fn handle(&mut self, cx: &mut Context, token: Option<Token>) -> Result<Option<TplId>> {
        match self.base.delegate(cx, &token)? {
            Delegated::Pending => return Ok(None),
            Delegated::Finished(id) => {
                self.base.buf.push(id);
                return Ok(None);
            }
            Delegated::NoChild => {}
        }

        match token {
            Some(t @ (Token::Word(_) | Token::Separator(_) | Token::LineFeed(_) | Token::Start)) => {
                self.base.push_token(cx, t)?;
            }
            Some(Token::EntryEnd) => {
                // The entry line owns exactly one newline of the run that follows.
                let Some(Token::LineFeed(count)) = cx.lexer.next_token() else {
                    return Err(Error::TemplateError(
                        "entry template must end with line feed".into(),
                    ));
                };
                cx.lexer.go_back(count - 1);
                let items = std::mem::take(&mut self.base.buf);
                return Ok(Some(cx.push(TemplateKind::Group { items, entry: true })));
            }
            other => return Err(unexpected("entry", other)),
        }
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ImportState {
    #[default]
    SingleLine,
    Multiline,
}

#[derive(Default)]
struct ImportStrategy {
    base: Base,
    state: ImportState,
    items: Vec<TplId>,
    alias: Vec<TplId>,
}

impl ImportStrategy {
    fn handle(&mut self, cx: &mut Context, token: Option<Token>) -> Result<Option<TplId>> {
        match self.base.delegate(cx, &token)? {
            Delegated::Pending => return Ok(None),
            Delegated::Finished(id) => {
                if matches!(cx.tree.kind(id), TemplateKind::Group { entry: true, .. }) {
                    self.append_entry(cx, id);
                } else {
                    self.base.buf.push(id);
                }
                return Ok(None);
            }
            Delegated::NoChild => {}
        }

        match token {
            Some(Token::Word(word)) => {
                if self.state == ImportState::SingleLine && word == "(" {
                    self.state = ImportState::Multiline;
                } else if self.state == ImportState::Multiline && word == ")" {
                    let items = std::mem::take(&mut self.items);
                    return Ok(Some(cx.push(TemplateKind::Imports { items })));
                } else {
                    let trimmed = trim_quotes(&word);
                    if !trimmed.is_empty() {
                        self.base.push_token(cx, Token::Word(trimmed.to_string()))?;
                    }
                }
            }
            Some(Token::Separator(_)) => {
                if !self.base.buf.is_empty() {
                    self.alias = std::mem::take(&mut self.base.buf);
                }
            }
            Some(Token::LineFeed(count)) => match self.state {
                ImportState::SingleLine => {
                    // Leave the newline run to the file so the blank line after a
                    // one-line import survives.
                    cx.lexer.go_back(count);
                    let import = self.take_import(cx, false);
                    return Ok(Some(cx.push(TemplateKind::Imports { items: vec![import] })));
                }
                ImportState::Multiline => {
                    if !self.base.buf.is_empty() {
                        let import = self.take_import(cx, false);
                        self.items.push(import);
                    }
                }
            },
            Some(t @ (Token::Start | Token::EntryStart)) => self.base.push_token(cx, t)?,
            other => return Err(unexpected("import block", other)),
        }
        Ok(None)
    }

    fn take_import(&mut self, cx: &mut Context, entry: bool) -> TplId {
        let name = std::mem::take(&mut self.base.buf);
        let alias = std::mem::take(&mut self.alias);
        cx.push(TemplateKind::Import { name, alias, entry })
    }

    fn append_entry(&mut self, cx: &mut Context, group: TplId) {
        let mut name = Vec::new();
        let mut alias = Vec::new();
        let items = cx.tree.items(group).to_vec();
        for item in items {
            match cx.tree.kind(item) {
                TemplateKind::Separator(_) => {
                    if !name.is_empty() {
                        alias = std::mem::take(&mut name);
                    }
                }
                TemplateKind::Word(word) => {
                    let trimmed = trim_quotes(word).to_string();
                    if !trimmed.is_empty() {
                        name.push(cx.push(TemplateKind::Word(trimmed)));
                    }
                }
                _ => name.push(item),
            }
        }
        let import = cx.push(TemplateKind::Import { name, alias, entry: true });
        self.items.push(import);
    }
}

fn trim_quotes(word: &str) -> &str {
    let word = word.strip_prefix('"').unwrap_or(word);
    word.strip_suffix('"').unwrap_or(word)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum GoFileState {
    #[default]
    Package,
    ExpectImport,
    Normal,
}

#[derive(Default)]
struct GoFileStrategy {
    base: Base,
    state: GoFileState,
    after_imports: bool,
}

impl GoFileStrategy {
    fn handle(&mut self, cx: &mut Context, token: Option<Token>) -> Result<Option<Vec<TplId>>> {
        match self.base.delegate(cx, &token)? {
            Delegated::Pending => return Ok(None),
            Delegated::Finished(id) => {
                self.base.buf.push(id);
                if matches!(cx.tree.kind(id), TemplateKind::Imports { .. }) {
                    self.state = GoFileState::Normal;
                    self.after_imports = true;
                }
                return Ok(None);
            }
            Delegated::NoChild => {}
        }

        let after_imports = std::mem::take(&mut self.after_imports);
        match token {
            Some(t @ (Token::Separator(_) | Token::Start | Token::EntryStart)) => {
                self.base.push_token(cx, t)?;
            }
            Some(Token::Word(word)) => {
                if self.state == GoFileState::ExpectImport {
                    if word == "import" {
                        self.base.child = Some(Box::new(Nested::Import(ImportStrategy::default())));
                        return Ok(None);
                    }
                    self.push_empty_imports(cx);
                    self.state = GoFileState::Normal;
                }
                self.base.push_token(cx, Token::Word(word))?;
            }
            Some(Token::LineFeed(count)) => {
                if self.state == GoFileState::Package {
                    self.state = GoFileState::ExpectImport;
                }
                // The import list renders its own terminating newline.
                let count = if after_imports { count - 1 } else { count };
                self.base.push_token(cx, Token::LineFeed(count))?;
            }
            None => {
                if self.state == GoFileState::ExpectImport {
                    self.push_empty_imports(cx);
                }
                return Ok(Some(std::mem::take(&mut self.base.buf)));
            }
            other => return Err(unexpected("Go file", other)),
        }
        Ok(None)
    }

    fn push_empty_imports(&mut self, cx: &mut Context) {
        let imports = cx.push(TemplateKind::Imports { items: Vec::new() });
        let lf = cx.push(TemplateKind::LineFeed(0));
        self.base.buf.extend([imports, lf]);
    }
}

fn parse_plain(tree: &mut TemplateTree, input: &str, grammar: Grammar) -> Result<Vec<TplId>> {
    let mut cx = Context { tree, lexer: Lexer::new(input, grammar) };
    let mut base = Base::default();
    loop {
        let token = cx.lexer.next_token();
        match base.delegate(&mut cx, &token)? {
            Delegated::Pending => continue,
            Delegated::Finished(id) => {
                base.buf.push(id);
                continue;
            }
            Delegated::NoChild => {}
        }
        match token {
            Some(token) => base.push_token(&mut cx, token)?,
            None => return Ok(base.buf),
        }
    }
}

/// Compiles a file or directory name.
pub fn parse_name(tree: &mut TemplateTree, name: &str) -> Result<Vec<TplId>> {
    parse_plain(tree, name, Grammar::Path)
}

/// Compiles the content of a file of unknown kind.
pub fn parse_content(tree: &mut TemplateTree, content: &str) -> Result<Vec<TplId>> {
    parse_plain(tree, content, Grammar::Content)
}

/// Compiles Go source, isolating the import list.
pub fn parse_content_go(tree: &mut TemplateTree, content: &str) -> Result<Vec<TplId>> {
    let mut cx = Context { tree, lexer: Lexer::new(content, Grammar::Content) };
    let mut strategy = GoFileStrategy::default();
    loop {
        let token = cx.lexer.next_token();
        if let Some(nodes) = strategy.handle(&mut cx, token)? {
            return Ok(nodes);
        }
    }
}

/// Compiles a template file. A trailing `.t` is dropped from the name and
/// `.go` files get the Go content grammar.
pub fn parse_file(tree: &mut TemplateTree, path: &Path) -> Result<TplId> {
    let file_name = path.file_name_checked()?;
    let name = file_name.strip_suffix(TEMPLATE_FILE_SUFFIX).unwrap_or(file_name);
    let content = std::fs::read_to_string(path).map_err(|e| Error::fs("read template", path, e))?;

    let kind = match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(GO_EXTENSION) => FileKind::Go,
        _ => FileKind::Unknown,
    };
    trace!("Compiling template file {} as {:?}", path.display(), kind);

    let name = parse_name(tree, name)?;
    let content = match kind {
        FileKind::Go => parse_content_go(tree, &content)?,
        FileKind::Unknown => parse_content(tree, &content)?,
    };
    Ok(tree.push(TemplateKind::File { kind, name, content, entry: false }))
}

/// Compiles a template directory. Entries are visited in name order and
/// anything matched by `ignore` is skipped.
pub fn parse_dir(tree: &mut TemplateTree, path: &Path, ignore: &GlobSet) -> Result<TplId> {
    let name = parse_name(tree, path.file_name_checked()?)?;

    let mut items = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if ignore.is_match(entry.path()) {
            debug!("Skipping ignored template entry {}", entry.path().display());
            continue;
        }
        let item = if entry.file_type().is_dir() {
            parse_dir(tree, entry.path(), ignore)?
        } else {
            parse_file(tree, entry.path())?
        };
        items.push(item);
    }

    Ok(tree.push(TemplateKind::Dir { name, items, entry: false, next_in_key_path: None }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tree: &TemplateTree, ids: &[TplId]) -> Vec<TemplateKind> {
        ids.iter().map(|id| tree.kind(*id).clone()).collect()
    }

    #[test]
    fn parses_key_name() {
        let mut tree = TemplateTree::default();
        let ids = parse_name(&mut tree, "{!entity_name}.go").unwrap();
        assert_eq!(ids.len(), 2);
        let spec = tree.insert(ids[0]).unwrap();
        assert_eq!(spec.namespace, "entity");
        assert_eq!(spec.name, "name");
        assert!(spec.is_key);
        assert!(spec.for_merge);
        assert_eq!(spec.case, Some(CaseTransform::Snake));
        assert_eq!(tree.word(ids[1]), Some(".go"));
    }

    #[test]
    fn bare_key_marker() {
        let mut tree = TemplateTree::default();
        let ids = parse_name(&mut tree, "{!}internal").unwrap();
        assert_eq!(kinds(&tree, &ids), vec![TemplateKind::Key, TemplateKind::Word("internal".into())]);
    }

    #[test]
    fn parses_plain_and_conditional_inserts() {
        let mut tree = TemplateTree::default();
        let ids = parse_content(&mut tree, "▶⬇attribute➡nameDb◀▶attribute➡nullable↔*◀").unwrap();
        let plain = tree.insert(ids[0]).unwrap();
        assert_eq!(plain.name, "name_db");
        assert!(plain.is_key);
        assert_eq!(plain.case, None);

        let conditional = tree.insert(ids[1]).unwrap();
        assert_eq!(conditional.name, "nullable");
        assert_eq!(kinds(&tree, &conditional.items), vec![TemplateKind::Word("*".into())]);
    }

    #[test]
    fn nested_insert_makes_group() {
        let mut tree = TemplateTree::default();
        let ids = parse_content(&mut tree, "▶ *▶attributeName◀◀").unwrap();
        match tree.kind(ids[0]) {
            TemplateKind::Group { items, entry } => {
                assert!(!entry);
                assert_eq!(items.len(), 3);
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn entry_takes_one_newline() {
        let mut tree = TemplateTree::default();
        let ids = parse_content(&mut tree, "a\n⏩- ▶entityName◀⏪\n\nb").unwrap();
        let kinds = kinds(&tree, &ids);
        assert!(matches!(kinds[2], TemplateKind::Group { entry: true, .. }));
        assert_eq!(kinds[3], TemplateKind::LineFeed(1));
        assert_eq!(kinds[4], TemplateKind::Word("b".into()));
    }

    #[test]
    fn entry_without_newline_fails() {
        let mut tree = TemplateTree::default();
        assert!(matches!(
            parse_content(&mut tree, "⏩x⏪"),
            Err(Error::TemplateError(_))
        ));
    }

    #[test]
    fn rejects_mixed_case_literal() {
        let mut tree = TemplateTree::default();
        assert!(matches!(
            parse_content(&mut tree, "▶entity_Name-x◀"),
            Err(Error::TemplateError(_))
        ));
    }

    #[test]
    fn go_import_block_owns_its_newline() {
        let mut tree = TemplateTree::default();
        let src = "package x\n\nimport (\n\t\"fmt\"\n\tdb \"▶service➡module◀/db\"\n⏩\t\"▶⬇service➡module◀/x\"⏪\n)\n\nvar a\n";
        let ids = parse_content_go(&mut tree, src).unwrap();
        let kinds = kinds(&tree, &ids);
        let TemplateKind::Imports { items } = &kinds[4] else {
            panic!("expected imports, got {:?}", kinds[4]);
        };
        assert_eq!(items.len(), 3);
        match tree.kind(items[1]) {
            TemplateKind::Import { name, alias, entry } => {
                assert!(!entry);
                assert_eq!(tree.word(alias[0]), Some("db"));
                assert!(tree.insert(name[0]).is_some());
                assert_eq!(tree.word(name[1]), Some("/db"));
            }
            other => panic!("expected import, got {other:?}"),
        }
        assert!(tree.is_entry(items[2]));
        assert_eq!(kinds[5], TemplateKind::LineFeed(1));
        assert_eq!(kinds[6], TemplateKind::Word("var".into()));
    }

    #[test]
    fn go_single_line_import() {
        let mut tree = TemplateTree::default();
        let ids = parse_content_go(&mut tree, "package x\n\nimport \"fmt\"\n\nvar a\n").unwrap();
        let kinds = kinds(&tree, &ids);
        assert!(matches!(&kinds[4], TemplateKind::Imports { items } if items.len() == 1));
        assert_eq!(kinds[5], TemplateKind::LineFeed(1));
    }

    #[test]
    fn go_file_without_imports_gets_empty_list() {
        let mut tree = TemplateTree::default();
        let ids = parse_content_go(&mut tree, "package x\n\nvar a\n").unwrap();
        let kinds = kinds(&tree, &ids);
        assert_eq!(kinds[4], TemplateKind::Imports { items: vec![] });
        assert_eq!(kinds[5], TemplateKind::LineFeed(0));
        assert_eq!(kinds[6], TemplateKind::Word("var".into()));
    }
}
