use std::path::{Path, PathBuf};
use std::sync::Arc;

use tree_sitter::StreamingIterator;

use crate::error::{CodegraphError, Result};
use crate::packages::grammar::GoGrammar;
use crate::packages::{PackageError, PackageErrorKind, Position};

/// Go's scanner stops reporting after this many errors in one file.
const MAX_ERRORS_PER_FILE: usize = 10;

/// A retained syntax tree together with the source it was parsed from.
#[derive(Debug)]
pub struct SyntaxFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: tree_sitter::Tree,
}

impl SyntaxFile {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }

    /// Text of every comment in the file, in source order.
    pub fn comments(&self) -> Vec<&str> {
        let mut comments = Vec::new();
        collect_comments(self.root_node(), self.source_bytes(), &mut comments);
        comments
    }

    /// The comment block directly above the `package` clause.
    pub fn package_doc(&self) -> Option<String> {
        let root = self.root_node();
        let mut cursor = root.walk();
        let clause = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_clause")?;

        let mut lines = Vec::new();
        let mut next_row = clause.start_position().row;
        let mut current = clause.prev_sibling();
        while let Some(node) = current {
            if node.kind() != "comment" || node.end_position().row + 1 < next_row {
                break;
            }
            lines.push(self.node_text(&node));
            next_row = node.start_position().row;
            current = node.prev_sibling();
        }

        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }
}

fn collect_comments<'a>(node: tree_sitter::Node, source: &'a [u8], out: &mut Vec<&'a str>) {
    if node.kind() == "comment" {
        if let Ok(text) = node.utf8_text(source) {
            out.push(text);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_comments(child, source, out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Func,
    Type,
    Var,
    Const,
}

/// A top-level name declared by a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub position: Position,
}

/// Everything the engine needs from one source file.
#[derive(Debug)]
pub struct ParsedGoFile {
    pub path: PathBuf,
    pub package_name: Option<String>,
    pub imports: Vec<String>,
    pub declarations: Vec<Declaration>,
    pub errors: Vec<PackageError>,
    /// `None` when the file could not be read
    pub syntax: Option<Arc<SyntaxFile>>,
}

impl ParsedGoFile {
    pub fn is_test_file(&self) -> bool {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with("_test.go"))
            .unwrap_or(false)
    }

    fn unreadable(path: &Path, error: std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            package_name: None,
            imports: Vec::new(),
            declarations: Vec::new(),
            errors: vec![PackageError::new(
                PackageErrorKind::List,
                format!("open {}: {}", path.display(), error),
            )],
            syntax: None,
        }
    }
}

pub struct SourceParser {
    grammar: GoGrammar,
}

impl SourceParser {
    pub fn new() -> Self {
        Self { grammar: GoGrammar }
    }

    /// Parse a file from disk. A read failure is reported on the result, not
    /// returned as an error.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedGoFile> {
        match std::fs::read_to_string(path) {
            Ok(source) => self.parse_source(path, source),
            Err(e) => Ok(ParsedGoFile::unreadable(path, e)),
        }
    }

    /// Parse `source` as if it was read from `path`.
    pub fn parse_source(&self, path: &Path, source: String) -> Result<ParsedGoFile> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&self.grammar.language())
            .map_err(|e| CodegraphError::Driver(e.to_string()))?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| CodegraphError::Driver(format!("parser gave up on {}", path.display())))?;

        let root = tree.root_node();
        let bytes = source.as_bytes();

        let package_name = self.package_name(root, bytes);
        let imports = self.imports(root, bytes);
        let declarations = declarations(root, bytes, path);
        let mut errors = Vec::new();
        syntax_errors(root, bytes, path, &mut errors);

        Ok(ParsedGoFile {
            path: path.to_path_buf(),
            package_name,
            imports,
            declarations,
            errors,
            syntax: Some(Arc::new(SyntaxFile {
                path: path.to_path_buf(),
                source,
                tree,
            })),
        })
    }

    fn package_name(&self, root: tree_sitter::Node, source: &[u8]) -> Option<String> {
        let query = self.grammar.cached_package_query()?;
        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);

        while let Some(m) = matches.next() {
            if let Some(capture) = m.captures.first() {
                if let Ok(text) = capture.node.utf8_text(source) {
                    return Some(text.to_string());
                }
            }
        }
        None
    }

    fn imports(&self, root: tree_sitter::Node, source: &[u8]) -> Vec<String> {
        let Some(query) = self.grammar.cached_imports_query() else {
            tracing::warn!("Invalid imports query for {}", self.grammar.name());
            return Vec::new();
        };

        let mut imports = Vec::new();
        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                if let Ok(text) = capture.node.utf8_text(source) {
                    let path = text.trim_matches(|c| c == '"' || c == '`');
                    if !path.is_empty() {
                        imports.push(path.to_string());
                    }
                }
            }
        }
        imports
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

fn position(path: &Path, node: &tree_sitter::Node) -> Position {
    let point = node.start_position();
    Position {
        file: path.to_path_buf(),
        line: point.row + 1,
        column: point.column + 1,
    }
}

fn declarations(root: tree_sitter::Node, source: &[u8], path: &Path) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut cursor = root.walk();

    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    push_declaration(&mut out, name, source, path, DeclarationKind::Func);
                }
            }
            "type_declaration" => collect_specs(node, source, path, DeclarationKind::Type, &mut out),
            "var_declaration" => collect_specs(node, source, path, DeclarationKind::Var, &mut out),
            "const_declaration" => collect_specs(node, source, path, DeclarationKind::Const, &mut out),
            _ => {}
        }
    }
    out
}

fn collect_specs(
    node: tree_sitter::Node,
    source: &[u8],
    path: &Path,
    kind: DeclarationKind,
    out: &mut Vec<Declaration>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "type_spec" | "type_alias" | "var_spec" | "const_spec" => {
                let mut names = child.walk();
                for name in child.children_by_field_name("name", &mut names) {
                    push_declaration(out, name, source, path, kind);
                }
            }
            other if other.ends_with("_list") => collect_specs(child, source, path, kind, out),
            _ => {}
        }
    }
}

fn push_declaration(
    out: &mut Vec<Declaration>,
    name: tree_sitter::Node,
    source: &[u8],
    path: &Path,
    kind: DeclarationKind,
) {
    if let Ok(text) = name.utf8_text(source) {
        out.push(Declaration {
            name: text.to_string(),
            kind,
            position: position(path, &name),
        });
    }
}

fn syntax_errors(node: tree_sitter::Node, source: &[u8], path: &Path, errors: &mut Vec<PackageError>) {
    if errors.len() >= MAX_ERRORS_PER_FILE || !node.has_error() {
        return;
    }

    if node.is_missing() {
        errors.push(
            PackageError::new(PackageErrorKind::Parse, format!("syntax error: missing {}", node.kind()))
                .at(position(path, &node)),
        );
        return;
    }

    if node.is_error() {
        let token = first_token(node, source);
        let message = if token.is_empty() {
            "syntax error: unexpected EOF".to_string()
        } else {
            format!("syntax error: unexpected {}", token)
        };
        errors.push(PackageError::new(PackageErrorKind::Parse, message).at(position(path, &node)));
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        syntax_errors(child, source, path, errors);
    }
}

fn first_token<'a>(node: tree_sitter::Node, source: &'a [u8]) -> &'a str {
    let mut leaf = node;
    while let Some(child) = leaf.child(0) {
        leaf = child;
    }
    leaf.utf8_text(source)
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .trim()
}
