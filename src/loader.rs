//! Go module loader
//!
//! Loads every package of the module that contains the working directory,
//! the way the Go toolchain would: the module root is the nearest ancestor
//! carrying a `go.mod`, and all `.go` files below it (tests included) are
//! parsed and grouped into packages by directory and package clause. Running
//! the tool from a subdirectory still rewrites callers elsewhere in the
//! module.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;
use tree_sitter::Tree;

use crate::edit::EditSet;
use crate::error::{CtxPlumbError, Result};
use crate::fs_utils::true_path;
use crate::parsing::parse_go_source;
use crate::syntax::node_text;

/// One parsed source file. `source` and `tree` are re-established together
/// after every mutation batch.
pub struct GoFile {
    pub path: PathBuf,
    pub canon_path: PathBuf,
    pub source: String,
    pub tree: Tree,
    pub modified: bool,
}

/// A Go package: one directory + one package clause.
pub struct Package {
    pub dir: PathBuf,
    pub import_path: String,
    pub name: String,
    /// Indices into `Workspace::files`, sorted by path.
    pub files: Vec<usize>,
}

/// The loaded module.
pub struct Workspace {
    pub root: PathBuf,
    pub module_path: String,
    pub files: Vec<GoFile>,
    pub packages: Vec<Package>,
}

impl Workspace {
    /// Apply an edit batch to a file: rewrite its source, re-parse, and mark
    /// it modified. No-op for an empty batch.
    pub fn apply_edits(&mut self, file_idx: usize, edits: EditSet) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        let file = &mut self.files[file_idx];
        let new_source = edits.apply(&file.source);
        file.tree = parse_go_source(&file.path, &new_source)?;
        file.source = new_source;
        file.modified = true;
        Ok(())
    }

    /// Index of the package with the given import path, if loaded.
    pub fn package_by_import_path(&self, import_path: &str) -> Option<usize> {
        self.packages
            .iter()
            .position(|p| p.import_path == import_path)
    }

    /// Index of the package owning a file.
    pub fn package_of_file(&self, file_idx: usize) -> usize {
        self.packages
            .iter()
            .position(|p| p.files.contains(&file_idx))
            .expect("file belongs to a package")
    }
}

/// Locate the module root: the nearest ancestor of `work_dir` with a go.mod.
fn find_module_root(work_dir: &Path) -> Result<PathBuf> {
    let start = true_path(work_dir)?;
    let mut dir = start.as_path();
    loop {
        if dir.join("go.mod").is_file() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => {
                return Err(CtxPlumbError::Load {
                    message: format!(
                        "no go.mod found in {} or any parent directory",
                        start.display()
                    ),
                })
            }
        }
    }
}

/// Read the `module` path out of go.mod.
fn read_module_path(root: &Path) -> Result<String> {
    let gomod = fs::read_to_string(root.join("go.mod"))?;
    for line in gomod.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Ok(rest.trim_matches('"').to_string());
            }
        }
    }
    Err(CtxPlumbError::Load {
        message: format!("no module directive in {}", root.join("go.mod").display()),
    })
}

/// Parse the user-supplied `--tags` list into a tag set.
pub fn parse_tags(tags: &str) -> HashSet<String> {
    tags.split([',', ' '])
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.starts_with('!'))
        .map(str::to_string)
        .collect()
}

/// Evaluate the file's `//go:build` constraint line, if any, against the tag
/// set. Files without a constraint are always included. GOOS/GOARCH filename
/// suffixes are not interpreted.
fn build_constraint_satisfied(source: &str, tags: &HashSet<String>) -> bool {
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(expr) = trimmed.strip_prefix("//go:build") {
            return eval_build_expr(expr.trim(), tags).unwrap_or(true);
        }
        if trimmed.starts_with("package ") {
            break;
        }
    }
    true
}

/// Recursive-descent evaluator for build constraint expressions:
/// ident, `!`, `&&`, `||`, parentheses.
fn eval_build_expr(expr: &str, tags: &HashSet<String>) -> Option<bool> {
    let tokens = tokenize_build_expr(expr)?;
    let mut pos = 0;
    let value = parse_or(&tokens, &mut pos, tags)?;
    if pos != tokens.len() {
        return None;
    }
    Some(value)
}

#[derive(Debug, PartialEq)]
enum Tok {
    Ident(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize_build_expr(expr: &str) -> Option<Vec<Tok>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Tok::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Tok::RParen);
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return None;
                }
                tokens.push(Tok::And);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return None;
                }
                tokens.push(Tok::Or);
            }
            _ if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Tok::Ident(ident));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn parse_or(tokens: &[Tok], pos: &mut usize, tags: &HashSet<String>) -> Option<bool> {
    let mut value = parse_and(tokens, pos, tags)?;
    while *pos < tokens.len() && tokens[*pos] == Tok::Or {
        *pos += 1;
        let rhs = parse_and(tokens, pos, tags)?;
        value = value || rhs;
    }
    Some(value)
}

fn parse_and(tokens: &[Tok], pos: &mut usize, tags: &HashSet<String>) -> Option<bool> {
    let mut value = parse_unary(tokens, pos, tags)?;
    while *pos < tokens.len() && tokens[*pos] == Tok::And {
        *pos += 1;
        let rhs = parse_unary(tokens, pos, tags)?;
        value = value && rhs;
    }
    Some(value)
}

fn parse_unary(tokens: &[Tok], pos: &mut usize, tags: &HashSet<String>) -> Option<bool> {
    match tokens.get(*pos)? {
        Tok::Not => {
            *pos += 1;
            Some(!parse_unary(tokens, pos, tags)?)
        }
        Tok::LParen => {
            *pos += 1;
            let value = parse_or(tokens, pos, tags)?;
            if tokens.get(*pos)? != &Tok::RParen {
                return None;
            }
            *pos += 1;
            Some(value)
        }
        Tok::Ident(name) => {
            let value = tags.contains(name.as_str());
            *pos += 1;
            Some(value)
        }
        _ => None,
    }
}

fn skip_dir(name: &str) -> bool {
    name == "vendor" || name == "testdata" || name.starts_with('.') || name.starts_with('_')
}

/// Package name from the file's package clause.
fn package_clause_name(tree: &Tree, source: &str) -> Option<String> {
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "package_clause" {
            let mut inner = child.walk();
            for n in child.named_children(&mut inner) {
                if n.kind() == "package_identifier" {
                    return Some(node_text(&n, source).to_string());
                }
            }
        }
    }
    None
}

/// Load the module containing `work_dir`, applying `--tags` filters.
///
/// Packages are sorted by (import path, name) and files within a package by
/// path, so every downstream traversal is deterministic.
pub fn load(work_dir: &Path, tags: &str) -> Result<Workspace> {
    let root = find_module_root(work_dir)?;
    let module_path = read_module_path(&root)?;
    let tag_set = parse_tags(tags);
    debug!(root = %root.display(), module = %module_path, "loading module");

    let mut paths: Vec<PathBuf> = Vec::new();
    let walker = WalkBuilder::new(&root)
        .standard_filters(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy();
            !(is_dir && entry.depth() > 0 && skip_dir(&name))
        })
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| CtxPlumbError::Load {
            message: format!("walking module tree: {e}"),
        })?;
        let path = entry.path();
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && path.extension().is_some_and(|e| e == "go")
        {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut files: Vec<GoFile> = Vec::new();
    // Key: (relative dir, package name). BTreeMap keeps package order stable.
    let mut groups: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();

    for path in paths {
        let source = fs::read_to_string(&path)?;
        if !build_constraint_satisfied(&source, &tag_set) {
            debug!(path = %path.display(), "excluded by build constraint");
            continue;
        }
        let tree = parse_go_source(&path, &source)?;
        let Some(pkg_name) = package_clause_name(&tree, &source) else {
            debug!(path = %path.display(), "no package clause; skipping");
            continue;
        };
        let dir = path.parent().unwrap_or(&root).to_path_buf();
        let rel_dir = dir
            .strip_prefix(&root)
            .unwrap_or(&dir)
            .to_string_lossy()
            .replace('\\', "/");
        let canon_path = true_path(&path)?;
        let idx = files.len();
        files.push(GoFile {
            path,
            canon_path,
            source,
            tree,
            modified: false,
        });
        groups.entry((rel_dir, pkg_name)).or_default().push(idx);
    }

    let mut packages = Vec::new();
    for ((rel_dir, name), file_indices) in groups {
        let import_path = if rel_dir.is_empty() {
            module_path.clone()
        } else {
            format!("{module_path}/{rel_dir}")
        };
        let dir = if rel_dir.is_empty() {
            root.clone()
        } else {
            root.join(&rel_dir)
        };
        debug!(import_path = %import_path, name = %name, files = file_indices.len(), "package");
        packages.push(Package {
            dir,
            import_path,
            name,
            files: file_indices,
        });
    }

    Ok(Workspace {
        root,
        module_path,
        files,
        packages,
    })
}
