//! Import management
//!
//! Adding an import is idempotent by path string and keeps the import list in
//! deterministic sorted order. Because insertion is a text edit on the line
//! grid, comment groups attached to existing specs (a trailing `// say hello`
//! on `"fmt"`) are untouched.

use tracing::debug;
use tree_sitter::Node;

use crate::edit::FileBatch;
use crate::syntax::{line_end, line_indent, line_start, node_text};
use crate::typeinfo::unquote;

/// Ensure the file imports `path`, queueing at most one edit per batch.
pub fn ensure_import(batch: &mut FileBatch, root: &Node, source: &str, path: &str) {
    if batch.pending_imports.contains(path) {
        return;
    }

    let mut decls: Vec<Node> = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "import_declaration" {
            decls.push(child);
        }
    }

    // Idempotence: already imported.
    for decl in &decls {
        for spec in import_specs(decl) {
            if spec_path(&spec, source).as_deref() == Some(path) {
                return;
            }
        }
    }
    batch.pending_imports.insert(path.to_string());
    debug!(path, "adding import");

    // Prefer the first grouped block.
    if let Some(block_decl) = decls.iter().find(|d| has_spec_list(d)) {
        let specs: Vec<Node> = import_specs(block_decl);
        if specs.is_empty() {
            // `import ()` — drop the new spec straight after the paren.
            if let Some(open) = find_token(block_decl, "(") {
                batch
                    .edits
                    .insert(open.end_byte(), format!("\n\t\"{path}\"\n"));
            }
            return;
        }
        for spec in &specs {
            if spec_path(spec, source).as_deref() > Some(path) {
                let at = line_start(source, spec.start_byte());
                let indent = line_indent(source, at);
                batch.edits.insert(at, format!("{indent}\"{path}\"\n"));
                return;
            }
        }
        let last = specs.last().expect("nonempty");
        let at = line_end(source, last.end_byte());
        let indent = line_indent(source, line_start(source, last.start_byte()));
        batch.edits.insert(at, format!("{indent}\"{path}\"\n"));
        return;
    }

    // Standalone `import "x"` declarations: keep them sorted.
    if !decls.is_empty() {
        for decl in &decls {
            let first = import_specs(decl).into_iter().next();
            if first.and_then(|s| spec_path(&s, source)).as_deref() > Some(path) {
                let at = line_start(source, decl.start_byte());
                batch.edits.insert(at, format!("import \"{path}\"\n"));
                return;
            }
        }
        let last = decls.last().expect("nonempty");
        let at = line_end(source, last.end_byte());
        batch.edits.insert(at, format!("import \"{path}\"\n"));
        return;
    }

    // No imports at all: a new stanza after the package clause.
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "package_clause" {
            let at = line_end(source, child.end_byte());
            batch.edits.insert(at, format!("\nimport \"{path}\"\n"));
            return;
        }
    }
}

fn has_spec_list(decl: &Node) -> bool {
    let mut cursor = decl.walk();
    let found = decl
        .named_children(&mut cursor)
        .any(|c| c.kind() == "import_spec_list");
    found
}

fn import_specs<'t>(decl: &Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => out.push(child),
            "import_spec_list" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() == "import_spec" {
                        out.push(spec);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn spec_path(spec: &Node, source: &str) -> Option<String> {
    spec.child_by_field_name("path")
        .map(|p| unquote(node_text(&p, source)))
}

fn find_token<'t>(decl: &Node<'t>, token: &str) -> Option<Node<'t>> {
    let mut cursor = decl.walk();
    let mut stack: Vec<Node> = decl.children(&mut cursor).collect();
    while let Some(n) = stack.pop() {
        if n.kind() == token {
            return Some(n);
        }
        let mut inner = n.walk();
        stack.extend(n.children(&mut inner));
    }
    None
}
