//! Lightweight semantic layer over the parsed module
//!
//! Stands in for a full type checker with the two queries the engine needs:
//! which declaration a callee denotes, and the fully-qualified type of a
//! parameter or argument expression. Types are canonicalized through each
//! file's import table (`context.Context`, `*net/http.Request`, `testing.T`),
//! and callee resolution covers direct calls: bare identifiers, package-
//! qualified selectors, and method selectors whose receiver type is inferable
//! from local declarations. Anything else falls back to the engine's
//! name-plus-package matching.

use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use crate::loader::Workspace;
use crate::syntax::{
    self, func_body, func_params, node_text, param_decls, param_names, param_type,
    receiver_base_name, top_level_func_decls, visit_all,
};

/// Canonical type string of the cancellation handle.
pub const CONTEXT_CONTEXT: &str = "context.Context";

/// Canonical type string of the HTTP request parameter.
pub const HTTP_REQUEST_PTR: &str = "*net/http.Request";

/// Identity of a named function or method declaration, independent of source
/// positions so it survives file mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    /// Import path of the owning package.
    pub pkg: String,
    /// Receiver base type for methods.
    pub recv: Option<String>,
    /// Declared name.
    pub name: String,
}

/// Per-file map from import alias to import path.
#[derive(Debug, Default)]
pub struct ImportTable {
    alias_to_path: HashMap<String, String>,
}

impl ImportTable {
    /// Build the table from a file's import declarations. Blank and dot
    /// imports have no usable alias and are skipped.
    pub fn build(root: &Node, source: &str) -> Self {
        let mut table = ImportTable::default();
        visit_all(root, &mut |n| {
            if n.kind() != "import_spec" {
                return;
            }
            let Some(path_node) = n.child_by_field_name("path") else {
                return;
            };
            let path = unquote(node_text(&path_node, source));
            let alias = match n.child_by_field_name("name") {
                Some(name) => {
                    let text = node_text(&name, source);
                    if text == "_" || text == "." {
                        return;
                    }
                    text.to_string()
                }
                None => path.rsplit('/').next().unwrap_or(&path).to_string(),
            };
            table.alias_to_path.insert(alias, path.clone());
        });
        table
    }

    pub fn path_of(&self, alias: &str) -> Option<&str> {
        self.alias_to_path.get(alias).map(String::as_str)
    }

    pub fn has_import(&self, path: &str) -> bool {
        self.alias_to_path.values().any(|p| p == path)
    }
}

pub fn unquote(lit: &str) -> String {
    lit.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// Fully-qualified string form of a type node: `ctx context.Context` with
/// `"context"` imported canonicalizes to `context.Context`; `*foo.Request`
/// with `foo "net/http"` to `*net/http.Request`. Local and builtin types stay
/// bare.
pub fn canonical_type(ty: &Node, source: &str, imports: &ImportTable) -> String {
    match ty.kind() {
        "pointer_type" => {
            let mut cursor = ty.walk();
            for child in ty.named_children(&mut cursor) {
                return format!("*{}", canonical_type(&child, source, imports));
            }
            node_text(ty, source).to_string()
        }
        "qualified_type" => {
            let pkg = ty
                .child_by_field_name("package")
                .map(|n| node_text(&n, source).to_string())
                .unwrap_or_default();
            let name = ty
                .child_by_field_name("name")
                .map(|n| node_text(&n, source).to_string())
                .unwrap_or_default();
            let path = imports.path_of(&pkg).unwrap_or(&pkg);
            format!("{path}.{name}")
        }
        "generic_type" => ty
            .child_by_field_name("type")
            .map(|t| canonical_type(&t, source, imports))
            .unwrap_or_else(|| node_text(ty, source).to_string()),
        _ => node_text(ty, source).to_string(),
    }
}

/// True when the type node denotes the handle type.
pub fn is_context_type(ty: &Node, source: &str, imports: &ImportTable) -> bool {
    canonical_type(ty, source, imports) == CONTEXT_CONTEXT
}

/// True for `testing.T`, `testing.B`, `testing.F`, `testing.TB`, pointer or
/// not.
pub fn is_testing_param_type(ty: &Node, source: &str, imports: &ImportTable) -> bool {
    let canon = canonical_type(ty, source, imports);
    let bare = canon.strip_prefix('*').unwrap_or(&canon);
    matches!(bare, "testing.T" | "testing.B" | "testing.F" | "testing.TB")
}

/// True for `*net/http.Request`.
pub fn is_http_request_type(ty: &Node, source: &str, imports: &ImportTable) -> bool {
    canonical_type(ty, source, imports) == HTTP_REQUEST_PTR
}

/// Names of the top-level functions and methods of one package, for callee
/// lookups.
#[derive(Debug, Default)]
pub struct PackageIndex {
    pub funcs: HashSet<String>,
    pub methods: HashSet<(String, String)>,
}

pub fn build_package_index(ws: &Workspace, pkg_idx: usize) -> PackageIndex {
    let mut index = PackageIndex::default();
    for &file_idx in &ws.packages[pkg_idx].files {
        let file = &ws.files[file_idx];
        for decl in top_level_func_decls(&file.tree.root_node()) {
            let name = syntax::func_name(&decl, &file.source).to_string();
            match receiver_base_name(&decl, &file.source) {
                Some(recv) => {
                    index.methods.insert((recv, name));
                }
                None => {
                    index.funcs.insert(name);
                }
            }
        }
    }
    index
}

/// The ObjectId of a declaration node.
pub fn object_of_decl(pkg_import_path: &str, decl: &Node, source: &str) -> ObjectId {
    ObjectId {
        pkg: pkg_import_path.to_string(),
        recv: receiver_base_name(decl, source),
        name: syntax::func_name(decl, source).to_string(),
    }
}

/// What a call expression's callee looks like before resolution: the bare
/// name, plus the resolved object when the callee is statically knowable.
#[derive(Debug)]
pub struct CalleeInfo {
    pub name: String,
    pub resolved: Option<ObjectId>,
}

/// Resolve the callee of a direct call. Calls through function-typed values,
/// generic instantiations (`f[T](x)`), and unresolvable selectors yield
/// `resolved: None`; calls whose function expression is neither identifier
/// nor selector yield `None` outright and are never rewritten.
pub fn resolve_callee(
    ws: &Workspace,
    pkg_idx: usize,
    file_idx: usize,
    call: &Node,
) -> Option<CalleeInfo> {
    let file = &ws.files[file_idx];
    let source = file.source.as_str();
    let fun = call.child_by_field_name("function")?;

    match fun.kind() {
        "identifier" => {
            let name = node_text(&fun, source).to_string();
            let index = build_package_index(ws, pkg_idx);
            let resolved = index.funcs.contains(&name).then(|| ObjectId {
                pkg: ws.packages[pkg_idx].import_path.clone(),
                recv: None,
                name: name.clone(),
            });
            Some(CalleeInfo { name, resolved })
        }
        "selector_expression" => {
            let name = fun
                .child_by_field_name("field")
                .map(|f| node_text(&f, source).to_string())?;
            let operand = fun.child_by_field_name("operand")?;
            if operand.kind() != "identifier" {
                return Some(CalleeInfo {
                    name,
                    resolved: None,
                });
            }
            let op_name = node_text(&operand, source);
            let enclosing = syntax::enclosing_func_decl(call);

            // A local variable shadows an import alias of the same name.
            let shadowed = enclosing
                .as_ref()
                .map(|enc| has_local_named(enc, source, op_name))
                .unwrap_or(false);

            let imports = ImportTable::build(&file.tree.root_node(), source);
            if !shadowed {
                if let Some(path) = imports.path_of(op_name) {
                    let resolved = ws.package_by_import_path(path).and_then(|target_pkg| {
                        let index = build_package_index(ws, target_pkg);
                        index.funcs.contains(&name).then(|| ObjectId {
                            pkg: path.to_string(),
                            recv: None,
                            name: name.clone(),
                        })
                    });
                    return Some(CalleeInfo { name, resolved });
                }
            }

            // Method call: infer the receiver's type from local declarations.
            let resolved = enclosing
                .and_then(|enc| {
                    infer_local_type(
                        &enc,
                        op_name,
                        source,
                        &imports,
                        &ws.packages[pkg_idx].import_path,
                    )
                })
                .and_then(|(type_pkg, type_name)| {
                    let target_pkg = ws.package_by_import_path(&type_pkg)?;
                    let index = build_package_index(ws, target_pkg);
                    index
                        .methods
                        .contains(&(type_name.clone(), name.clone()))
                        .then(|| ObjectId {
                            pkg: type_pkg,
                            recv: Some(type_name),
                            name: name.clone(),
                        })
                });
            Some(CalleeInfo { name, resolved })
        }
        _ => None,
    }
}

/// Whether the enclosing function declares `name` as a parameter or local.
fn has_local_named(enc: &Node, source: &str, name: &str) -> bool {
    if let Some(params) = func_params(enc) {
        for param in param_decls(&params) {
            for ident in param_names(&param) {
                if node_text(&ident, source) == name {
                    return true;
                }
            }
        }
    }
    let Some(body) = func_body(enc) else {
        return false;
    };
    let mut found = false;
    visit_all(&body, &mut |n| {
        if found {
            return;
        }
        match n.kind() {
            "short_var_declaration" => {
                if let Some(left) = n.child_by_field_name("left") {
                    let mut cursor = left.walk();
                    for ident in left.named_children(&mut cursor) {
                        if node_text(&ident, source) == name {
                            found = true;
                        }
                    }
                }
            }
            "var_spec" => {
                let mut cursor = n.walk();
                for ident in n.children_by_field_name("name", &mut cursor) {
                    if node_text(&ident, source) == name {
                        found = true;
                    }
                }
            }
            _ => {}
        }
    });
    found
}

/// Infer the declared type of a variable inside a function: parameters,
/// `x := T{...}` / `x := &T{...}` composite literals, and typed `var` specs.
/// Returns (package import path, bare type name).
fn infer_local_type(
    enc: &Node,
    var_name: &str,
    source: &str,
    imports: &ImportTable,
    current_pkg: &str,
) -> Option<(String, String)> {
    // Parameters first: `func (s *Server) run(w Worker)`.
    if let Some(params) = func_params(enc) {
        for param in param_decls(&params) {
            for ident in param_names(&param) {
                if node_text(&ident, source) == var_name {
                    let ty = param_type(&param)?;
                    return resolve_type_node(&ty, source, imports, current_pkg);
                }
            }
        }
    }
    // Receivers bind a name too: `func (s *Server) run() { s.helper() }`.
    if let Some(recv) = enc.child_by_field_name("receiver") {
        for param in param_decls(&recv) {
            for ident in param_names(&param) {
                if node_text(&ident, source) == var_name {
                    let ty = param_type(&param)?;
                    return resolve_type_node(&ty, source, imports, current_pkg);
                }
            }
        }
    }

    let body = func_body(enc)?;
    let mut result = None;
    visit_all(&body, &mut |n| {
        if result.is_some() {
            return;
        }
        match n.kind() {
            "short_var_declaration" => {
                let (Some(left), Some(right)) = (
                    n.child_by_field_name("left"),
                    n.child_by_field_name("right"),
                ) else {
                    return;
                };
                let mut lcursor = left.walk();
                let lhs: Vec<Node> = left.named_children(&mut lcursor).collect();
                let mut rcursor = right.walk();
                let rhs: Vec<Node> = right.named_children(&mut rcursor).collect();
                for (i, ident) in lhs.iter().enumerate() {
                    if node_text(ident, source) != var_name {
                        continue;
                    }
                    let Some(value) = rhs.get(i).or_else(|| rhs.first()) else {
                        continue;
                    };
                    if let Some(lit) = composite_literal_of(value) {
                        if let Some(ty) = lit.child_by_field_name("type") {
                            result = resolve_type_node(&ty, source, imports, current_pkg);
                        }
                    }
                }
            }
            "var_spec" => {
                let mut cursor = n.walk();
                let names: Vec<Node> = n.children_by_field_name("name", &mut cursor).collect();
                if names.iter().any(|id| node_text(id, source) == var_name) {
                    if let Some(ty) = n.child_by_field_name("type") {
                        result = resolve_type_node(&ty, source, imports, current_pkg);
                    }
                }
            }
            _ => {}
        }
    });
    result
}

/// Map a type node to (owning package import path, bare type name).
fn resolve_type_node(
    ty: &Node,
    source: &str,
    imports: &ImportTable,
    current_pkg: &str,
) -> Option<(String, String)> {
    let mut node = *ty;
    loop {
        match node.kind() {
            "pointer_type" | "generic_type" => {
                let mut cursor = node.walk();
                let inner = node.named_children(&mut cursor).next()?;
                node = inner;
            }
            "qualified_type" => {
                let pkg = node
                    .child_by_field_name("package")
                    .map(|n| node_text(&n, source).to_string())?;
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(&n, source).to_string())?;
                let path = imports.path_of(&pkg)?.to_string();
                return Some((path, name));
            }
            "type_identifier" => {
                let name = node_text(&node, source).to_string();
                return Some((current_pkg.to_string(), name));
            }
            _ => return None,
        }
    }
}

fn composite_literal_of<'t>(expr: &Node<'t>) -> Option<Node<'t>> {
    match expr.kind() {
        "composite_literal" => Some(*expr),
        "unary_expression" => {
            let operand = expr.child_by_field_name("operand")?;
            (operand.kind() == "composite_literal").then_some(operand)
        }
        _ => None,
    }
}

/// True when an expression is statically known to carry the handle type:
/// an identifier bound to a handle (parameter or local), or a call that
/// produces one (`context.Background()`, `context.TODO()`,
/// `context.WithValue(...)`, `<recv>.Context()`).
pub fn expr_is_context(
    enc: Option<&Node>,
    expr: &Node,
    source: &str,
    imports: &ImportTable,
) -> bool {
    match expr.kind() {
        "identifier" => {
            let name = node_text(expr, source);
            let Some(enc) = enc else { return false };
            ident_is_context(enc, name, source, imports)
        }
        "call_expression" => call_produces_context(expr, source, imports),
        _ => false,
    }
}

fn call_produces_context(call: &Node, source: &str, imports: &ImportTable) -> bool {
    let Some(fun) = call.child_by_field_name("function") else {
        return false;
    };
    if fun.kind() != "selector_expression" {
        return false;
    }
    let field = fun
        .child_by_field_name("field")
        .map(|f| node_text(&f, source).to_string())
        .unwrap_or_default();
    let operand = fun
        .child_by_field_name("operand")
        .map(|o| node_text(&o, source).to_string())
        .unwrap_or_default();
    if imports.path_of(&operand) == Some("context") {
        return matches!(field.as_str(), "Background" | "TODO" | "WithValue");
    }
    // `<recv>.Context()` is the conventional accessor shape for requests and
    // testing values.
    field == "Context"
}

/// Whether `name` inside the function is bound to a handle value.
pub fn ident_is_context(enc: &Node, name: &str, source: &str, imports: &ImportTable) -> bool {
    if let Some(params) = func_params(enc) {
        for param in param_decls(&params) {
            let is_ctx_ty = param_type(&param)
                .map(|ty| is_context_type(&ty, source, imports))
                .unwrap_or(false);
            if !is_ctx_ty {
                continue;
            }
            for ident in param_names(&param) {
                if node_text(&ident, source) == name {
                    return true;
                }
            }
        }
    }
    let Some(body) = func_body(enc) else {
        return false;
    };
    let mut found = false;
    visit_all(&body, &mut |n| {
        if found || n.kind() != "short_var_declaration" {
            return;
        }
        let (Some(left), Some(right)) = (
            n.child_by_field_name("left"),
            n.child_by_field_name("right"),
        ) else {
            return;
        };
        let first_lhs = left.named_child(0);
        let first_rhs = right.named_child(0);
        if let (Some(lhs), Some(rhs)) = (first_lhs, first_rhs) {
            if node_text(&lhs, source) == name
                && rhs.kind() == "call_expression"
                && call_produces_context(&rhs, source, imports)
            {
                found = true;
            }
        }
    });
    if found {
        return true;
    }
    // Typed var declarations: `var ctx context.Context`.
    let mut typed = false;
    visit_all(&body, &mut |n| {
        if typed || n.kind() != "var_spec" {
            return;
        }
        let mut cursor = n.walk();
        let names: Vec<Node> = n.children_by_field_name("name", &mut cursor).collect();
        if names.iter().any(|id| node_text(id, source) == name) {
            if let Some(ty) = n.child_by_field_name("type") {
                typed = is_context_type(&ty, source, imports);
            }
        }
    });
    typed
}
