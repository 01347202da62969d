//! Go CST navigation helpers
//!
//! Thin accessors over the tree-sitter-go grammar. Node kind and field names
//! follow the grammar: `function_declaration`, `method_declaration`,
//! `call_expression`, `parameter_list`, `import_spec`, and friends.

use tree_sitter::Node;

/// Get text content of a node.
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Visit all nodes in a subtree in pre-order.
pub fn visit_all<'t, F>(node: &Node<'t>, visitor: &mut F)
where
    F: FnMut(&Node<'t>),
{
    visitor(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_all(&child, visitor);
    }
}

/// True for the two function declaration forms.
pub fn is_func_decl(node: &Node) -> bool {
    matches!(
        node.kind(),
        "function_declaration" | "method_declaration"
    )
}

/// Declared name of a function or method declaration.
pub fn func_name<'a>(decl: &Node, source: &'a str) -> &'a str {
    decl.child_by_field_name("name")
        .map(|n| node_text(&n, source))
        .unwrap_or("")
}

/// The `parameter_list` of a declaration.
pub fn func_params<'t>(decl: &Node<'t>) -> Option<Node<'t>> {
    decl.child_by_field_name("parameters")
}

/// The `block` body of a declaration.
pub fn func_body<'t>(decl: &Node<'t>) -> Option<Node<'t>> {
    decl.child_by_field_name("body")
}

/// Base type name of a method receiver: `(s *Server)` -> `Server`.
pub fn receiver_base_name(decl: &Node, source: &str) -> Option<String> {
    let recv = decl.child_by_field_name("receiver")?;
    let param = first_param_decl(&recv)?;
    let ty = param.child_by_field_name("type")?;
    Some(base_type_name(&ty, source))
}

/// Strip pointer and generic wrappers down to the bare type name.
pub fn base_type_name(ty: &Node, source: &str) -> String {
    match ty.kind() {
        "pointer_type" => {
            let mut cursor = ty.walk();
            for child in ty.named_children(&mut cursor) {
                return base_type_name(&child, source);
            }
            String::new()
        }
        "generic_type" => ty
            .child_by_field_name("type")
            .map(|t| base_type_name(&t, source))
            .unwrap_or_default(),
        "qualified_type" => ty
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
            .unwrap_or_default(),
        _ => node_text(ty, source).to_string(),
    }
}

/// All parameter declarations of a `parameter_list`, variadic included.
pub fn param_decls<'t>(params: &Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        if matches!(
            child.kind(),
            "parameter_declaration" | "variadic_parameter_declaration"
        ) {
            out.push(child);
        }
    }
    out
}

fn first_param_decl<'t>(params: &Node<'t>) -> Option<Node<'t>> {
    param_decls(params).into_iter().next()
}

/// Name identifiers of one parameter declaration (`a, b T` has two).
pub fn param_names<'t>(param: &Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = param.walk();
    for child in param.children_by_field_name("name", &mut cursor) {
        out.push(child);
    }
    out
}

/// Type node of one parameter declaration.
pub fn param_type<'t>(param: &Node<'t>) -> Option<Node<'t>> {
    param.child_by_field_name("type")
}

/// Smallest function or method declaration lexically containing `node`.
/// Function literals are looked through: a call inside a closure belongs to
/// the declaration that contains the closure.
pub fn enclosing_func_decl<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if is_func_decl(&n) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Top-level function and method declarations of a file.
pub fn top_level_func_decls<'t>(root: &Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if is_func_decl(&child) {
            out.push(child);
        }
    }
    out
}

/// All `call_expression` nodes of a subtree in pre-order.
pub fn collect_calls<'t>(root: &Node<'t>) -> Vec<Node<'t>> {
    let mut calls = Vec::new();
    visit_all(root, &mut |n| {
        if n.kind() == "call_expression" {
            calls.push(*n);
        }
    });
    calls
}

/// Statements of a block, comments filtered out.
pub fn body_statements<'t>(block: &Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = block.walk();
    for child in block.named_children(&mut cursor) {
        if child.kind() != "comment" {
            out.push(child);
        }
    }
    out
}

/// True for a leading blank-discard statement: `_ = expr`.
pub fn is_blank_discard(stmt: &Node, source: &str) -> bool {
    if stmt.kind() != "assignment_statement" {
        return false;
    }
    let Some(left) = stmt.child_by_field_name("left") else {
        return false;
    };
    left.named_child(0)
        .map(|first| node_text(&first, source) == "_")
        .unwrap_or(false)
}

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte offset just past the newline ending the line containing `offset`,
/// or the end of the source when there is no trailing newline.
pub fn line_end(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map(|i| offset + i + 1)
        .unwrap_or(source.len())
}

/// Leading whitespace of the line starting at `start`.
pub fn line_indent(source: &str, start: usize) -> &str {
    let rest = &source[start..];
    let end = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..end]
}
