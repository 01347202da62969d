//! Signature and call-site mutators
//!
//! The rules that keep invariants I1–I4 true: at most one handle parameter
//! per function, new parameters in first position, a stable in-scope
//! identifier, and call sites agreeing with declarations.

use tracing::debug;
use tree_sitter::Node;

use crate::edit::FileBatch;
use crate::imports::ensure_import;
use crate::syntax::{
    func_body, func_name, func_params, node_text, param_decls, param_names, param_type, visit_all,
};
use crate::typeinfo::{expr_is_context, ident_is_context, is_context_type, ImportTable};

/// The conventional handle identifier.
pub const VAR_NAME_CTX: &str = "ctx";

/// What `ensure_func_has_ctx_param` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamChange {
    Unchanged,
    Renamed,
    Added,
}

/// Whether the declaration already has a parameter of the handle type,
/// regardless of its name. When true, callers already pass the argument and
/// propagation must not walk past this function.
pub fn function_has_context_param(decl: &Node, source: &str, imports: &ImportTable) -> bool {
    let Some(params) = func_params(decl) else {
        return false;
    };
    param_decls(&params).iter().any(|param| {
        param_type(param)
            .map(|ty| is_context_type(&ty, source, imports))
            .unwrap_or(false)
    })
}

/// Guarantee the function has a usable handle parameter.
///
/// - a parameter literally named `ctx` satisfies the requirement as-is;
/// - an existing handle-typed parameter is reused: its blank (`_`) or missing
///   name is upgraded to `ctx` when `rename_blank` is set, never duplicated;
/// - otherwise a new `ctx context.Context` is prepended and the import added.
pub fn ensure_func_has_ctx_param(
    batch: &mut FileBatch,
    root: &Node,
    source: &str,
    imports: &ImportTable,
    decl: &Node,
    rename_blank: bool,
) -> ParamChange {
    let Some(params) = func_params(decl) else {
        return ParamChange::Unchanged;
    };
    let fields = param_decls(&params);

    for param in &fields {
        for ident in param_names(param) {
            if node_text(&ident, source) == VAR_NAME_CTX {
                return ParamChange::Unchanged;
            }
        }
    }

    for param in &fields {
        let is_handle = param_type(param)
            .map(|ty| is_context_type(&ty, source, imports))
            .unwrap_or(false);
        if !is_handle {
            continue;
        }
        let names = param_names(param);
        match names.first() {
            Some(first) if node_text(first, source) == "_" => {
                if rename_blank {
                    debug!(func = func_name(decl, source), "renaming blank ctx param");
                    batch
                        .edits
                        .replace(first.start_byte(), first.end_byte(), VAR_NAME_CTX);
                    return ParamChange::Renamed;
                }
                return ParamChange::Unchanged;
            }
            Some(_) => return ParamChange::Unchanged,
            None => {
                // Unnamed handle parameter: name it in place rather than
                // inserting a second handle.
                if rename_blank {
                    let ty = param_type(param).expect("handle param has a type");
                    debug!(func = func_name(decl, source), "naming unnamed ctx param");
                    batch
                        .edits
                        .insert(ty.start_byte(), format!("{VAR_NAME_CTX} "));
                    return ParamChange::Renamed;
                }
                return ParamChange::Unchanged;
            }
        }
    }

    debug!(func = func_name(decl, source), "inserting ctx param");
    let text = if fields.is_empty() {
        format!("{VAR_NAME_CTX} context.Context")
    } else {
        format!("{VAR_NAME_CTX} context.Context, ")
    };
    batch.edits.insert(params.start_byte() + 1, text);
    ensure_import(batch, root, source, "context");
    ParamChange::Added
}

/// Prepend the in-scope handle identifier to a call's arguments, unless the
/// first argument is already that identifier or already carries the handle
/// type.
pub fn ensure_call_has_ctx_arg(
    batch: &mut FileBatch,
    enc: Option<&Node>,
    call: &Node,
    source: &str,
    imports: &ImportTable,
    ctx_name: &str,
) -> bool {
    let name = if ctx_name.is_empty() {
        VAR_NAME_CTX
    } else {
        ctx_name
    };
    let Some(args) = call.child_by_field_name("arguments") else {
        return false;
    };
    let first = args.named_child(0);
    if let Some(first) = &first {
        if first.kind() == "identifier" && node_text(first, source) == name {
            return false;
        }
        if expr_is_context(enc, first, source, imports) {
            return false;
        }
    }
    let text = if first.is_some() {
        format!("{name}, ")
    } else {
        name.to_string()
    };
    batch.edits.insert(args.start_byte() + 1, text);
    true
}

/// The identifier the handle goes by inside this function, if one is in
/// scope: a parameter literally named `ctx`, then a named handle-typed
/// parameter, then a local literally named `ctx`, then any local bound to a
/// handle value.
pub fn ctx_ident_in_scope(decl: &Node, source: &str, imports: &ImportTable) -> Option<String> {
    if let Some(params) = func_params(decl) {
        for param in param_decls(&params) {
            for ident in param_names(&param) {
                if node_text(&ident, source) == VAR_NAME_CTX {
                    return Some(VAR_NAME_CTX.to_string());
                }
            }
        }
        for param in param_decls(&params) {
            let is_handle = param_type(&param)
                .map(|ty| is_context_type(&ty, source, imports))
                .unwrap_or(false);
            if !is_handle {
                continue;
            }
            if let Some(first) = param_names(&param).first() {
                let name = node_text(first, source);
                if name != "_" && !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    let body = func_body(decl)?;

    // Any identifier literally named ctx (e.g. `ctx := ...` earlier in the
    // body) is reused.
    let mut found_literal = false;
    visit_all(&body, &mut |n| {
        if !found_literal && n.kind() == "identifier" && node_text(n, source) == VAR_NAME_CTX {
            found_literal = true;
        }
    });
    if found_literal {
        return Some(VAR_NAME_CTX.to_string());
    }

    // Locals bound to handle values under another name.
    let mut candidate: Option<String> = None;
    visit_all(&body, &mut |n| {
        if candidate.is_some() || n.kind() != "short_var_declaration" {
            return;
        }
        if let Some(left) = n.child_by_field_name("left") {
            if let Some(first) = left.named_child(0) {
                let name = node_text(&first, source);
                if name != "_" && ident_is_context(decl, name, source, imports) {
                    candidate = Some(name.to_string());
                }
            }
        }
    });
    candidate
}
