//! Boundary oracle
//!
//! Decides where the propagation chain terminates and how the handle is bound
//! there. Ordered rules, first match wins: a user-supplied stop-at overrides
//! everything, a testing entry overrides an HTTP handler (a helper taking
//! both a testing value and a request is still a test), and `main` is the
//! lowest-priority default.

use std::path::Path;

use tracing::debug;
use tree_sitter::Node;

use crate::edit::FileBatch;
use crate::error::{CtxPlumbError, Result};
use crate::imports::ensure_import;
use crate::loader::GoFile;
use crate::signature::{ctx_ident_in_scope, VAR_NAME_CTX};
use crate::spec::TargetSpec;
use crate::syntax::{
    body_statements, func_body, func_name, func_params, is_blank_discard, line_end, line_indent,
    line_start, node_text, param_decls, param_names, param_type,
};
use crate::typeinfo::{is_http_request_type, is_testing_param_type, ImportTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Main,
    Http,
    Test,
    StopAt,
}

/// Per-run boundary configuration.
pub struct StopContext<'a> {
    pub http: bool,
    pub stop: Option<&'a TargetSpec>,
    /// Canonical path of the stop-at file, resolved once per run.
    pub stop_canon: Option<&'a Path>,
}

/// Evaluate termination conditions for an enclosing function.
pub fn should_stop_at(
    cx: &StopContext,
    file: &GoFile,
    pkg_name: &str,
    pkg_import_path: &str,
    decl: &Node,
    source: &str,
    imports: &ImportTable,
) -> Option<StopReason> {
    if let (Some(stop), Some(stop_canon)) = (cx.stop, cx.stop_canon) {
        if file.canon_path == stop_canon && func_name(decl, source) == stop.func_name {
            let start_line = decl.start_position().row + 1;
            if stop.line == 0 || start_line == stop.line {
                debug!(func = %stop.func_name, line = start_line, "stop-at matched");
                return Some(StopReason::StopAt);
            }
        }
    }

    if is_testing_boundary(decl, source, imports) {
        debug!(func = func_name(decl, source), "stop at testing boundary");
        return Some(StopReason::Test);
    }

    if cx.http && is_http_handler_func(decl, source, imports) {
        debug!(func = func_name(decl, source), "stop at HTTP boundary");
        return Some(StopReason::Http);
    }

    if is_main_function(decl, source, pkg_name, pkg_import_path) {
        debug!("stop at main function");
        return Some(StopReason::Main);
    }

    None
}

fn is_main_function(decl: &Node, source: &str, pkg_name: &str, pkg_import_path: &str) -> bool {
    if decl.kind() != "function_declaration" {
        return false;
    }
    if func_name(decl, source) != "main" {
        return false;
    }
    pkg_name == "main" || pkg_import_path == "main"
}

/// A handler-shaped function: exactly two parameter fields, the second a
/// `*net/http.Request`.
fn is_http_handler_func(decl: &Node, source: &str, imports: &ImportTable) -> bool {
    let Some(params) = func_params(decl) else {
        return false;
    };
    let fields = param_decls(&params);
    if fields.len() != 2 {
        return false;
    }
    param_type(&fields[1])
        .map(|ty| is_http_request_type(&ty, source, imports))
        .unwrap_or(false)
}

/// Any parameter of type testing.T, testing.B, testing.F, or testing.TB
/// (pointer or not) marks a test entry point.
fn is_testing_boundary(decl: &Node, source: &str, imports: &ImportTable) -> bool {
    let Some(params) = func_params(decl) else {
        return false;
    };
    param_decls(&params).iter().any(|param| {
        param_type(param)
            .map(|ty| is_testing_param_type(&ty, source, imports))
            .unwrap_or(false)
    })
}

/// How a boundary parameter can be referenced.
enum ParamName<'t> {
    Named(String),
    Blank,
    Unnamed(Node<'t>),
}

fn find_param_by_type<'t, F>(decl: &Node<'t>, source: &str, pred: F) -> Option<ParamName<'t>>
where
    F: Fn(&Node) -> bool,
{
    let params = func_params(decl)?;
    for param in param_decls(&params) {
        let ty = param_type(&param)?;
        if !pred(&ty) {
            continue;
        }
        let names = param_names(&param);
        return Some(match names.first() {
            Some(first) => {
                let text = node_text(first, source);
                if text == "_" || text.is_empty() {
                    ParamName::Blank
                } else {
                    ParamName::Named(text.to_string())
                }
            }
            None => ParamName::Unnamed(ty),
        });
    }
    None
}

/// Ensure a handle is bound inside a boundary function and return the
/// identifier it goes by. Idempotent: an in-scope handle is reused as-is.
pub fn ensure_ctx_at_boundary(
    batch: &mut FileBatch,
    root: &Node,
    source: &str,
    imports: &ImportTable,
    decl: &Node,
    reason: StopReason,
) -> Result<String> {
    if let Some(name) = ctx_ident_in_scope(decl, source, imports) {
        debug!(func = func_name(decl, source), name = %name, "ctx already in scope at boundary");
        return Ok(name);
    }

    match reason {
        StopReason::Main => {
            ensure_import(batch, root, source, "context");
            insert_stmt_after_leading_blank_discards(
                batch,
                source,
                decl,
                "ctx := context.Background()",
            );
            debug!(func = func_name(decl, source), "inserted ctx := context.Background()");
            Ok(VAR_NAME_CTX.to_string())
        }
        StopReason::Http => {
            let param = find_param_by_type(decl, source, |ty| {
                is_http_request_type(ty, source, imports)
            });
            let req = match param {
                Some(ParamName::Named(name)) => name,
                Some(ParamName::Unnamed(ty)) => {
                    // Name the parameter so the accessor below compiles.
                    batch.edits.insert(ty.start_byte(), "req ".to_string());
                    "req".to_string()
                }
                _ => {
                    return Err(CtxPlumbError::BoundaryUnbindable {
                        what: "http request".to_string(),
                        func: func_name(decl, source).to_string(),
                    })
                }
            };
            insert_stmt_at_func_start(batch, source, decl, &format!("ctx := {req}.Context()"));
            debug!(func = func_name(decl, source), req = %req, "inserted ctx := req.Context()");
            Ok(VAR_NAME_CTX.to_string())
        }
        StopReason::Test => {
            let param = find_param_by_type(decl, source, |ty| {
                is_testing_param_type(ty, source, imports)
            });
            match param {
                Some(ParamName::Named(tvar)) => {
                    // The handle must be live before every statement of the
                    // test, leading pre-flight guards included.
                    insert_stmt_at_func_start(
                        batch,
                        source,
                        decl,
                        &format!("ctx := {tvar}.Context()"),
                    );
                    debug!(func = func_name(decl, source), tvar = %tvar, "inserted ctx := t.Context()");
                }
                Some(ParamName::Unnamed(ty)) => {
                    batch.edits.insert(ty.start_byte(), "t ".to_string());
                    insert_stmt_at_func_start(batch, source, decl, "ctx := t.Context()");
                    debug!(func = func_name(decl, source), "named testing param and bound ctx");
                }
                _ => {
                    // No referencable testing value; background is the
                    // documented fallback.
                    ensure_import(batch, root, source, "context");
                    insert_stmt_at_func_start(batch, source, decl, "ctx := context.Background()");
                    debug!(
                        func = func_name(decl, source),
                        "inserted ctx := context.Background() (testing fallback)"
                    );
                }
            }
            Ok(VAR_NAME_CTX.to_string())
        }
        StopReason::StopAt => Err(CtxPlumbError::BoundaryUnbindable {
            what: "stop-at handle".to_string(),
            func: func_name(decl, source).to_string(),
        }),
    }
}

/// Insert `stmt` as the first statement of the body, right after the opening
/// brace line so leading comments stay attached to the statements they
/// precede.
pub fn insert_stmt_at_func_start(batch: &mut FileBatch, source: &str, decl: &Node, stmt: &str) {
    let Some(body) = func_body(decl) else {
        return;
    };
    let stmts = body_statements(&body);
    if stmts.is_empty() {
        insert_into_empty_body(batch, source, decl, &body, stmt);
        return;
    }
    let first = stmts[0];
    if first.start_position().row == body.start_position().row {
        // Single-line body; splice inline.
        batch.edits.insert(first.start_byte(), format!("{stmt}; "));
        return;
    }
    let anchor = body.named_child(0).unwrap_or(first);
    let indent = line_indent(source, line_start(source, anchor.start_byte())).to_string();
    let at = line_end(source, body.start_byte());
    batch.edits.insert(at, format!("{indent}{stmt}\n"));
}

/// Insert `stmt` after the leading run of blank-discard statements (`_ = …`),
/// keeping pre-existing pre-flight guards at the top. Trailing comments on
/// the preceding line are preserved because the insertion lands on the next
/// line boundary.
pub fn insert_stmt_after_leading_blank_discards(
    batch: &mut FileBatch,
    source: &str,
    decl: &Node,
    stmt: &str,
) {
    let Some(body) = func_body(decl) else {
        return;
    };
    let stmts = body_statements(&body);
    if stmts.is_empty() {
        insert_into_empty_body(batch, source, decl, &body, stmt);
        return;
    }
    let mut idx = 0;
    while idx < stmts.len() && is_blank_discard(&stmts[idx], source) {
        idx += 1;
    }
    if idx == 0 {
        let first = stmts[0];
        if first.start_position().row == body.start_position().row {
            batch.edits.insert(first.start_byte(), format!("{stmt}; "));
            return;
        }
        let at = line_start(source, first.start_byte());
        let indent = line_indent(source, at).to_string();
        batch.edits.insert(at, format!("{indent}{stmt}\n"));
        return;
    }
    let prev = stmts[idx - 1];
    let at = line_end(source, prev.end_byte());
    let indent = line_indent(source, line_start(source, prev.start_byte())).to_string();
    batch.edits.insert(at, format!("{indent}{stmt}\n"));
}

fn insert_into_empty_body(
    batch: &mut FileBatch,
    source: &str,
    decl: &Node,
    body: &Node,
    stmt: &str,
) {
    let decl_indent =
        line_indent(source, line_start(source, decl.start_byte())).to_string();
    if body.start_position().row == body.end_position().row {
        batch.edits.replace(
            body.start_byte(),
            body.end_byte(),
            format!("{{\n{decl_indent}\t{stmt}\n{decl_indent}}}"),
        );
    } else {
        let at = line_end(source, body.start_byte());
        batch.edits.insert(at, format!("{decl_indent}\t{stmt}\n"));
    }
}
