//! Propagation engine
//!
//! The worklist that walks the reverse call graph from the target and rewrites
//! signatures and call sites until every chain reaches a boundary. Single-
//! threaded and deterministic: packages in import-path order, files in path
//! order, calls in pre-order, so two runs over the same inputs are
//! byte-identical.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::Node;

use crate::boundary::{ensure_ctx_at_boundary, should_stop_at, StopContext};
use crate::edit::FileBatch;
use crate::error::{CtxPlumbError, Result};
use crate::fs_utils::true_path;
use crate::loader::{self, GoFile, Workspace};
use crate::signature::{
    ctx_ident_in_scope, ensure_call_has_ctx_arg, ensure_func_has_ctx_param,
    function_has_context_param, VAR_NAME_CTX,
};
use crate::spec::{parse_stop_spec, parse_target_spec};
use crate::syntax::{collect_calls, enclosing_func_decl, func_name, receiver_base_name,
    top_level_func_decls};
use crate::target::resolve_target;
use crate::typeinfo::{object_of_decl, resolve_callee, ImportTable, ObjectId};

/// Configuration of one run.
///
/// `work_dir` may point at the module root or any subdirectory; the whole
/// enclosing module is loaded either way. `target` and `stop_at` use the
/// `path/to/file.go:Func[:N]` syntax.
#[derive(Debug, Clone)]
pub struct Options {
    pub target: String,
    pub stop_at: String,
    pub http: bool,
    pub tags: String,
    pub work_dir: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target: String::new(),
            stop_at: String::new(),
            http: false,
            tags: String::new(),
            work_dir: PathBuf::from("."),
        }
    }
}

/// Perform the rewrite described by `opts`.
pub fn run(opts: &Options) -> Result<()> {
    if opts.target.trim().is_empty() {
        return Err(CtxPlumbError::InvalidSpec {
            spec: "missing target argument".to_string(),
        });
    }

    let mut ws = loader::load(&opts.work_dir, &opts.tags)?;

    let tgt_spec = parse_target_spec(&opts.target)?;
    let stop_spec = parse_stop_spec(&opts.stop_at)?;
    let stop_canon = match &stop_spec {
        Some(spec) => Some(true_path(Path::new(&spec.file)).map_err(|_| {
            CtxPlumbError::NoSuchFile {
                path: spec.file.clone(),
            }
        })?),
        None => None,
    };

    let res = resolve_target(&ws, &tgt_spec)?;

    // A target that already carries a handle parameter means every caller
    // already passes the argument; propagation is suppressed.
    let reuse_existing_ctx_in_target = {
        let file = &ws.files[res.file_idx];
        let root = file.tree.root_node();
        let imports = ImportTable::build(&root, &file.source);
        find_decl(file, &res.object, res.line)
            .map(|decl| function_has_context_param(&decl, &file.source, &imports))
            .unwrap_or(false)
    };
    debug!(reuse = reuse_existing_ctx_in_target, "target inspected");

    // Ensure the target has a handle parameter; blanks stay blank for now.
    ensure_target_has_ctx(&mut ws, res.file_idx, &res.object, res.line, false)?;

    let mut saw_any_call = false;
    if !reuse_existing_ctx_in_target {
        let cx = StopContext {
            http: opts.http,
            stop: stop_spec.as_ref(),
            stop_canon: stop_canon.as_deref(),
        };
        traverse_and_propagate(&mut ws, res.object.clone(), &cx, &mut saw_any_call)?;
    }

    // With no call site seen, a blank handle parameter on the target is safe
    // to upgrade to ctx: arguments bind by position, never by name.
    if !saw_any_call {
        ensure_target_has_ctx(&mut ws, res.file_idx, &res.object, res.line, true)?;
    }

    write_modified(&ws)
}

/// Locate a declaration by object identity, using the recorded line as a
/// tiebreak when same-named declarations coexist.
fn find_decl<'t>(file: &'t GoFile, obj: &ObjectId, line_hint: usize) -> Option<Node<'t>> {
    let source = file.source.as_str();
    let candidates: Vec<Node> = top_level_func_decls(&file.tree.root_node())
        .into_iter()
        .filter(|d| {
            func_name(d, source) == obj.name && receiver_base_name(d, source) == obj.recv
        })
        .collect();
    if candidates.len() > 1 && line_hint > 0 {
        if let Some(exact) = candidates
            .iter()
            .find(|d| d.start_position().row + 1 == line_hint)
        {
            return Some(*exact);
        }
    }
    candidates.into_iter().next()
}

fn ensure_target_has_ctx(
    ws: &mut Workspace,
    file_idx: usize,
    obj: &ObjectId,
    line_hint: usize,
    rename_blank: bool,
) -> Result<()> {
    let batch = {
        let file = &ws.files[file_idx];
        let root = file.tree.root_node();
        let source = file.source.as_str();
        let imports = ImportTable::build(&root, source);
        let Some(decl) = find_decl(file, obj, line_hint) else {
            return Ok(());
        };
        let mut batch = FileBatch::new();
        ensure_func_has_ctx_param(&mut batch, &root, source, &imports, &decl, rename_blank);
        batch
    };
    ws.apply_edits(file_idx, batch.edits)
}

/// Walk callers breadth-first from `start`, rewriting as we go. Cycles
/// terminate through the visited set; identity is object-based, so textual
/// name collisions across packages stay independent.
fn traverse_and_propagate(
    ws: &mut Workspace,
    start: ObjectId,
    cx: &StopContext,
    saw_any_call: &mut bool,
) -> Result<()> {
    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::from([start]);

    while let Some(curr) = queue.pop_front() {
        if !visited.insert(curr.clone()) {
            continue;
        }
        debug!(pkg = %curr.pkg, func = %curr.name, "scanning callers");

        for pkg_idx in 0..ws.packages.len() {
            let file_indices = ws.packages[pkg_idx].files.clone();
            for file_idx in file_indices {
                let plan = plan_call_sites(ws, pkg_idx, file_idx, &curr, cx, saw_any_call)?;
                if let Some((batch, enqueue)) = plan {
                    queue.extend(enqueue);
                    ws.apply_edits(file_idx, batch.edits)?;
                }
            }
        }
    }

    Ok(())
}

/// Scan one file for calls to `curr` and compute the edit batch for it.
///
/// All decisions inside the batch consult an overlay of what the batch has
/// already granted (handle params, boundary bindings, imports), since the
/// tree cannot reflect pending edits until they are applied.
fn plan_call_sites(
    ws: &Workspace,
    pkg_idx: usize,
    file_idx: usize,
    curr: &ObjectId,
    cx: &StopContext,
    saw_any_call: &mut bool,
) -> Result<Option<(FileBatch, Vec<ObjectId>)>> {
    let pkg = &ws.packages[pkg_idx];
    let file = &ws.files[file_idx];
    let source = file.source.as_str();
    let root = file.tree.root_node();
    let imports = ImportTable::build(&root, source);

    let mut batch = FileBatch::new();
    let mut enqueue: Vec<ObjectId> = Vec::new();
    let mut granted: HashMap<ObjectId, String> = HashMap::new();

    for call in collect_calls(&root) {
        let Some(info) = resolve_callee(ws, pkg_idx, file_idx, &call) else {
            continue;
        };
        let matched = match &info.resolved {
            Some(obj) => obj == curr,
            // Resilience to missing type information: same package, same name.
            None => pkg.import_path == curr.pkg && info.name == curr.name,
        };
        if !matched {
            continue;
        }
        *saw_any_call = true;

        let Some(enc) = enclosing_func_decl(&call) else {
            continue;
        };
        let enc_obj = object_of_decl(&pkg.import_path, &enc, source);

        if let Some(reason) = should_stop_at(
            cx,
            file,
            &pkg.name,
            &pkg.import_path,
            &enc,
            source,
            &imports,
        ) {
            let name = match granted.get(&enc_obj) {
                Some(name) => name.clone(),
                None => {
                    let name =
                        ensure_ctx_at_boundary(&mut batch, &root, source, &imports, &enc, reason)?;
                    granted.insert(enc_obj.clone(), name.clone());
                    name
                }
            };
            ensure_call_has_ctx_arg(&mut batch, Some(&enc), &call, source, &imports, &name);
            continue;
        }

        // A handle already in scope is reused; callers of this function
        // already pass their own.
        let in_scope = granted
            .get(&enc_obj)
            .cloned()
            .or_else(|| ctx_ident_in_scope(&enc, source, &imports));
        if let Some(name) = in_scope {
            ensure_call_has_ctx_arg(&mut batch, Some(&enc), &call, source, &imports, &name);
            continue;
        }

        // Remember whether a handle parameter pre-existed (possibly blank):
        // reusing one means callers already pass the argument, so the walk
        // must not continue past this function.
        let had_ctx_param = function_has_context_param(&enc, source, &imports);
        ensure_func_has_ctx_param(&mut batch, &root, source, &imports, &enc, true);
        granted.insert(enc_obj.clone(), VAR_NAME_CTX.to_string());
        ensure_call_has_ctx_arg(&mut batch, Some(&enc), &call, source, &imports, VAR_NAME_CTX);

        if !had_ctx_param {
            enqueue.push(enc_obj);
        }
    }

    if batch.is_empty() && enqueue.is_empty() {
        return Ok(None);
    }
    Ok(Some((batch, enqueue)))
}

/// Write every modified file back in place, mode 0644.
fn write_modified(ws: &Workspace) -> Result<()> {
    for file in &ws.files {
        if !file.modified {
            continue;
        }
        debug!(path = %file.path.display(), "writing");
        fs::write(&file.path, &file.source).map_err(|e| CtxPlumbError::Write {
            path: file.path.clone(),
            source: e,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&file.path, fs::Permissions::from_mode(0o644)).map_err(|e| {
                CtxPlumbError::Write {
                    path: file.path.clone(),
                    source: e,
                }
            })?;
        }
    }
    Ok(())
}
