//! Target resolution
//!
//! Locates the unique declaration a spec names. File identity is canonical
//! paths; same-named declarations in one file are disambiguated by the
//! 1-based line their declaration begins on.

use std::path::Path;

use tracing::debug;

use crate::error::{CtxPlumbError, Result};
use crate::fs_utils::true_path;
use crate::loader::Workspace;
use crate::spec::TargetSpec;
use crate::syntax::{func_name, top_level_func_decls};
use crate::typeinfo::{object_of_decl, ObjectId};

/// The resolved target: its owning package and file plus its object identity.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub pkg_idx: usize,
    pub file_idx: usize,
    pub object: ObjectId,
    /// Declaration start line at resolution time (1-based).
    pub line: usize,
}

/// Resolve `spec` against the loaded workspace.
pub fn resolve_target(ws: &Workspace, spec: &TargetSpec) -> Result<ResolvedTarget> {
    debug!(file = %spec.file, func = %spec.func_name, line = spec.line, "resolving target");
    let abs_file = true_path(Path::new(&spec.file)).map_err(|_| CtxPlumbError::NoSuchFile {
        path: spec.file.clone(),
    })?;

    for (pkg_idx, pkg) in ws.packages.iter().enumerate() {
        for &file_idx in &pkg.files {
            let file = &ws.files[file_idx];
            if file.canon_path != abs_file {
                continue;
            }
            let source = file.source.as_str();
            let root = file.tree.root_node();
            let candidates: Vec<_> = top_level_func_decls(&root)
                .into_iter()
                .filter(|d| func_name(d, source) == spec.func_name)
                .collect();
            if candidates.is_empty() {
                return Err(CtxPlumbError::NoSuchFunction {
                    func: spec.func_name.clone(),
                    file: spec.file.clone(),
                });
            }

            let decl = if spec.line > 0 {
                candidates
                    .iter()
                    .find(|d| d.start_position().row + 1 == spec.line)
                    .copied()
                    .ok_or_else(|| CtxPlumbError::LineMismatch {
                        func: spec.func_name.clone(),
                        line: spec.line,
                        file: spec.file.clone(),
                    })?
            } else {
                if candidates.len() > 1 {
                    return Err(CtxPlumbError::AmbiguousTarget {
                        func: spec.func_name.clone(),
                        file: spec.file.clone(),
                        count: candidates.len(),
                    });
                }
                candidates[0]
            };

            let object = object_of_decl(&pkg.import_path, &decl, source);
            let line = decl.start_position().row + 1;
            debug!(pkg = %pkg.import_path, func = %object.name, line, "target resolved");
            return Ok(ResolvedTarget {
                pkg_idx,
                file_idx,
                object,
                line,
            });
        }
    }

    Err(CtxPlumbError::NoSuchFile {
        path: spec.file.clone(),
    })
}
