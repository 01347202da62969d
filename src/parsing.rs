//! Tree-sitter parsing for Go sources
//!
//! The engine re-parses a file after every mutation batch, so parsing must be
//! cheap and infallible for slightly-broken input: a module mid-refactor does
//! not type-check, and a file being edited may contain constructs the grammar
//! flags as ERROR nodes. Those are diagnostics, never fatal — the engine's own
//! edits are what bring the tree back to health.

use std::path::Path;

use tracing::{debug, warn};
use tree_sitter::Tree;

use crate::error::{CtxPlumbError, Result};

/// Parse one Go source file into a tree-sitter CST.
///
/// Returns an error only when the parser itself cannot run (grammar version
/// mismatch or an unparseable buffer); ERROR nodes inside an otherwise valid
/// tree are logged and tolerated.
pub fn parse_go_source(path: &Path, source: &str) -> Result<Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| CtxPlumbError::Parse {
            path: path.to_path_buf(),
            message: format!("failed to set Go language: {e:?}"),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CtxPlumbError::Parse {
            path: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })?;

    if tree.root_node().has_error() {
        // Report for visibility but continue; see module docs.
        warn!(path = %path.display(), "syntax errors in file; continuing");
    } else {
        debug!(path = %path.display(), bytes = source.len(), "parsed");
    }

    Ok(tree)
}
