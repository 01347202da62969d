//! Cross-platform filesystem utilities
//!
//! File identity throughout the engine is decided by canonical, symlink-resolved
//! paths so that a target spec like `./sub/../main.go` matches the loaded file.

use std::path::{Path, PathBuf};

use crate::error::{CtxPlumbError, Result};

/// Normalize Windows paths by removing the `\\?\` prefix if present.
///
/// On Windows, `Path::canonicalize()` returns paths with the extended-length
/// path prefix (`\\?\C:\...`), which breaks string comparisons against paths
/// the user typed. This strips the prefix on Windows and is a no-op on Unix.
pub fn normalize_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        // Handle UNC paths: \\?\UNC\server\share -> \\server\share
        if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", stripped));
        }
        // Handle local paths: \\?\C:\path -> C:\path
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

/// Resolve a path to its absolute, symlink-free form.
///
/// All file comparisons in target resolution and stop-at matching go through
/// this so that symlinked checkouts and relative specs agree.
pub fn true_path(path: &Path) -> Result<PathBuf> {
    let canon = path.canonicalize().map_err(|e| CtxPlumbError::Load {
        message: format!("ascertaining true path of {}: {}", path.display(), e),
    })?;
    Ok(normalize_path(&canon))
}
