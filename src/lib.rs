//! ctxplumb: context.Context plumbing for Go call graphs
//!
//! Given a target function inside a Go module, ctxplumb rewrites the source
//! tree so that the target and every transitive caller (up to boundaries:
//! program entry, testing entries, HTTP handlers, or a user-supplied stop-at)
//! accept a `context.Context` first parameter, with all call sites passing
//! it. The output stays compilable and preserves comments and formatting.
//!
//! Parsing is tree-sitter based; all rewriting is expressed as byte-range
//! text edits against the original source, so untouched code is never
//! re-emitted.
//!
//! # Example
//!
//! ```ignore
//! use ctxplumb::{run, Options};
//!
//! let opts = Options {
//!     target: "internal/foo/bar.go:FuncInNeedOfContext".to_string(),
//!     work_dir: std::path::PathBuf::from("."),
//!     ..Options::default()
//! };
//! run(&opts)?;
//! ```

pub mod boundary;
pub mod cli;
pub mod edit;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod imports;
pub mod loader;
pub mod parsing;
pub mod signature;
pub mod spec;
pub mod syntax;
pub mod target;
pub mod typeinfo;

// Re-export commonly used types
pub use cli::Cli;
pub use engine::{run, Options};
pub use error::{CtxPlumbError, Result};
pub use spec::{parse_stop_spec, parse_target_spec, TargetSpec};
pub use target::{resolve_target, ResolvedTarget};
pub use typeinfo::ObjectId;
