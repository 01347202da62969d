//! Target spec parsing
//!
//! A target (or stop-at) spec names a function inside the module:
//! `path/to/file.go:FuncName[:N]` where N is the 1-based line number of the
//! declaration, used to disambiguate same-named functions in one file.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{CtxPlumbError, Result};

static TARGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+):(\w+)(?::(\d+))?$").expect("target regex"));

/// A parsed `PATH:FUNC[:LINE]` spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// File path, slash-normalized.
    pub file: String,
    /// Function or method name.
    pub func_name: String,
    /// 1-based line number of the declaration when provided; 0 means unspecified.
    pub line: usize,
}

/// Parse a target spec string into its structured form.
///
/// The path portion is trimmed and normalized to forward slashes so specs are
/// portable across platforms.
pub fn parse_target_spec(spec_str: &str) -> Result<TargetSpec> {
    let normalized = spec_str.trim().replace('\\', "/");
    let caps = TARGET_RE
        .captures(&normalized)
        .ok_or_else(|| CtxPlumbError::InvalidSpec {
            spec: spec_str.to_string(),
        })?;

    let line = match caps.get(3) {
        Some(m) => {
            let v: usize = m
                .as_str()
                .parse()
                .map_err(|_| CtxPlumbError::InvalidLineNumber {
                    spec: spec_str.to_string(),
                })?;
            if v == 0 {
                return Err(CtxPlumbError::InvalidLineNumber {
                    spec: spec_str.to_string(),
                });
            }
            v
        }
        None => 0,
    };

    let spec = TargetSpec {
        file: caps[1].to_string(),
        func_name: caps[2].to_string(),
        line,
    };
    debug!(file = %spec.file, func = %spec.func_name, line = spec.line, "parsed target spec");

    Ok(spec)
}

/// Parse the optional stop-at spec.
///
/// An empty or whitespace-only string is the sentinel "no stop" value and maps
/// to `None`; anything else must parse as a full spec.
pub fn parse_stop_spec(stop_at: &str) -> Result<Option<TargetSpec>> {
    if stop_at.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_target_spec(stop_at)?))
}
