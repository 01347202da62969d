//! Error types and exit codes for ctxplumb

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for ctxplumb operations
#[derive(Error, Debug)]
pub enum CtxPlumbError {
    #[error("invalid target format, want path/to/file.go:Func[:N], got {spec:?}")]
    InvalidSpec { spec: String },

    #[error("invalid line number N in {spec:?}")]
    InvalidLineNumber { spec: String },

    #[error("loading module: {message}")]
    Load { message: String },

    #[error("could not find file {path} in loaded packages")]
    NoSuchFile { path: String },

    #[error("no function or method named {func} in {file}")]
    NoSuchFunction { func: String, file: String },

    #[error(
        "ambiguous function {func} in {file}: found {count}; \
         please disambiguate using a line number as {file}:{func}:N (N is 1-based line)"
    )]
    AmbiguousTarget {
        func: String,
        file: String,
        count: usize,
    },

    #[error("no {func} starting at line {line} in {file}")]
    LineMismatch {
        func: String,
        line: usize,
        file: String,
    },

    #[error("determining {what} parameter name in {func}")]
    BoundaryUnbindable { what: String, func: String },

    #[error("parsing file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("writing file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CtxPlumbError {
    /// Exit code mapping: 0 success, 1 any error.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, CtxPlumbError>;
