//! CLI argument definitions using clap

use clap::Parser;

const LONG_ABOUT: &str = "\
Adds missing context.Context plumbing along the call graph leading to a \
given Go function.

TARGET is of the form:
  path/to/file.go:FuncName[:N]

Where N is the 1-based line number of the function/method declaration.
If you omit N and multiple functions with the same name exist in the file,
resolution is ambiguous and the tool will ask you to disambiguate by line
number.

NOTE: ctxplumb needs a 'go.mod' file; the enclosing module is what gets
loaded and rewritten.";

/// Rewrites a Go module so a target function and its callers thread a
/// context.Context first parameter.
#[derive(Parser, Debug)]
#[command(name = "ctxplumb")]
#[command(about = "Adds missing context.Context plumbing to a Go call graph")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
pub struct Cli {
    /// Target of the form path/to/file.go:FuncName[:N]
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Optional terminating function of the form path/to/file.go:FuncName[:N]
    #[arg(long = "stop-at", value_name = "SPEC")]
    pub stop_at: Option<String>,

    /// Terminate at http handler boundaries and derive ctx from req.Context()
    #[arg(long)]
    pub http: bool,

    /// Build tags to consider during loading (same syntax as 'go build -tags')
    #[arg(short = 't', long, value_name = "LIST")]
    pub tags: Option<String>,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
