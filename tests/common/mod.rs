//! Shared test infrastructure
//!
//! Tests build temporary Go modules with tempfile instead of committing
//! fixture trees to the repo. Every repo gets a minimal go.mod so the loader
//! can resolve the module root, mirroring how the tool is used for real.

use std::fs;
use std::path::Path;

use ctxplumb::{run, Options};
use tempfile::TempDir;

/// Builder for creating temporary Go module structures.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new module rooted at a temp directory.
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        repo.add_file("go.mod", "module example.com/e2e\n\ngo 1.22\n");
        repo
    }

    /// Get the path to the module root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Add a source file with the given content.
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    /// Read a file back, relative to the module root.
    pub fn read(&self, relative_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(relative_path)).expect("Failed to read file")
    }

    /// Build a `path:Func` target spec for a file in this repo.
    pub fn target(&self, relative_path: &str, func: &str) -> String {
        format!(
            "{}:{}",
            self.dir.path().join(relative_path).display(),
            func
        )
    }

    /// Run ctxplumb against this repo with default options.
    pub fn run_target(&self, target: &str) -> ctxplumb::Result<()> {
        run(&self.opts(target))
    }

    /// Options preset pointing at this repo.
    pub fn opts(&self, target: &str) -> Options {
        Options {
            target: target.to_string(),
            work_dir: self.dir.path().to_path_buf(),
            ..Options::default()
        }
    }
}
