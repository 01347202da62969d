//! Byte-range text edits
//!
//! All source mutation in the engine is expressed as edits against the current
//! snapshot of a file and applied in one batch. Untouched bytes are never
//! re-emitted, which is what keeps comments and formatting stable.

/// A single replacement of the byte range `start..end` with `text`.
/// Insertions are zero-width ranges (`start == end`).
#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// An ordered batch of non-overlapping edits against one file snapshot.
#[derive(Debug, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Insert `text` at byte offset `at`.
    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    /// Replace the byte range `start..end` with `text`.
    pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        debug_assert!(start <= end);
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    /// Apply all edits to `source`, producing the rewritten text.
    ///
    /// Edits are applied from the back of the file forward so earlier offsets
    /// stay valid. Two insertions at the same offset keep their insertion
    /// order in the output. Overlapping replacements are a caller bug; the
    /// later-added one is dropped with a debug assertion.
    pub fn apply(mut self, source: &str) -> String {
        // Stable ordering: (start desc, insertion order desc) so that among
        // equal offsets the first-added insertion ends up first in the output.
        let mut indexed: Vec<(usize, Edit)> = self.edits.drain(..).enumerate().collect();
        indexed.sort_by(|a, b| b.1.start.cmp(&a.1.start).then(b.0.cmp(&a.0)));

        let mut out = source.to_string();
        let mut applied_min = usize::MAX;
        for (_, e) in indexed {
            if e.end > applied_min {
                debug_assert!(false, "overlapping edits at {}..{}", e.start, e.end);
                continue;
            }
            out.replace_range(e.start..e.end, &e.text);
            applied_min = e.start;
        }
        out
    }
}

/// One file's in-flight mutation batch: the edits plus the import paths
/// already queued in this batch (the tree cannot show them yet).
#[derive(Debug, Default)]
pub struct FileBatch {
    pub edits: EditSet,
    pub pending_imports: std::collections::HashSet<String>,
}

impl FileBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
