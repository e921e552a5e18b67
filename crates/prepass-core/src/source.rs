/*!
# Source Text and Patching

`SourceText` is one immutable version of the working source. Passes never
mutate it directly: they stage `Edit`s in a `TextPatcher`, and a commit
produces the next version. Offsets are only valid for the version they
were computed against.
*/

use std::ops::Range;

use tracing::debug;

use crate::ast::Span;
use crate::errors::{PrepassError, Result};

/// One version of the working source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    text: String,
    original: String,
    version: u64,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original: text.clone(),
            text,
            version: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text the pipeline started from
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn slice(&self, span: Span) -> &str {
        span.slice(&self.text)
    }

    fn next_version(&self, text: String) -> Self {
        Self {
            text,
            original: self.original.clone(),
            version: self.version + 1,
        }
    }
}

/// Range replacement against one source version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    fn overlaps(&self, range: &Range<usize>) -> bool {
        let both_insertions = self.range.is_empty() && range.is_empty();
        if both_insertions {
            // Two insertions at one point have no defined order
            return self.range.start == range.start;
        }
        self.range.start < range.end && range.start < self.range.end
    }
}

/// Accumulates disjoint edits and applies them as one batch
#[derive(Debug, Default)]
pub struct TextPatcher {
    staged: Vec<Edit>,
}

impl TextPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a replacement of `range`; fails if it intersects a staged edit
    pub fn stage_edit(
        &mut self,
        range: Range<usize>,
        replacement: impl Into<String>,
    ) -> Result<()> {
        if range.start > range.end {
            return Err(PrepassError::Invariant(format!(
                "edit range {range:?} is reversed"
            )));
        }
        if let Some(existing) = self.staged.iter().find(|e| e.overlaps(&range)) {
            return Err(PrepassError::Overlap {
                existing: existing.range.clone(),
                attempted: range,
            });
        }
        self.staged.push(Edit {
            range,
            replacement: replacement.into(),
        });
        Ok(())
    }

    pub fn stage_span(&mut self, span: Span, replacement: impl Into<String>) -> Result<()> {
        self.stage_edit(span.range(), replacement)
    }

    pub fn staged(&self) -> &[Edit] {
        &self.staged
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Drop every staged edit without applying it
    pub fn discard(&mut self) {
        self.staged.clear();
    }

    /// Apply the staged batch to `source` and clear it.
    ///
    /// Edits are applied from the highest start offset down so offsets not
    /// yet processed stay valid. An empty batch returns `source` unchanged.
    pub fn commit(&mut self, source: &SourceText) -> Result<SourceText> {
        if self.staged.is_empty() {
            return Ok(source.clone());
        }

        let mut edits = std::mem::take(&mut self.staged);
        for edit in &edits {
            let in_bounds = edit.range.end <= source.len()
                && source.text.is_char_boundary(edit.range.start)
                && source.text.is_char_boundary(edit.range.end);
            if !in_bounds {
                return Err(PrepassError::Invariant(format!(
                    "edit {:?} does not fit source version {} ({} bytes)",
                    edit.range,
                    source.version,
                    source.len()
                )));
            }
        }

        // Replacements sort before insertions sharing their start offset so
        // the insertion lands in front of the replaced text
        edits.sort_by(|a, b| {
            b.range
                .start
                .cmp(&a.range.start)
                .then(b.range.end.cmp(&a.range.end))
        });

        let mut text = source.text.clone();
        for edit in &edits {
            text.replace_range(edit.range.clone(), &edit.replacement);
        }

        debug!(
            edits = edits.len(),
            from_version = source.version,
            "committed edit batch"
        );
        Ok(source.next_version(text))
    }
}
