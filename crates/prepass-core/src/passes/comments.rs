// Comment removal. Block comments are replaced by the newlines they
// contained so reported line numbers keep pointing at the original lines.

use std::ops::Range;

use tracing::debug;

use super::{Pass, PassContext};
use crate::errors::Result;
use crate::pipeline::PipelineState;
use crate::source::{SourceText, TextPatcher};

pub struct CommentStripper;

impl Pass for CommentStripper {
    fn name(&self) -> &'static str {
        "comments"
    }

    fn description(&self) -> &'static str {
        "Removes line and block comments outside string literals"
    }

    fn run(&self, state: &mut PipelineState, _ctx: &PassContext<'_>) -> Result<()> {
        let edits = comment_edits(state.source().text());
        debug!(comments = edits.len(), "stripping comments");
        for (range, replacement) in edits {
            state.patcher.stage_edit(range, replacement)?;
        }
        Ok(())
    }
}

/// Text with every comment removed
pub fn strip_comments(text: &str) -> Result<String> {
    let source = SourceText::new(text);
    let mut patcher = TextPatcher::new();
    for (range, replacement) in comment_edits(text) {
        patcher.stage_edit(range, replacement)?;
    }
    Ok(patcher.commit(&source)?.text().to_string())
}

fn comment_edits(text: &str) -> Vec<(Range<usize>, String)> {
    let bytes = text.as_bytes();
    let mut edits = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            quote @ (b'"' | b'\'') => {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != quote && bytes[pos] != b'\n' {
                    pos += if bytes[pos] == b'\\' { 2 } else { 1 };
                }
                pos += 1;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
                edits.push((pos..end, String::new()));
                pos = end;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                // Unterminated comments are left for the parser to report
                let Some(close) = text[pos + 2..].find("*/") else {
                    break;
                };
                let end = pos + 2 + close + 2;
                let newlines = "\n".repeat(text[pos..end].matches('\n').count());
                edits.push((pos..end, newlines));
                pos = end;
            }
            _ => pos += 1,
        }
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_line_and_block_comments() {
        let text = "// SPDX\ncontract A { /* a\n b */ uint x; // trailing\n}";
        assert_eq!(
            strip_comments(text).unwrap(),
            "\ncontract A { \n uint x; \n}"
        );
    }

    #[test]
    fn test_comment_markers_in_strings_are_kept() {
        let text = r#"string s = "http://x/*y*/"; string t = 'a\'//b';"#;
        assert_eq!(strip_comments(text).unwrap(), text);
    }

    #[test]
    fn test_text_without_comments_is_unchanged() {
        let text = "contract A { function f() public {} }";
        assert!(comment_edits(text).is_empty());
        assert_eq!(strip_comments(text).unwrap(), text);
    }

    #[test]
    fn test_unterminated_block_comment_is_left_alone() {
        let text = "contract A {} /* open";
        assert_eq!(strip_comments(text).unwrap(), text);
    }
}
