// Parser front-end: the trait every front-end implements, the error it
// reports, and the bundled tree-sitter implementation.

use thiserror::Error;

use crate::ast::SourceUnit;

pub mod solidity;


pub use solidity::SolidityParser;

/// Trait for all contract-language front-ends
pub trait Parser: Send + Sync {
    /// Parse source text into a syntax tree whose spans index into `source`
    fn parse(&self, source: &str) -> Result<SourceUnit, ParseError>;

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// Syntax error with a 1-based position
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_col(source, offset);
        Self {
            offset,
            line,
            column,
            message: message.into(),
        }
    }
}

/// 1-based line and character column of a byte offset
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
