use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Fatal errors raised while preparing a source for the backend
#[derive(Error, Debug)]
pub enum PrepassError {
    #[error("Parse error in {file} at {line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Pass '{pass}' produced source that no longer parses ({line}:{column}: {message})")]
    SyntaxRegression {
        pass: &'static str,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Cyclic import: {}", chain.join(" -> "))]
    CyclicImport { chain: Vec<String> },

    #[error("Could not resolve import '{import}' from '{}'", from.display())]
    FileNotFound { import: String, from: PathBuf },

    #[error("Contract '{contract}' does not bind parameter '{parameter}' of base constructor '{base}'")]
    MissingConstructorArgs {
        contract: String,
        base: String,
        parameter: String,
    },

    #[error("Edit {attempted:?} overlaps already staged edit {existing:?}")]
    Overlap {
        existing: Range<usize>,
        attempted: Range<usize>,
    },

    #[error("Inheritance error in '{contract}': {message}")]
    Inheritance { contract: String, message: String },

    #[error("Contract '{0}' not found in source")]
    UnknownContract(String),

    #[error("AST index queried while out of sync with source version {version}")]
    StaleIndex { version: u64 },

    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{pass}: {source}")]
    InPass {
        pass: &'static str,
        #[source]
        source: Box<PrepassError>,
    },
}

impl PrepassError {
    /// Attach the name of the pass that was running when the error surfaced
    pub fn in_pass(self, pass: &'static str) -> Self {
        match self {
            // Already carries its pass
            err @ (Self::InPass { .. } | Self::SyntaxRegression { .. }) => err,
            other => Self::InPass {
                pass,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping pass context
    pub fn root(&self) -> &PrepassError {
        match self {
            Self::InPass { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the error reflects a defect in the pipeline rather than in the input
    pub fn is_internal(&self) -> bool {
        matches!(
            self.root(),
            Self::SyntaxRegression { .. }
                | Self::Overlap { .. }
                | Self::StaleIndex { .. }
                | Self::Invariant(_)
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_internal() {
            2
        } else {
            1
        }
    }
}

/// Why a call site could not be tied to a single definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallIssueKind {
    Ambiguous { candidates: Vec<String> },
    Unresolved,
}

/// Non-fatal resolution problem, reported as a warning after a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallIssue {
    pub kind: CallIssueKind,
    pub contract: String,
    pub function: Option<String>,
    pub callee: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for CallIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match &self.function {
            Some(function) => format!("{}.{}", self.contract, function),
            None => self.contract.clone(),
        };
        match &self.kind {
            CallIssueKind::Ambiguous { candidates } => write!(
                f,
                "{}:{}: call to '{}' in {} is ambiguous between {}",
                self.line,
                self.column,
                self.callee,
                scope,
                candidates.join(", ")
            ),
            CallIssueKind::Unresolved => write!(
                f,
                "{}:{}: call to '{}' in {} could not be resolved",
                self.line, self.column, self.callee, scope
            ),
        }
    }
}

/// Result type for prepass operations
pub type Result<T> = std::result::Result<T, PrepassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let regression = PrepassError::SyntaxRegression {
            pass: "constructor",
            line: 1,
            column: 1,
            message: "unexpected '}'".to_string(),
        };
        assert_eq!(regression.exit_code(), 2);

        let missing = PrepassError::MissingConstructorArgs {
            contract: "B".to_string(),
            base: "A".to_string(),
            parameter: "x".to_string(),
        }
        .in_pass("constructor");
        assert_eq!(missing.exit_code(), 1);
        assert!(missing.to_string().starts_with("constructor: "));

        let overlap = PrepassError::Overlap {
            existing: 0..4,
            attempted: 2..6,
        }
        .in_pass("selectors");
        assert_eq!(overlap.exit_code(), 2);
    }

    #[test]
    fn test_in_pass_does_not_nest() {
        let err = PrepassError::Invariant("x".to_string())
            .in_pass("first")
            .in_pass("second");
        assert!(err.to_string().starts_with("first: "));
    }

    #[test]
    fn test_call_issue_display() {
        let issue = CallIssue {
            kind: CallIssueKind::Unresolved,
            contract: "Token".to_string(),
            function: Some("mint".to_string()),
            callee: "missing".to_string(),
            line: 4,
            column: 9,
        };
        assert_eq!(
            issue.to_string(),
            "4:9: call to 'missing' in Token.mint could not be resolved"
        );
    }
}
