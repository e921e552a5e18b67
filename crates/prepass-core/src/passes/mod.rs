/*!
# Rewrite Passes

Each pass reads the current `PipelineState`, consults the AST index and
either records analysis metadata or stages text edits. Passes never commit
and never reparse; the driver owns both.

A pass computes its whole plan before staging anything, so a failure part
way through leaves the patcher untouched.
*/

use std::path::Path;

use crate::errors::Result;
use crate::parser::Parser;
use crate::pipeline::PipelineState;
use crate::PrepassConfig;

pub mod address;
pub mod calls;
pub mod comments;
pub mod constructor;
pub mod imports;
pub mod selectors;
pub mod storage;

pub use address::{AddressDeclaration, AddressTypeAnalyzer, AddressUsage, DeclarationRole};
pub use calls::FunctionCallRewriter;
pub use comments::{strip_comments, CommentStripper};
pub use constructor::{ConstructorFlattener, ConstructorReport};
pub use imports::{FileResolver, FsResolver, ImportResolver, InMemoryResolver, ResolvedFile};
pub use selectors::{canonical_type, selector, MarkedFunction, MarkedFunctions, SelectorResolver};
pub use storage::{StorageAccessMap, StorageClassifier, StorageVariable};

/// Collaborators and settings shared by every pass of one run
pub struct PassContext<'a> {
    pub parser: &'a dyn Parser,
    pub resolver: &'a dyn FileResolver,
    pub config: &'a PrepassConfig,
    /// Path of the file being compiled; imports resolve relative to it
    pub source_path: &'a Path,
}

/// Trait for all rewrite and analysis passes
pub trait Pass: Send + Sync {
    /// Short name used in logs and error context
    fn name(&self) -> &'static str;

    /// What the pass does
    fn description(&self) -> &'static str;

    /// Run against the current state, staging edits or recording metadata
    fn run(&self, state: &mut PipelineState, ctx: &PassContext<'_>) -> Result<()>;
}
